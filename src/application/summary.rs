//! Read-only statistics over fully attributed catalog rows

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::Datelike;
use serde::Serialize;

use crate::domain::catalog_item::CompletedRecord;
use crate::domain::errors::StoreResult;
use crate::domain::repositories::CatalogStore;

pub const DEFAULT_TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LengthStats {
    pub min: i64,
    pub max: i64,
    pub mean: f64,
    pub median: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LargestPage {
    pub title: String,
    pub kind: String,
    pub length: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogSummary {
    pub total: usize,
    pub by_kind: BTreeMap<String, usize>,
    /// `None` when there are no records
    pub length: Option<LengthStats>,
    pub by_year: BTreeMap<i32, usize>,
    pub largest: Vec<LargestPage>,
}

impl CatalogSummary {
    pub fn from_records(records: &[CompletedRecord], top_n: usize) -> Self {
        let mut by_kind = BTreeMap::new();
        let mut by_year = BTreeMap::new();
        for record in records {
            *by_kind.entry(record.kind.clone()).or_insert(0) += 1;
            *by_year.entry(record.modified.year()).or_insert(0) += 1;
        }

        let mut lengths: Vec<i64> = records.iter().map(|r| r.length).collect();
        lengths.sort_unstable();

        let mut ranked: Vec<&CompletedRecord> = records.iter().collect();
        ranked.sort_by(|a, b| b.length.cmp(&a.length).then_with(|| a.title.cmp(&b.title)));
        let largest = ranked
            .into_iter()
            .take(top_n)
            .map(|r| LargestPage {
                title: r.title.clone(),
                kind: r.kind.clone(),
                length: r.length,
            })
            .collect();

        Self {
            total: records.len(),
            by_kind,
            length: length_stats(&lengths),
            by_year,
            largest,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[allow(clippy::cast_precision_loss)]
fn length_stats(sorted: &[i64]) -> Option<LengthStats> {
    let (&min, &max) = (sorted.first()?, sorted.last()?);
    let sum: i64 = sorted.iter().sum();
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    } else {
        sorted[mid] as f64
    };
    Some(LengthStats {
        min,
        max,
        mean: sum as f64 / sorted.len() as f64,
        median,
    })
}

impl fmt::Display for CatalogSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pages with attributes: {}", self.total)?;
        if self.total == 0 {
            return Ok(());
        }

        writeln!(f)?;
        writeln!(f, "By content model:")?;
        let kind_width = self.by_kind.keys().map(String::len).max().unwrap_or(0);
        for (kind, count) in &self.by_kind {
            writeln!(f, "  {kind:<kind_width$}  {count:>8}")?;
        }

        if let Some(stats) = &self.length {
            writeln!(f)?;
            writeln!(f, "Length (bytes):")?;
            writeln!(f, "  min     {:>12}", stats.min)?;
            writeln!(f, "  max     {:>12}", stats.max)?;
            writeln!(f, "  mean    {:>12.1}", stats.mean)?;
            writeln!(f, "  median  {:>12.1}", stats.median)?;
        }

        writeln!(f)?;
        writeln!(f, "Last modified, by year:")?;
        for (year, count) in &self.by_year {
            writeln!(f, "  {year}  {count:>8}")?;
        }

        writeln!(f)?;
        writeln!(f, "Largest {} pages:", self.largest.len())?;
        let title_width = self.largest.iter().map(|p| p.title.len()).max().unwrap_or(0);
        for page in &self.largest {
            writeln!(
                f,
                "  {:<title_width$}  {:>12}  {}",
                page.title, page.length, page.kind
            )?;
        }
        Ok(())
    }
}

pub struct SummaryReporter {
    store: Arc<dyn CatalogStore>,
    top_n: usize,
}

impl SummaryReporter {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self {
            store,
            top_n: DEFAULT_TOP_N,
        }
    }

    #[must_use]
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub async fn summarize(&self) -> StoreResult<CatalogSummary> {
        let records = self.store.all_completed_records().await?;
        Ok(CatalogSummary::from_records(&records, self.top_n))
    }
}

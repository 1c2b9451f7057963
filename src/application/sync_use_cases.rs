//! Process-level triggers for the catalog sync
//!
//! Each trigger runs inside a span tagged with a fresh run id so interleaved
//! log files can be told apart.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::application::backfill::{
    AttributePassReport, BackfillCoordinator, BackfillOptions, ContentPassReport,
};
use crate::application::enumerator::{EnumerationReport, PaginatedEnumerator};
use crate::application::summary::{CatalogSummary, SummaryReporter};
use crate::domain::catalog_client::CatalogClient;
use crate::domain::catalog_item::StageCounts;
use crate::domain::repositories::CatalogStore;

/// Use cases wired from injected client and store handles
pub struct CatalogSyncUseCases {
    client: Arc<dyn CatalogClient>,
    store: Arc<dyn CatalogStore>,
    options: BackfillOptions,
}

impl CatalogSyncUseCases {
    pub fn new(
        client: Arc<dyn CatalogClient>,
        store: Arc<dyn CatalogStore>,
        options: BackfillOptions,
    ) -> Self {
        Self {
            client,
            store,
            options,
        }
    }

    fn coordinator(&self, options: BackfillOptions) -> BackfillCoordinator {
        BackfillCoordinator::new(Arc::clone(&self.client), Arc::clone(&self.store), options)
    }

    /// Discard the local catalog and enumerate the remote listing from scratch.
    pub async fn full_resync(&self) -> Result<EnumerationReport> {
        let run_id = Uuid::new_v4();
        async {
            info!("🔄 Starting full resync");
            self.store
                .reset_schema()
                .await
                .context("Failed to reset the catalog schema")?;

            let enumerator =
                PaginatedEnumerator::new(Arc::clone(&self.client), Arc::clone(&self.store));
            let report = enumerator
                .enumerate()
                .await
                .context("Catalog enumeration failed")?;
            Ok::<_, anyhow::Error>(report)
        }
        .instrument(info_span!("resync", %run_id))
        .await
    }

    /// Fill in content for items still missing it.
    ///
    /// `concurrency` overrides the configured value for this run only.
    pub async fn backfill_content(
        &self,
        limit: Option<usize>,
        concurrency: Option<usize>,
    ) -> Result<ContentPassReport> {
        let run_id = Uuid::new_v4();
        let mut options = self.options.clone();
        if let Some(concurrency) = concurrency {
            options.content_concurrency = concurrency;
        }

        async {
            self.store
                .ensure_schema()
                .await
                .context("Failed to prepare the catalog schema")?;
            let report = self
                .coordinator(options)
                .backfill_content(limit)
                .await
                .context("Content backfill could not read its worklist")?;
            Ok::<_, anyhow::Error>(report)
        }
        .instrument(info_span!("backfill_content", %run_id))
        .await
    }

    /// Fetch attributes for every stored item.
    pub async fn backfill_attributes(&self, batch_size: Option<usize>) -> Result<AttributePassReport> {
        let run_id = Uuid::new_v4();
        let mut options = self.options.clone();
        if let Some(batch_size) = batch_size {
            options.attribute_batch_size = batch_size;
        }

        async {
            self.store
                .ensure_schema()
                .await
                .context("Failed to prepare the catalog schema")?;
            let report = self
                .coordinator(options)
                .backfill_attributes()
                .await
                .context("Attribute backfill could not read its worklist")?;
            Ok::<_, anyhow::Error>(report)
        }
        .instrument(info_span!("backfill_attributes", %run_id))
        .await
    }

    pub async fn report(&self, top_n: usize) -> Result<CatalogSummary> {
        self.store
            .ensure_schema()
            .await
            .context("Failed to prepare the catalog schema")?;
        SummaryReporter::new(Arc::clone(&self.store))
            .with_top_n(top_n)
            .summarize()
            .await
            .context("Failed to read attributed records")
    }

    /// Per-stage counts; never touches the network.
    pub async fn status(&self) -> Result<StageCounts> {
        self.store
            .ensure_schema()
            .await
            .context("Failed to prepare the catalog schema")?;
        self.store
            .stage_counts()
            .await
            .context("Failed to count catalog rows")
    }
}

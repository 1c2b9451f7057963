//! Catalog entities
//!
//! A `CatalogItem` mirrors one remote page. Basic identity is written by the
//! enumerator, `content` and the attribute triple are filled in by the
//! backfill passes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remote page identifier (MediaWiki `pageid`).
pub type PageId = i64;

/// Identity of a remote item as reported by the listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BasicRecord {
    pub id: PageId,
    pub title: String,
}

impl BasicRecord {
    pub fn new(id: PageId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
        }
    }
}

/// Descriptive attributes of an item. All three fields travel together so the
/// store can never hold a partial triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAttributes {
    /// Content model, e.g. `Scribunto` or `wikitext`
    pub kind: String,
    /// Last time the page was touched upstream
    pub modified: DateTime<Utc>,
    /// Page length in bytes
    pub length: i64,
}

/// One attribute write, keyed by page id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeUpdate {
    pub id: PageId,
    pub attributes: ItemAttributes,
}

/// Full local row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: PageId,
    pub title: String,
    /// `None` means the content pass has not stored anything yet.
    /// `Some("")` is a fetched page that is genuinely empty.
    pub content: Option<String>,
    pub attributes: Option<ItemAttributes>,
}

/// A fully attributed row, as consumed by the summary report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedRecord {
    pub title: String,
    pub kind: String,
    pub modified: DateTime<Utc>,
    pub length: i64,
}

/// Backfill stages tracked per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackfillStage {
    Content,
    Attributes,
}

impl std::fmt::Display for BackfillStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Content => write!(f, "content"),
            Self::Attributes => write!(f, "attributes"),
        }
    }
}

/// Per-stage completion counts for the whole store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    pub total: u64,
    pub with_content: u64,
    pub with_attributes: u64,
    /// False while the rows come from an enumeration that never finished
    pub listing_complete: bool,
}

impl StageCounts {
    pub const fn missing(&self, stage: BackfillStage) -> u64 {
        match stage {
            BackfillStage::Content => self.total.saturating_sub(self.with_content),
            BackfillStage::Attributes => self.total.saturating_sub(self.with_attributes),
        }
    }
}

//! Repository interface for the local catalog mirror
//!
//! Every write method is atomic per call. Callers decide when the destructive
//! `reset_schema` is appropriate; everything else is safe to repeat.

use async_trait::async_trait;

use crate::domain::catalog_item::{
    AttributeUpdate, BackfillStage, BasicRecord, CatalogItem, CompletedRecord, PageId, StageCounts,
};
use crate::domain::errors::StoreResult;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    // Schema management
    async fn reset_schema(&self) -> StoreResult<()>;
    async fn ensure_schema(&self) -> StoreResult<()>;

    // Enumeration writes (create-only)
    async fn insert_basic_records(&self, records: &[BasicRecord]) -> StoreResult<()>;
    /// Record that the listing was enumerated to its last page. Cleared by
    /// `reset_schema`.
    async fn mark_listing_complete(&self) -> StoreResult<()>;

    // Backfill worklists
    async fn ids_missing(&self, stage: BackfillStage) -> StoreResult<Vec<PageId>>;
    async fn all_ids(&self) -> StoreResult<Vec<PageId>>;

    // Backfill writes
    async fn set_content(&self, id: PageId, text: &str) -> StoreResult<()>;
    async fn set_attributes(&self, batch: &[AttributeUpdate]) -> StoreResult<()>;

    // Reads
    async fn all_completed_records(&self) -> StoreResult<Vec<CompletedRecord>>;
    async fn basic_records(&self) -> StoreResult<Vec<BasicRecord>>;
    async fn find_item(&self, id: PageId) -> StoreResult<Option<CatalogItem>>;
    async fn stage_counts(&self) -> StoreResult<StageCounts>;
}

//! Shared fixtures: an in-memory fake of the remote catalog and store helpers
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use wiki_harvest::domain::{
    AttributeUpdate, BackfillStage, BasicRecord, CatalogClient, CatalogError, CatalogItem,
    CatalogResult, CatalogStore, CompletedRecord, ItemAttributes, ListCursor, ListPage, PageId,
    StageCounts, StoreError, StoreResult,
};
use wiki_harvest::infrastructure::{DatabaseConnection, SqliteCatalogRepository};

pub const MAX_BATCH: usize = 50;

/// Remote catalog served from memory, split into fixed pages.
///
/// Continuation tokens are `page-<index>`. Every call is recorded so tests
/// can assert exactly which requests were made.
#[derive(Default)]
pub struct FakeCatalog {
    pages: Vec<Vec<BasicRecord>>,
    not_found: HashSet<PageId>,
    flaky_content: HashSet<PageId>,
    empty_content: HashSet<PageId>,
    omitted_attributes: HashSet<PageId>,
    malformed_batches: HashSet<PageId>,
    failing_list_page: Option<usize>,
    list_calls: AtomicUsize,
    content_calls: Mutex<Vec<PageId>>,
    attribute_calls: Mutex<Vec<Vec<PageId>>>,
}

impl FakeCatalog {
    pub fn with_pages(pages: Vec<Vec<BasicRecord>>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    /// `count` pages of `per_page` items with ids 1.. in order
    pub fn sequential(count: usize, per_page: usize) -> Self {
        Self::with_pages(sequential_pages(count, per_page))
    }

    pub fn not_found(mut self, ids: &[PageId]) -> Self {
        self.not_found.extend(ids);
        self
    }

    /// Content lookups for these ids fail with a transient error
    pub fn flaky_content(mut self, ids: &[PageId]) -> Self {
        self.flaky_content.extend(ids);
        self
    }

    pub fn empty_content(mut self, ids: &[PageId]) -> Self {
        self.empty_content.extend(ids);
        self
    }

    /// These ids are left out of attribute responses, as if deleted upstream
    pub fn omit_attributes(mut self, ids: &[PageId]) -> Self {
        self.omitted_attributes.extend(ids);
        self
    }

    /// Any attribute batch containing one of these ids is rejected as malformed
    pub fn malformed_batch_with(mut self, ids: &[PageId]) -> Self {
        self.malformed_batches.extend(ids);
        self
    }

    pub fn failing_list_page(mut self, index: usize) -> Self {
        self.failing_list_page = Some(index);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn content_calls(&self) -> Vec<PageId> {
        let mut calls = self.content_calls.lock().unwrap().clone();
        calls.sort_unstable();
        calls
    }

    pub fn attribute_calls(&self) -> Vec<Vec<PageId>> {
        self.attribute_calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.list_calls.store(0, Ordering::SeqCst);
        self.content_calls.lock().unwrap().clear();
        self.attribute_calls.lock().unwrap().clear();
    }

    pub fn all_records(&self) -> Vec<BasicRecord> {
        self.pages.iter().flatten().cloned().collect()
    }
}

pub fn sequential_pages(count: usize, per_page: usize) -> Vec<Vec<BasicRecord>> {
    let mut next_id: PageId = 1;
    (0..count)
        .map(|_| {
            (0..per_page)
                .map(|_| {
                    let record = BasicRecord::new(next_id, format!("Module:Page{next_id}"));
                    next_id += 1;
                    record
                })
                .collect()
        })
        .collect()
}

pub fn content_for(id: PageId) -> String {
    format!("-- source of page {id}\nreturn {{}}\n")
}

pub fn attributes_for(id: PageId) -> ItemAttributes {
    ItemAttributes {
        kind: if id % 2 == 0 { "Scribunto" } else { "wikitext" }.to_string(),
        modified: Utc.with_ymd_and_hms(2020 + (id % 4) as i32, 6, 1, 8, 0, 0).unwrap(),
        length: id * 100,
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn list_page(&self, cursor: &ListCursor) -> CatalogResult<ListPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let index = match cursor.token() {
            None => 0,
            Some(token) => token
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| CatalogError::malformed("allpages", "unknown token"))?,
        };
        if self.failing_list_page == Some(index) {
            return Err(CatalogError::transient("maxlag", "Waiting for replicas"));
        }

        let items = self.pages.get(index).cloned().unwrap_or_default();
        let next_cursor = (index + 1 < self.pages.len()).then(|| format!("page-{}", index + 1));
        Ok(ListPage { items, next_cursor })
    }

    async fn fetch_content(&self, id: PageId) -> CatalogResult<String> {
        self.content_calls.lock().unwrap().push(id);
        tokio::task::yield_now().await;

        if self.not_found.contains(&id) {
            return Err(CatalogError::NotFound { id });
        }
        if self.flaky_content.contains(&id) {
            return Err(CatalogError::transient("http-503", "Service Unavailable"));
        }
        if self.empty_content.contains(&id) {
            return Ok(String::new());
        }
        Ok(content_for(id))
    }

    async fn fetch_attributes(
        &self,
        ids: &[PageId],
    ) -> CatalogResult<HashMap<PageId, ItemAttributes>> {
        self.attribute_calls.lock().unwrap().push(ids.to_vec());

        if ids.is_empty() || ids.len() > MAX_BATCH {
            return Err(CatalogError::InvalidRequest {
                reason: format!("{} ids", ids.len()),
            });
        }
        if ids.iter().any(|id| self.malformed_batches.contains(id)) {
            return Err(CatalogError::malformed("info", "page has no length"));
        }

        Ok(ids
            .iter()
            .filter(|id| !self.omitted_attributes.contains(id))
            .map(|&id| (id, attributes_for(id)))
            .collect())
    }

    fn max_attribute_batch(&self) -> usize {
        MAX_BATCH
    }
}

/// Fresh in-memory store with the full schema
pub async fn memory_store() -> Arc<SqliteCatalogRepository> {
    let connection = DatabaseConnection::new("sqlite::memory:").await.unwrap();
    let store = SqliteCatalogRepository::new(Arc::new(connection));
    store.ensure_schema().await.unwrap();
    Arc::new(store)
}

pub async fn file_store(path: &Path) -> Arc<SqliteCatalogRepository> {
    let url = format!("sqlite:{}", path.display());
    let connection = DatabaseConnection::new(&url).await.unwrap();
    let store = SqliteCatalogRepository::new(Arc::new(connection));
    store.ensure_schema().await.unwrap();
    Arc::new(store)
}

/// Store seeded with the given records and nothing else
pub async fn seeded_store(records: &[BasicRecord]) -> Arc<SqliteCatalogRepository> {
    let store = memory_store().await;
    store.insert_basic_records(records).await.unwrap();
    store
}

/// Real store whose writes fail for scripted ids.
///
/// `set_content` fails for a scripted id; `set_attributes` rejects the whole
/// batch when any update carries one. Everything else goes to the inner store.
pub struct FailingStore {
    inner: Arc<SqliteCatalogRepository>,
    failing: HashSet<PageId>,
}

impl FailingStore {
    pub fn new(inner: Arc<SqliteCatalogRepository>, failing: &[PageId]) -> Self {
        Self {
            inner,
            failing: failing.iter().copied().collect(),
        }
    }

    fn write_failure(id: PageId) -> StoreError {
        StoreError::CorruptRow {
            id,
            reason: "disk I/O error".to_string(),
        }
    }
}

#[async_trait]
impl CatalogStore for FailingStore {
    async fn reset_schema(&self) -> StoreResult<()> {
        self.inner.reset_schema().await
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        self.inner.ensure_schema().await
    }

    async fn insert_basic_records(&self, records: &[BasicRecord]) -> StoreResult<()> {
        self.inner.insert_basic_records(records).await
    }

    async fn mark_listing_complete(&self) -> StoreResult<()> {
        self.inner.mark_listing_complete().await
    }

    async fn ids_missing(&self, stage: BackfillStage) -> StoreResult<Vec<PageId>> {
        self.inner.ids_missing(stage).await
    }

    async fn all_ids(&self) -> StoreResult<Vec<PageId>> {
        self.inner.all_ids().await
    }

    async fn set_content(&self, id: PageId, text: &str) -> StoreResult<()> {
        if self.failing.contains(&id) {
            return Err(Self::write_failure(id));
        }
        self.inner.set_content(id, text).await
    }

    async fn set_attributes(&self, batch: &[AttributeUpdate]) -> StoreResult<()> {
        if let Some(update) = batch.iter().find(|u| self.failing.contains(&u.id)) {
            return Err(Self::write_failure(update.id));
        }
        self.inner.set_attributes(batch).await
    }

    async fn all_completed_records(&self) -> StoreResult<Vec<CompletedRecord>> {
        self.inner.all_completed_records().await
    }

    async fn basic_records(&self) -> StoreResult<Vec<BasicRecord>> {
        self.inner.basic_records().await
    }

    async fn find_item(&self, id: PageId) -> StoreResult<Option<CatalogItem>> {
        self.inner.find_item(id).await
    }

    async fn stage_counts(&self) -> StoreResult<StageCounts> {
        self.inner.stage_counts().await
    }
}

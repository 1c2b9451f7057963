//! Remote catalog interface
//!
//! Read-only view of the remote service. Implementations own transport
//! concerns (rate limiting, lag backoff, retries); callers only see decoded
//! values or a `CatalogError`.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::catalog_item::{BasicRecord, ItemAttributes, PageId};
use crate::domain::cursor::ListCursor;
use crate::domain::errors::CatalogResult;

/// One page of the listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub items: Vec<BasicRecord>,
    /// `None` once the remote has no further pages
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetch one listing page starting at `cursor`.
    async fn list_page(&self, cursor: &ListCursor) -> CatalogResult<ListPage>;

    /// Fetch the full source text of a single page.
    async fn fetch_content(&self, id: PageId) -> CatalogResult<String>;

    /// Fetch attributes for up to `max_attribute_batch()` pages. Pages the
    /// remote reports as missing are left out of the returned map.
    async fn fetch_attributes(&self, ids: &[PageId]) -> CatalogResult<HashMap<PageId, ItemAttributes>>;

    /// Largest id batch accepted by `fetch_attributes`.
    fn max_attribute_batch(&self) -> usize;
}

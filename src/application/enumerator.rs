//! Paginated catalog enumeration
//!
//! Walks the remote listing page by page and persists each page as soon as it
//! arrives, so memory stays bounded by one page and an interrupted run keeps
//! everything written so far.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::catalog_client::CatalogClient;
use crate::domain::catalog_item::{BasicRecord, PageId};
use crate::domain::cursor::ListCursor;
use crate::domain::errors::{CatalogError, StoreError};
use crate::domain::repositories::CatalogStore;

#[derive(Error, Debug)]
pub enum EnumerationError {
    #[error("Listing request {page} failed: {source}")]
    Remote {
        page: usize,
        #[source]
        source: CatalogError,
    },

    #[error("Storing listing page {page} failed: {source}")]
    Store {
        page: usize,
        #[source]
        source: StoreError,
    },

    #[error("Continuation token '{token}' was returned for its own page; the listing cannot advance")]
    CursorNotAdvancing { token: String },
}

/// Outcome of one complete enumeration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumerationReport {
    /// List requests issued
    pub pages: usize,
    /// Records written to the store
    pub items_stored: usize,
    /// Items dropped because an earlier page already listed them
    pub duplicates_skipped: usize,
}

pub struct PaginatedEnumerator {
    client: Arc<dyn CatalogClient>,
    store: Arc<dyn CatalogStore>,
}

impl PaginatedEnumerator {
    pub fn new(client: Arc<dyn CatalogClient>, store: Arc<dyn CatalogStore>) -> Self {
        Self { client, store }
    }

    /// Enumerate the full listing into the store.
    ///
    /// Succeeds only when the remote reports no further continuation token.
    /// Any request, decode or store failure ends the run with an error since
    /// the stored catalog can no longer be trusted as complete.
    pub async fn enumerate(&self) -> Result<EnumerationReport, EnumerationError> {
        let mut cursor = ListCursor::Start;
        let mut seen: HashSet<PageId> = HashSet::new();
        let mut report = EnumerationReport::default();

        loop {
            let page_number = report.pages + 1;
            let page = self
                .client
                .list_page(&cursor)
                .await
                .map_err(|source| EnumerationError::Remote {
                    page: page_number,
                    source,
                })?;
            report.pages = page_number;

            let listed = page.items.len();
            let fresh: Vec<BasicRecord> = page
                .items
                .into_iter()
                .filter(|item| seen.insert(item.id))
                .collect();
            let skipped = listed - fresh.len();
            if skipped > 0 {
                warn!("Page {} repeated {} already listed items", page_number, skipped);
                report.duplicates_skipped += skipped;
            }

            self.store
                .insert_basic_records(&fresh)
                .await
                .map_err(|source| EnumerationError::Store {
                    page: page_number,
                    source,
                })?;
            report.items_stored += fresh.len();

            debug!(
                "📄 Page {}: {} items stored ({} total)",
                page_number,
                fresh.len(),
                report.items_stored
            );

            match page.next_cursor {
                Some(token) => {
                    if cursor.token() == Some(token.as_str()) {
                        return Err(EnumerationError::CursorNotAdvancing { token });
                    }
                    cursor = ListCursor::Continue(token);
                }
                None => break,
            }
        }

        self.store
            .mark_listing_complete()
            .await
            .map_err(|source| EnumerationError::Store {
                page: report.pages,
                source,
            })?;

        info!(
            "✅ Enumeration complete: {} pages, {} items",
            report.pages, report.items_stored
        );
        Ok(report)
    }
}

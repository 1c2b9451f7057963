//! Backfill passes over the local catalog
//!
//! Both passes follow the same shape: derive the worklist from the store,
//! fetch in bounded units, write each unit through the store and keep going
//! when a unit fails. Nothing besides the store's own columns carries over
//! between runs, so a pass can be interrupted and started again at any time.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::catalog_client::CatalogClient;
use crate::domain::catalog_item::{AttributeUpdate, BackfillStage, PageId};
use crate::domain::errors::StoreResult;
use crate::domain::repositories::CatalogStore;
use crate::infrastructure::config::{BackfillConfig, defaults};

/// Tuning knobs for the two passes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillOptions {
    /// Ids per attribute lookup; clamped to what the client accepts
    pub attribute_batch_size: usize,
    /// Content fetches in flight at once
    pub content_concurrency: usize,
    /// Log a progress line every N processed ids (0 disables)
    pub progress_every: usize,
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self {
            attribute_batch_size: defaults::ATTRIBUTE_BATCH_SIZE,
            content_concurrency: defaults::CONTENT_CONCURRENCY,
            progress_every: defaults::PROGRESS_EVERY,
        }
    }
}

impl From<&BackfillConfig> for BackfillOptions {
    fn from(config: &BackfillConfig) -> Self {
        Self {
            attribute_batch_size: config.attribute_batch_size,
            content_concurrency: config.content_concurrency,
            progress_every: config.progress_every,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContentPassReport {
    /// Ids taken from the worklist this run
    pub attempted: usize,
    /// Ids whose content is now stored
    pub completed: usize,
    /// Ids the remote reported as having no content
    pub not_found: usize,
    /// Every id that did not complete, `not_found` included
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttributePassReport {
    pub batches: usize,
    /// Ids whose attribute triple was written
    pub attributed: usize,
    /// Ids the remote left out of an otherwise successful batch
    pub omitted: usize,
    pub failed_batches: usize,
    /// Ids belonging to failed batches
    pub failed_items: usize,
}

pub struct BackfillCoordinator {
    client: Arc<dyn CatalogClient>,
    store: Arc<dyn CatalogStore>,
    options: BackfillOptions,
}

impl BackfillCoordinator {
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

    /// Effective attribute batch size after clamping to `1..=client max`.
    pub fn attribute_batch_size(&self) -> usize {
        let max = self.client.max_attribute_batch().max(1);
        self.options.attribute_batch_size.clamp(1, max)
    }

    fn should_log_progress(&self, processed: usize) -> bool {
        self.options.progress_every > 0 && processed % self.options.progress_every == 0
    }

    /// Fetch and store full content for every item still missing it.
    ///
    /// `limit` caps how many ids this run takes from the worklist. Failed ids
    /// keep their content absent and are picked up again by the next run.
    pub async fn backfill_content(&self, limit: Option<usize>) -> StoreResult<ContentPassReport> {
        let mut worklist = self.store.ids_missing(BackfillStage::Content).await?;
        let pending = worklist.len();
        if let Some(limit) = limit {
            worklist.truncate(limit);
        }

        let mut report = ContentPassReport {
            attempted: worklist.len(),
            ..ContentPassReport::default()
        };
        if worklist.is_empty() {
            info!("No items are missing content");
            return Ok(report);
        }

        let concurrency = self.options.content_concurrency.max(1);
        info!(
            "🚀 Content backfill: {} of {} pending items (concurrency {})",
            worklist.len(),
            pending,
            concurrency
        );

        let client = Arc::clone(&self.client);
        let mut fetches = stream::iter(worklist)
            .map(move |id| {
                let client = Arc::clone(&client);
                async move { (id, client.fetch_content(id).await) }
            })
            .buffer_unordered(concurrency);

        let mut processed = 0usize;
        while let Some((id, fetched)) = fetches.next().await {
            processed += 1;
            match fetched {
                Ok(text) => match self.store.set_content(id, &text).await {
                    Ok(()) => {
                        report.completed += 1;
                        debug!("Stored content for page {} ({} bytes)", id, text.len());
                    }
                    Err(e) => {
                        report.failed += 1;
                        warn!("⚠️ Failed to store content for page {}: {}", id, e);
                    }
                },
                Err(e) if e.is_not_found() => {
                    report.failed += 1;
                    report.not_found += 1;
                    warn!("⚠️ Page {} has no content upstream", id);
                }
                Err(e) => {
                    report.failed += 1;
                    warn!("⚠️ Failed to fetch content for page {}: {}", id, e);
                }
            }

            if self.should_log_progress(processed) {
                info!(
                    "📊 Content progress: {}/{} ({} failed)",
                    processed, report.attempted, report.failed
                );
            }
        }

        info!(
            "✅ Content backfill finished: {} completed, {} failed ({} not found)",
            report.completed, report.failed, report.not_found
        );
        Ok(report)
    }

    /// Fetch and store the attribute triple for every stored item.
    ///
    /// Each batch is one lookup and one atomic write. A failing batch leaves
    /// all of its ids untouched and the pass moves on to the next one.
    pub async fn backfill_attributes(&self) -> StoreResult<AttributePassReport> {
        let ids = self.store.all_ids().await?;
        let mut report = AttributePassReport::default();
        if ids.is_empty() {
            info!("No items to attribute");
            return Ok(report);
        }

        let batch_size = self.attribute_batch_size();
        info!(
            "🚀 Attribute backfill: {} items in batches of {}",
            ids.len(),
            batch_size
        );

        let mut processed = 0usize;
        for batch in ids.chunks(batch_size) {
            report.batches += 1;
            processed += batch.len();

            match self.attribute_batch(batch).await {
                Ok((written, omitted)) => {
                    report.attributed += written;
                    report.omitted += omitted;
                }
                Err(reason) => {
                    report.failed_batches += 1;
                    report.failed_items += batch.len();
                    warn!(
                        "⚠️ Attribute batch {} ({}..={}) failed: {}",
                        report.batches,
                        batch[0],
                        batch[batch.len() - 1],
                        reason
                    );
                }
            }

            if self.should_log_progress(processed) || processed == ids.len() {
                info!(
                    "📊 Attribute progress: {}/{} ({} batches failed)",
                    processed,
                    ids.len(),
                    report.failed_batches
                );
            }
        }

        info!(
            "✅ Attribute backfill finished: {} attributed, {} omitted, {} failed",
            report.attributed, report.omitted, report.failed_items
        );
        Ok(report)
    }

    /// Returns `(written, omitted)` for one batch.
    async fn attribute_batch(&self, batch: &[PageId]) -> Result<(usize, usize), String> {
        let mut found = self
            .client
            .fetch_attributes(batch)
            .await
            .map_err(|e| e.to_string())?;

        let updates: Vec<AttributeUpdate> = batch
            .iter()
            .filter_map(|id| {
                found.remove(id).map(|attributes| AttributeUpdate {
                    id: *id,
                    attributes,
                })
            })
            .collect();
        let omitted = batch.len() - updates.len();
        if omitted > 0 {
            debug!("{} ids missing from the attribute response", omitted);
        }

        self.store
            .set_attributes(&updates)
            .await
            .map_err(|e| e.to_string())?;
        Ok((updates.len(), omitted))
    }
}

//! SQLite implementation of the catalog store
//!
//! One `pages` table keyed by page id. Batch writes run inside a single
//! transaction so a failing row rolls back the whole call.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::debug;

use crate::domain::catalog_item::{
    AttributeUpdate, BackfillStage, BasicRecord, CatalogItem, CompletedRecord, ItemAttributes,
    PageId, StageCounts,
};
use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::repositories::CatalogStore;
use crate::infrastructure::database_connection::DatabaseConnection;

#[derive(Clone)]
pub struct SqliteCatalogRepository {
    connection: Arc<DatabaseConnection>,
}

impl SqliteCatalogRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    fn pool(&self) -> &SqlitePool {
        self.connection.pool()
    }

    fn format_touched(modified: &DateTime<Utc>) -> String {
        modified.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn parse_touched(id: PageId, raw: &str) -> StoreResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::CorruptRow {
                id,
                reason: format!("touched '{raw}' is not RFC 3339: {e}"),
            })
    }

    /// Helper method to convert a database row to a `CatalogItem`
    fn row_to_item(row: &SqliteRow) -> StoreResult<CatalogItem> {
        let id: PageId = row.try_get("id")?;
        let kind: Option<String> = row.try_get("content_model")?;
        let touched: Option<String> = row.try_get("touched")?;
        let length: Option<i64> = row.try_get("length")?;

        let attributes = match (kind, touched, length) {
            (Some(kind), Some(touched), Some(length)) => Some(ItemAttributes {
                kind,
                modified: Self::parse_touched(id, &touched)?,
                length,
            }),
            (None, None, None) => None,
            _ => {
                return Err(StoreError::CorruptRow {
                    id,
                    reason: "attribute columns are only partially set".to_string(),
                });
            }
        };

        Ok(CatalogItem {
            id,
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            attributes,
        })
    }

    fn is_unique_violation(err: &sqlx::Error) -> bool {
        err.as_database_error()
            .is_some_and(|db_err| db_err.is_unique_violation())
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogRepository {
    async fn reset_schema(&self) -> StoreResult<()> {
        self.connection.reset_schema().await?;
        Ok(())
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        self.connection.ensure_schema().await?;
        Ok(())
    }

    async fn insert_basic_records(&self, records: &[BasicRecord]) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool().begin().await?;
        for record in records {
            let result = sqlx::query("INSERT INTO pages (id, title) VALUES (?, ?)")
                .bind(record.id)
                .bind(&record.title)
                .execute(&mut *tx)
                .await;

            if let Err(err) = result {
                if Self::is_unique_violation(&err) {
                    return Err(StoreError::DuplicateKey { id: record.id });
                }
                return Err(err.into());
            }
        }
        tx.commit().await?;

        debug!("Inserted {} basic records", records.len());
        Ok(())
    }

    async fn mark_listing_complete(&self) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO sync_state (key, value) VALUES ('listing_complete', ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            ",
        )
        .bind(Self::format_touched(&Utc::now()))
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn ids_missing(&self, stage: BackfillStage) -> StoreResult<Vec<PageId>> {
        let sql = match stage {
            BackfillStage::Content => "SELECT id FROM pages WHERE content IS NULL ORDER BY id",
            BackfillStage::Attributes => {
                "SELECT id FROM pages WHERE content_model IS NULL ORDER BY id"
            }
        };
        let ids = sqlx::query_scalar::<_, PageId>(sql)
            .fetch_all(self.pool())
            .await?;
        Ok(ids)
    }

    async fn all_ids(&self) -> StoreResult<Vec<PageId>> {
        let ids = sqlx::query_scalar::<_, PageId>("SELECT id FROM pages ORDER BY id")
            .fetch_all(self.pool())
            .await?;
        Ok(ids)
    }

    async fn set_content(&self, id: PageId, text: &str) -> StoreResult<()> {
        sqlx::query("UPDATE pages SET content = ? WHERE id = ?")
            .bind(text)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn set_attributes(&self, batch: &[AttributeUpdate]) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool().begin().await?;
        for update in batch {
            sqlx::query(
                r"
                UPDATE pages
                SET content_model = ?, touched = ?, length = ?
                WHERE id = ?
                ",
            )
            .bind(&update.attributes.kind)
            .bind(Self::format_touched(&update.attributes.modified))
            .bind(update.attributes.length)
            .bind(update.id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!("Wrote attributes for {} pages", batch.len());
        Ok(())
    }

    async fn all_completed_records(&self) -> StoreResult<Vec<CompletedRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, title, content_model, touched, length
            FROM pages
            WHERE content_model IS NOT NULL AND touched IS NOT NULL AND length IS NOT NULL
            ORDER BY id
            ",
        )
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|row| -> StoreResult<CompletedRecord> {
                let id: PageId = row.try_get("id")?;
                let touched: String = row.try_get("touched")?;
                Ok(CompletedRecord {
                    title: row.try_get("title")?,
                    kind: row.try_get("content_model")?,
                    modified: Self::parse_touched(id, &touched)?,
                    length: row.try_get("length")?,
                })
            })
            .collect()
    }

    async fn basic_records(&self) -> StoreResult<Vec<BasicRecord>> {
        let rows = sqlx::query("SELECT id, title FROM pages ORDER BY id")
            .fetch_all(self.pool())
            .await?;

        rows.iter()
            .map(|row| -> StoreResult<BasicRecord> {
                Ok(BasicRecord {
                    id: row.try_get("id")?,
                    title: row.try_get("title")?,
                })
            })
            .collect()
    }

    async fn find_item(&self, id: PageId) -> StoreResult<Option<CatalogItem>> {
        let row = sqlx::query(
            "SELECT id, title, content, content_model, touched, length FROM pages WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_item(&row)?)),
            None => Ok(None),
        }
    }

    async fn stage_counts(&self) -> StoreResult<StageCounts> {
        let row = sqlx::query(
            r"
            SELECT
                COUNT(*) AS total,
                COUNT(content) AS with_content,
                COUNT(content_model) AS with_attributes,
                EXISTS (SELECT 1 FROM sync_state WHERE key = 'listing_complete')
                    AS listing_complete
            FROM pages
            ",
        )
        .fetch_one(self.pool())
        .await?;

        let to_u64 = |value: i64| u64::try_from(value).unwrap_or_default();
        Ok(StageCounts {
            total: to_u64(row.try_get("total")?),
            with_content: to_u64(row.try_get("with_content")?),
            with_attributes: to_u64(row.try_get("with_attributes")?),
            listing_complete: row.try_get::<i64, _>("listing_complete")? != 0,
        })
    }
}

// Database connection and schema management
// This module handles SQLite database connections using sqlx

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

/// Columns added by the one-time attribute expansion
const ATTRIBUTE_COLUMNS: [(&str, &str); 3] = [
    ("content_model", "TEXT"),
    ("touched", "TEXT"),
    ("length", "INTEGER"),
];

const CREATE_PAGES_SQL: &str = r"
    CREATE TABLE IF NOT EXISTS pages (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        content TEXT
    )
";

/// Key/value run markers; `listing_complete` is present only after an
/// enumeration reached its last page
const CREATE_SYNC_STATE_SQL: &str = r"
    CREATE TABLE IF NOT EXISTS sync_state (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
";

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    /// Open (creating if needed) the database at `database_url`.
    ///
    /// In-memory URLs get a single connection so every query sees the same
    /// database.
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::with_max_connections(database_url, 4).await
    }

    pub async fn with_max_connections(database_url: &str, max_connections: u32) -> Result<Self> {
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

        if !in_memory {
            let db_path = database_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            let db_path = db_path.split('?').next().unwrap_or(db_path);
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { max_connections.max(1) })
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Drop every catalog row and recreate the full schema.
    pub async fn reset_schema(&self) -> Result<(), sqlx::Error> {
        warn!("🧹 Dropping pages table for a fresh enumeration");
        let mut tx = self.pool.begin().await?;
        sqlx::query("DROP TABLE IF EXISTS pages")
            .execute(&mut *tx)
            .await?;
        sqlx::query(CREATE_PAGES_SQL).execute(&mut *tx).await?;
        Self::expand_attribute_columns(&mut tx).await?;
        sqlx::query(CREATE_SYNC_STATE_SQL).execute(&mut *tx).await?;
        sqlx::query("DELETE FROM sync_state").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Create the table if absent and apply the attribute expansion if it
    /// has not been applied yet. Existing rows are kept.
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(CREATE_PAGES_SQL).execute(&mut *tx).await?;
        Self::expand_attribute_columns(&mut tx).await?;
        sqlx::query(CREATE_SYNC_STATE_SQL).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn expand_attribute_columns(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    ) -> Result<(), sqlx::Error> {
        let existing: Vec<String> = sqlx::query("SELECT name FROM pragma_table_info('pages')")
            .fetch_all(&mut **tx)
            .await?
            .iter()
            .map(|row| row.get::<String, _>("name"))
            .collect();

        for (column, sql_type) in ATTRIBUTE_COLUMNS {
            if !existing.iter().any(|name| name == column) {
                info!("Adding column pages.{} ({})", column, sql_type);
                sqlx::query(&format!("ALTER TABLE pages ADD COLUMN {column} {sql_type}"))
                    .execute(&mut **tx)
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn column_names(db: &DatabaseConnection) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT name FROM pragma_table_info('pages')")
            .fetch_all(db.pool())
            .await?;
        Ok(rows.iter().map(|row| row.get("name")).collect())
    }

    #[tokio::test]
    async fn test_database_connection() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("nested").join("test.db");
        let database_url = format!("sqlite:{}", db_path.to_string_lossy());

        let db = DatabaseConnection::new(&database_url).await?;

        assert!(!db.pool().is_closed());
        assert!(db_path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn ensure_schema_expands_legacy_table() -> Result<()> {
        let db = DatabaseConnection::new("sqlite::memory:").await?;
        sqlx::query(CREATE_PAGES_SQL).execute(db.pool()).await?;
        sqlx::query("INSERT INTO pages (id, title) VALUES (1, 'Module:Citation')")
            .execute(db.pool())
            .await?;

        db.ensure_schema().await?;
        db.ensure_schema().await?;

        let columns = column_names(&db).await?;
        for (column, _) in ATTRIBUTE_COLUMNS {
            assert!(columns.iter().any(|c| c == column), "missing {column}");
        }
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pages")
            .fetch_one(db.pool())
            .await?;
        assert_eq!(count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn reset_schema_discards_rows() -> Result<()> {
        let db = DatabaseConnection::new("sqlite::memory:").await?;
        db.ensure_schema().await?;
        sqlx::query("INSERT INTO pages (id, title) VALUES (1, 'Module:Citation')")
            .execute(db.pool())
            .await?;

        db.reset_schema().await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pages")
            .fetch_one(db.pool())
            .await?;
        assert_eq!(count, 0);
        assert_eq!(column_names(&db).await?.len(), 6);
        Ok(())
    }
}

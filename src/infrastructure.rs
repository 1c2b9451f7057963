//! Infrastructure layer: SQLite storage, the MediaWiki HTTP client,
//! configuration and logging setup.

pub mod catalog_repository;
pub mod config;
pub mod database_connection;
pub mod logging;
pub mod mediawiki_client;

// Re-export commonly used items
pub use catalog_repository::SqliteCatalogRepository;
pub use config::{AppConfig, ConfigManager};
pub use database_connection::DatabaseConnection;
pub use logging::{get_log_directory, init_logging_with_config};
pub use mediawiki_client::{MediaWikiClient, MediaWikiClientConfig};

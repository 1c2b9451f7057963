//! Application layer module
//!
//! Orchestrates the catalog client and store: enumeration, the two backfill
//! passes, the summary report and the process-level use cases.

pub mod backfill;
pub mod enumerator;
pub mod summary;
pub mod sync_use_cases;

pub use backfill::{AttributePassReport, BackfillCoordinator, BackfillOptions, ContentPassReport};
pub use enumerator::{EnumerationError, EnumerationReport, PaginatedEnumerator};
pub use summary::{CatalogSummary, SummaryReporter};
pub use sync_use_cases::CatalogSyncUseCases;

//! Domain module - catalog entities, errors and the two collaborator seams
//!
//! `CatalogClient` is the remote side, `CatalogStore` the local side. Both are
//! injected into the application services so tests can swap in fakes.

pub mod catalog_client;
pub mod catalog_item;
pub mod cursor;
pub mod errors;
pub mod repositories;

pub use catalog_client::{CatalogClient, ListPage};
pub use catalog_item::{
    AttributeUpdate, BackfillStage, BasicRecord, CatalogItem, CompletedRecord, ItemAttributes,
    PageId, StageCounts,
};
pub use cursor::ListCursor;
pub use errors::{CatalogError, CatalogResult, StoreError, StoreResult};
pub use repositories::CatalogStore;

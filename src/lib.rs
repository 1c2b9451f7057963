//! wiki-harvest - incremental MediaWiki catalog sync
//!
//! Enumerates every page of one namespace into a local SQLite mirror, then
//! backfills page content and descriptive attributes in restartable passes.

// Module declarations
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

//! Command-line surface of the `wiki-harvest` binary.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::application::summary::DEFAULT_TOP_N;

/// Incremental harvester for a MediaWiki namespace.
#[derive(Debug, Parser)]
#[command(name = "wiki-harvest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to the per-user config directory).
    #[arg(long, global = true, env = "WIKI_HARVEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// sqlx database URL, overriding the configured one.
    #[arg(long, global = true)]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Drop the local catalog and enumerate the remote listing again.
    Resync(ResyncArgs),
    /// Fetch full content for items that do not have it yet.
    BackfillContent(BackfillContentArgs),
    /// Fetch content model, last-touched time and length for every item.
    BackfillAttributes(BackfillAttributesArgs),
    /// Print statistics over attributed items.
    Report(ReportArgs),
    /// Show per-stage completion counts.
    Status,
}

#[derive(Debug, Args)]
pub struct ResyncArgs {
    /// Confirm that existing rows may be discarded.
    #[arg(long)]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct BackfillContentArgs {
    /// Process at most this many items in this run.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Content lookups in flight at once.
    #[arg(long)]
    pub concurrency: Option<usize>,
}

#[derive(Debug, Args)]
pub struct BackfillAttributesArgs {
    /// Ids per lookup (1-50).
    #[arg(long)]
    pub batch_size: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Emit JSON instead of aligned text.
    #[arg(long)]
    pub json: bool,

    /// Number of largest pages to list.
    #[arg(long, default_value_t = DEFAULT_TOP_N)]
    pub top: usize,
}

//! `wiki-harvest` binary entry point.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use wiki_harvest::application::{BackfillOptions, CatalogSyncUseCases};
use wiki_harvest::cli::{Cli, Commands};
use wiki_harvest::domain::{BackfillStage, CatalogClient, CatalogStore};
use wiki_harvest::infrastructure::{
    AppConfig, ConfigManager, DatabaseConnection, MediaWikiClient, MediaWikiClientConfig,
    SqliteCatalogRepository, init_logging_with_config,
};

const INCOMPLETE_LISTING_HINT: &str =
    "Listing incomplete: no resync has reached the final page. Run `wiki-harvest resync --yes`.";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new()?,
    };
    let created = !manager.exists();
    let mut config = manager.load_config().await?;
    if let Some(database) = &cli.database {
        config.store.database_url.clone_from(database);
    }

    init_logging_with_config(&config.logging)?;
    if created {
        info!("Created default configuration at {}", manager.config_path().display());
    } else {
        info!("Loaded configuration from {}", manager.config_path().display());
    }

    let use_cases = build_use_cases(&config).await?;
    run(cli.command, &use_cases).await
}

async fn build_use_cases(config: &AppConfig) -> Result<CatalogSyncUseCases> {
    let connection = DatabaseConnection::with_max_connections(
        &config.store.database_url,
        config.store.max_connections,
    )
    .await
    .with_context(|| format!("Failed to open {}", config.store.database_url))?;
    let store: Arc<dyn CatalogStore> =
        Arc::new(SqliteCatalogRepository::new(Arc::new(connection)));

    let client: Arc<dyn CatalogClient> = Arc::new(MediaWikiClient::new(
        MediaWikiClientConfig::from_remote_config(&config.remote),
    )?);

    Ok(CatalogSyncUseCases::new(
        client,
        store,
        BackfillOptions::from(&config.backfill),
    ))
}

async fn run(command: Commands, use_cases: &CatalogSyncUseCases) -> Result<()> {
    match command {
        Commands::Resync(args) => {
            if !args.yes {
                bail!("resync discards every stored row; rerun with --yes to confirm");
            }
            let report = use_cases.full_resync().await?;
            println!(
                "Enumerated {} pages in {} requests ({} duplicates skipped)",
                report.items_stored, report.pages, report.duplicates_skipped
            );
        }
        Commands::BackfillContent(args) => {
            let report = use_cases
                .backfill_content(args.limit, args.concurrency)
                .await?;
            println!(
                "Content: {} attempted, {} completed, {} failed ({} not found)",
                report.attempted, report.completed, report.failed, report.not_found
            );
        }
        Commands::BackfillAttributes(args) => {
            let report = use_cases.backfill_attributes(args.batch_size).await?;
            println!(
                "Attributes: {} written, {} omitted, {} failed in {} of {} batches",
                report.attributed,
                report.omitted,
                report.failed_items,
                report.failed_batches,
                report.batches
            );
        }
        Commands::Report(args) => {
            let summary = use_cases.report(args.top).await?;
            if !use_cases.status().await?.listing_complete {
                eprintln!("{INCOMPLETE_LISTING_HINT}");
            }
            if args.json {
                println!("{}", summary.to_json()?);
            } else {
                print!("{summary}");
            }
        }
        Commands::Status => {
            let counts = use_cases.status().await?;
            println!("Pages:           {}", counts.total);
            println!(
                "With content:    {} ({} missing)",
                counts.with_content,
                counts.missing(BackfillStage::Content)
            );
            println!(
                "With attributes: {} ({} missing)",
                counts.with_attributes,
                counts.missing(BackfillStage::Attributes)
            );
            if !counts.listing_complete {
                println!("{INCOMPLETE_LISTING_HINT}");
            }
        }
    }
    Ok(())
}

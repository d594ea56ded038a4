//! CLI entry point for the bookfetch tool.

use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use bookfetch_core::download::CONNECT_TIMEOUT_SECS;
use bookfetch_core::{
    AcquisitionPipeline, AttemptBudget, AvoidedKeywords, CatalogScanner, CatalogSource,
    Database, DownloadManager, HttpClient, HttpSettings, LibgenAdsLinkResolver, LibgenIndex,
    NamedSet, PipelineSettings, ProgressDisplay, QualificationFilter, QualificationThresholds,
    StateStore,
};
use clap::Parser;
use tracing::{debug, info};

mod app_config;
mod cli;

use app_config::{FileConfig, RunSettings, load_default_file_config, resolve_db_path};
use cli::{Cli, Command, KeywordsCommand, RunArgs};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    debug!(?cli, "CLI arguments parsed");

    let loaded = load_default_file_config()?;
    if let Some(path) = loaded.path.as_deref() {
        debug!(path = %path.display(), loaded = loaded.config.is_some(), "config file");
    }
    let file = loaded.config.as_ref();

    match &cli.command {
        Command::Run(args) => run(args, &cli, file).await,
        Command::Keywords { command } => {
            let db_path = resolve_db_path(cli.db.as_deref(), file.and_then(|f| f.db.as_deref()));
            keywords(command, &db_path).await
        }
        Command::Status(args) => {
            let db_path = resolve_db_path(cli.db.as_deref(), file.and_then(|f| f.db.as_deref()));
            status(&args.query, &db_path).await
        }
    }
}

/// Priority: `RUST_LOG` env var > quiet flag > verbose flag > default (info).
fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn open_store(db_path: &Path) -> Result<(Database, StateStore)> {
    let db = Database::new(db_path)
        .await
        .with_context(|| format!("Failed to open state database '{}'", db_path.display()))?;
    let store = StateStore::new(db.clone());
    Ok((db, store))
}

async fn run(args: &RunArgs, cli: &Cli, file: Option<&FileConfig>) -> Result<()> {
    let settings = RunSettings::resolve(args, cli.db.as_deref(), file);
    debug!(?settings, "run settings resolved");

    if !settings.output_dir.is_dir() {
        bail!(
            "Output directory '{}' does not exist",
            settings.output_dir.display()
        );
    }

    let (db, store) = open_store(&settings.db).await?;

    let source = match settings.catalog_lines {
        Some(lines) => CatalogSource::with_line_count(&settings.catalog, lines),
        None => CatalogSource::counted(&settings.catalog)
            .await
            .with_context(|| {
                format!("Failed to read catalog '{}'", settings.catalog.display())
            })?,
    };
    let scanner = CatalogScanner::open(
        &source,
        &settings.query,
        store.clone(),
        AttemptBudget::new(settings.max_attempts),
    )
    .await
    .context("Failed to open catalog scanner")?;

    let avoided = AvoidedKeywords::load(&store)
        .await
        .context("Failed to load avoided keywords")?;
    info!(keywords = avoided.len(), "avoided keywords loaded");
    let filter = QualificationFilter::new(
        QualificationThresholds {
            min_ratings_count: settings.min_ratings_count,
            min_average_rating: settings.min_average_rating,
        },
        avoided,
    );

    let http = HttpClient::new(&HttpSettings {
        connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
        request_timeout: settings.request_timeout,
        proxy: settings.proxy.clone(),
    })?;
    let index = LibgenIndex::new(http.inner().clone(), &settings.search_mirror)?
        .with_timeout(settings.page_timeout);
    let links = LibgenAdsLinkResolver::new(http.inner().clone(), &settings.download_mirror)?
        .with_timeout(settings.page_timeout);

    let progress = if settings.progress && !cli.quiet && io::stderr().is_terminal() {
        ProgressDisplay::Terminal
    } else {
        ProgressDisplay::Hidden
    };
    let downloads = DownloadManager::new(http, Arc::new(links), progress);

    let pipeline = AcquisitionPipeline::new(
        store,
        scanner,
        filter,
        Arc::new(index),
        downloads,
        PipelineSettings {
            output_dir: settings.output_dir.clone(),
            size_ceiling: settings.size_ceiling,
        },
    );

    let result = pipeline.run().await;
    db.close().await;
    let summary = result.context("Acquisition run aborted")?;

    info!(
        stop = %summary.stop,
        malformed = summary.malformed,
        rejected = summary.total_rejected(),
        search_failures = summary.search_failures,
        no_candidates = summary.no_candidates,
        nothing_selected = summary.nothing_selected,
        "run summary"
    );
    for (reason, count) in &summary.rejected {
        debug!(reason, count, "rejections");
    }
    Ok(())
}

async fn keywords(command: &KeywordsCommand, db_path: &Path) -> Result<()> {
    let (db, store) = open_store(db_path).await?;
    match command {
        KeywordsCommand::Add { keywords } => {
            for keyword in keywords {
                let added = store.add_member(NamedSet::AvoidedKeywords, keyword).await?;
                println!("{} {keyword}", if added { "added" } else { "exists" });
            }
        }
        KeywordsCommand::Remove { keywords } => {
            for keyword in keywords {
                let removed = store
                    .remove_member(NamedSet::AvoidedKeywords, keyword)
                    .await?;
                println!("{} {keyword}", if removed { "removed" } else { "absent" });
            }
        }
        KeywordsCommand::List => {
            for keyword in store.members(NamedSet::AvoidedKeywords).await? {
                println!("{keyword}");
            }
        }
    }
    db.close().await;
    Ok(())
}

async fn status(query: &str, db_path: &Path) -> Result<()> {
    let (db, store) = open_store(db_path).await?;
    let cursor = store.get_cursor(query).await?;
    let attempted = store.count_members(NamedSet::AttemptedRecords).await?;
    match cursor {
        Some(cursor) => println!("query: {query}\ncursor: {cursor}"),
        None => println!("query: {query}\ncursor: none"),
    }
    println!("attempted records: {attempted}");
    db.close().await;
    Ok(())
}

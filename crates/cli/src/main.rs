//! quire registry maintenance binary.
//!
//! Offline commands for the shared parser registry: refresh it from a
//! script corpus, inspect it, wipe it, and move it between machines as a
//! manifest plus script files. Conversion jobs are run by embedding
//! applications; this binary only maintains what those jobs read.
//! Logging goes to stderr so command output stays clean on stdout.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use quire_core::registry::manifest::{self, DomainManifest};
use quire_core::{AppConfig, RegistryDb};

#[cfg(feature = "render")]
use quire_client::render::ChromiumRenderer;
#[cfg(feature = "render")]
use quire_client::{EngineConfig, ScriptEngine, SupportBundle};
#[cfg(feature = "render")]
use quire_engine::{LogObserver, RefreshOptions, RegistryRefresher, RegistryWarmth, ScriptCorpus};

/// Maintain the quire parser registry.
#[derive(Parser, Debug)]
#[command(name = "quire")]
#[command(version, about = "Maintain the quire parser registry", long_about = None)]
struct Cli {
    /// Registry database path (overrides QUIRE_DB_PATH).
    #[arg(long, global = true, value_name = "FILE")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild the registry from a directory of site scripts.
    #[cfg(feature = "render")]
    Refresh {
        /// Script corpus directory (overrides QUIRE_CORPUS_DIR).
        #[arg(long, value_name = "DIR")]
        corpus: Option<PathBuf>,

        /// Scan only the first N corpus scripts.
        #[arg(long, value_name = "N")]
        limit: Option<usize>,

        /// Scripts per batch.
        #[arg(long, value_name = "N")]
        batch_size: Option<usize>,
    },

    /// Show the record count and database path.
    Status,

    /// Delete every shared parser record.
    Clear,

    /// Write the registry manifest as JSON.
    Export {
        /// Output file.
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },

    /// Rebuild the registry from a manifest and a script directory.
    Import {
        /// Manifest JSON file.
        #[arg(long, value_name = "FILE")]
        manifest: PathBuf,

        /// Directory holding the script file behind every manifest entry.
        #[arg(long, value_name = "DIR")]
        scripts: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load().context("loading configuration")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    tracing::debug!(db = %config.db_path.display(), "configuration loaded");

    match cli.command {
        #[cfg(feature = "render")]
        Command::Refresh { corpus, limit, batch_size } => {
            cmd_refresh(&config, corpus, limit, batch_size).await
        }
        Command::Status => cmd_status(&config).await,
        Command::Clear => cmd_clear(&config).await,
        Command::Export { out } => cmd_export(&config, &out).await,
        Command::Import { manifest, scripts } => cmd_import(&config, &manifest, &scripts).await,
    }
}

async fn open_registry(config: &AppConfig) -> anyhow::Result<RegistryDb> {
    RegistryDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening registry at {}", config.db_path.display()))
}

#[cfg(feature = "render")]
async fn cmd_refresh(
    config: &AppConfig,
    corpus: Option<PathBuf>,
    limit: Option<usize>,
    batch_size: Option<usize>,
) -> anyhow::Result<()> {
    let corpus_dir = match corpus {
        Some(dir) => dir,
        None => config.require_corpus_dir()?.to_path_buf(),
    };
    let corpus = ScriptCorpus::from_dir(&corpus_dir)
        .with_context(|| format!("loading corpus from {}", corpus_dir.display()))?;

    let support = match config.support_dir.as_deref() {
        Some(dir) => SupportBundle::from_dir(dir)
            .with_context(|| format!("loading support scripts from {}", dir.display()))?,
        None => SupportBundle::bundled(),
    };

    let db = open_registry(config).await?;
    let renderer = ChromiumRenderer::launch().await.context("launching browser")?;
    let engine = ScriptEngine::with_config(
        support,
        EngineConfig { script_timeout: config.script_timeout() },
    );
    let options = RefreshOptions {
        batch_size: batch_size.unwrap_or(config.refresh_batch_size),
        limit,
    };

    let refresher = RegistryRefresher::with_options(
        db,
        std::sync::Arc::new(renderer),
        engine,
        std::sync::Arc::new(RegistryWarmth::new()),
        options,
    );

    let summary = refresher.refresh(&corpus, &LogObserver).await?;
    println!(
        "scanned {} scripts: {} committed, {} failed, {} batches",
        summary.scanned, summary.committed, summary.failed, summary.batches
    );
    Ok(())
}

async fn cmd_status(config: &AppConfig) -> anyhow::Result<()> {
    let db = open_registry(config).await?;
    let count = db.parser_count().await?;
    println!("{} parser records in {}", count, config.db_path.display());
    Ok(())
}

async fn cmd_clear(config: &AppConfig) -> anyhow::Result<()> {
    let db = open_registry(config).await?;
    let deleted = db.clear_parsers().await?;
    println!("deleted {deleted} parser records");
    Ok(())
}

async fn cmd_export(config: &AppConfig, out: &Path) -> anyhow::Result<()> {
    let db = open_registry(config).await?;
    let manifest = manifest::export_manifest(&db).await?;
    let json = serde_json::to_string_pretty(&manifest)?;
    std::fs::write(out, json).with_context(|| format!("writing {}", out.display()))?;
    println!("exported {} records to {}", manifest.len(), out.display());
    Ok(())
}

async fn cmd_import(
    config: &AppConfig,
    manifest_path: &Path,
    scripts: &Path,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(manifest_path)
        .with_context(|| format!("reading {}", manifest_path.display()))?;
    let manifest: DomainManifest = serde_json::from_str(&raw).context("parsing manifest")?;

    let db = open_registry(config).await?;
    let written = manifest::import_manifest(&db, &manifest, scripts).await?;
    println!("imported {written} parser records");
    Ok(())
}

//! Sluice - streaming record ingestion tool

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sluice_common::logging::{init_logging, LogConfig, LogLevel};
use sluice_ingest::{IngestPipeline, PipelineConfig, PipelineOutcome, RecordStore};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sluice")]
#[command(author, version, about = "Streaming record ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Ingest a delimited-text file in batches
    Ingest(IngestArgs),
}

#[derive(clap::Args, Debug)]
struct IngestArgs {
    /// Input file (CSV with a header row)
    file: PathBuf,

    /// Records per batch
    #[arg(long, env = "SLUICE_BATCH_CAPACITY", default_value_t = 1000)]
    batch_capacity: usize,

    /// Maximum store writes in flight at once
    #[arg(long, env = "SLUICE_CONCURRENCY", default_value_t = 5)]
    concurrency: usize,

    /// Drain window for in-flight writes after a failure, in seconds
    #[arg(long, env = "SLUICE_DRAIN_TIMEOUT_SECS", default_value_t = 60)]
    drain_timeout_secs: u64,

    /// Postgres connection string to ingest into
    #[cfg(feature = "database")]
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbose flag
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::from_env()
        .unwrap_or_default()
        .with_level(log_level);
    init_logging(&log_config)?;

    match cli.command {
        Command::Ingest(args) => run_ingest(args).await?,
    }

    Ok(())
}

async fn run_ingest(args: IngestArgs) -> Result<()> {
    let config = PipelineConfig::new()
        .with_batch_capacity(args.batch_capacity)
        .with_concurrency_limit(args.concurrency)
        .with_drain_timeout(Duration::from_secs(args.drain_timeout_secs));

    let store = build_store(&args).await?;

    let file = tokio::fs::File::open(&args.file)
        .await
        .with_context(|| format!("Failed to open {}", args.file.display()))?;

    info!(file = %args.file.display(), "starting ingestion");
    let mut pipeline = IngestPipeline::with_config(store, config);

    match pipeline.run(file).await {
        PipelineOutcome::Success { batches, records } => {
            info!(batches, records, "ingestion succeeded");
            Ok(())
        },
        PipelineOutcome::Failure {
            batches,
            records,
            error,
        } => Err(anyhow::Error::new(error).context(format!(
            "ingestion failed after {batches} batches ({records} records submitted)"
        ))),
    }
}

#[cfg(feature = "database")]
async fn build_store(args: &IngestArgs) -> Result<Arc<dyn RecordStore>> {
    use sluice_ingest::PostgresStore;

    match &args.database_url {
        Some(url) => {
            let pool = sqlx::PgPool::connect(url)
                .await
                .context("Failed to connect to Postgres")?;
            info!("ingesting into Postgres");
            Ok(Arc::new(PostgresStore::new(pool)))
        },
        None => {
            info!("no database target; using in-memory store (dry run)");
            Ok(Arc::new(sluice_ingest::MemoryStore::new()))
        },
    }
}

#[cfg(not(feature = "database"))]
async fn build_store(_args: &IngestArgs) -> Result<Arc<dyn RecordStore>> {
    info!("using in-memory store (dry run)");
    Ok(Arc::new(sluice_ingest::MemoryStore::new()))
}

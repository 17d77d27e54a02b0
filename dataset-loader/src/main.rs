use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use velostat::archive::Archive;
use velostat::config::VelostatConfig;
use velostat::{IngestError, Ingestor, SqliteStore};

/// Replay an archive of parkings snapshots into the database.
#[derive(Parser, Debug)]
#[command(name = "dataset-loader", version)]
struct Args {
    /// Directory of parkings-<unix>.json[.gz] snapshots
    #[arg(short = 'f', long = "file", default_value = "velobike-parkings")]
    file: PathBuf,

    /// SQLite database path
    #[arg(short = 'c', long = "database", env = "VELOSTAT_DB")]
    database: Option<PathBuf>,

    /// Records per transaction
    #[arg(long)]
    batch_size: Option<usize>,
}

impl Args {
    /// Every missing argument, reported together
    fn problems(&self) -> Vec<&'static str> {
        let mut problems = Vec::new();
        if self.file.as_os_str().is_empty() {
            problems.push("no archive directory provided");
        }
        if self.database.is_none() {
            problems.push("no database path provided");
        }
        problems
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dataset_loader=info,velostat=info".into()),
        )
        .init();

    let args = Args::parse();
    let problems = args.problems();
    if !problems.is_empty() {
        bail!("{}", problems.join("; "));
    }

    let mut config = VelostatConfig::default().with_env_overrides();
    if let Some(database) = args.database {
        config.storage.path = database;
    }
    if let Some(batch_size) = args.batch_size {
        config.ingest.batch_size = batch_size;
    }

    let store = SqliteStore::open(&config.storage.path, config.storage.busy_timeout())
        .map_err(IngestError::storage_unavailable)?;

    let archive = Archive::open(&args.file)
        .with_context(|| format!("Failed to read archive {}", args.file.display()))?;
    if archive.is_empty() {
        info!(directory = %args.file.display(), "Archive holds no snapshots, nothing to import");
        return Ok(());
    }

    let ingestor = Ingestor::new(&config);
    let summary = ingestor.run_bulk(&archive, store).await?;

    info!(
        snapshots = summary.snapshots,
        rows = summary.rows,
        database = %config.storage.path.display(),
        "Dataset loaded"
    );

    Ok(())
}

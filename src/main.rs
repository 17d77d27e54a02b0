use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use velostat::config::{load_config, VelostatConfig};
use velostat::error::IngestError;
use velostat::source::{ParkingSource, VelobikeClient};
use velostat::{Ingestor, SqliteStore};

/// Poll the parkings API and record time-in-state for every station.
#[derive(Parser, Debug)]
#[command(name = "velostat", version)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides config)
    #[arg(short = 'c', long = "database", env = "VELOSTAT_DB")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "velostat=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => VelostatConfig::default(),
    };
    let mut config = config.with_env_overrides();
    if let Some(database) = args.database {
        config.storage.path = database;
    }

    info!(
        api_url = %config.source.base_url,
        database = %config.storage.path.display(),
        poll_interval_secs = config.source.poll_interval().as_secs(),
        batch_size = config.ingest.batch_size,
        "Velostat starting"
    );

    let store = SqliteStore::open(&config.storage.path, config.storage.busy_timeout())
        .map_err(IngestError::storage_unavailable)?;
    info!("Storage ready");

    let client = VelobikeClient::new(&config.source.base_url, config.source.request_timeout())
        .context("Failed to build parkings API client")?;
    if let Some(dir) = &config.source.archive_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create archive directory {}", dir.display()))?;
        info!(directory = %dir.display(), "Archiving fetched snapshots");
    }
    let source: Arc<dyn ParkingSource> = Arc::new(client);

    let ingestor = Ingestor::new(&config);
    let handle = ingestor.start_live(source, store);

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    handle.abort();
    info!("Velostat stopped");

    Ok(())
}

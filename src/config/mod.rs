use crate::ingest::DEFAULT_BATCH_SIZE;
use crate::source::BASE_URL;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete velostat configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VelostatConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
}

/// Parkings API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Upper bound on one API request (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Live polling interval (seconds); also seeds a new station's time in state
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Record every fetched list here for later bulk replay
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,
}

fn default_base_url() -> String {
    BASE_URL.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    60
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_seconds: default_request_timeout(),
            poll_interval_seconds: default_poll_interval(),
            archive_dir: None,
        }
    }
}

impl SourceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Analytics store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// How long a statement waits on a locked database (seconds)
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_seconds: u64,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("velostat.db")
}

fn default_busy_timeout() -> u64 {
    60
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            busy_timeout_seconds: default_busy_timeout(),
        }
    }
}

impl StorageConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_seconds)
    }
}

/// Batching and queueing
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Records per transaction
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Records buffered between a cycle and the writer
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_queue_capacity() -> usize {
    500
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// State tracker configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackerConfig {
    /// Forget stations unseen for this long (seconds). Unset keeps every
    /// station for the life of the process.
    #[serde(default)]
    pub evict_after_seconds: Option<u64>,
}

impl VelostatConfig {
    /// Apply `VELOSTAT_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("VELOSTAT_DB") {
            if !v.is_empty() {
                self.storage.path = PathBuf::from(v);
            }
        }
        if let Ok(v) = std::env::var("VELOSTAT_API_URL") {
            if !v.is_empty() {
                self.source.base_url = v;
            }
        }
        if let Ok(v) = std::env::var("VELOSTAT_POLL_INTERVAL_SECONDS") {
            if let Ok(n) = v.parse::<u64>() {
                self.source.poll_interval_seconds = n;
            }
        }
        if let Ok(v) = std::env::var("VELOSTAT_BATCH_SIZE") {
            if let Ok(n) = v.parse::<usize>() {
                self.ingest.batch_size = n;
            }
        }

        self
    }
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<VelostatConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: VelostatConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env-mutating tests share the process environment
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let config = VelostatConfig::default();
        assert_eq!(config.source.base_url, "https://velobike.ru");
        assert_eq!(config.source.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.source.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.storage.path, PathBuf::from("velostat.db"));
        assert_eq!(config.ingest.batch_size, 50_000);
        assert_eq!(config.ingest.queue_capacity, 500);
        assert_eq!(config.tracker.evict_after_seconds, None);
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [source]
            base_url = "http://localhost:8080"
            request_timeout_seconds = 5
            poll_interval_seconds = 30
            archive_dir = "/var/lib/velostat/archive"

            [storage]
            path = "/tmp/parkings.db"
            busy_timeout_seconds = 10

            [ingest]
            batch_size = 1000
            queue_capacity = 50

            [tracker]
            evict_after_seconds = 86400
        "#;

        let config: VelostatConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.source.base_url, "http://localhost:8080");
        assert_eq!(config.source.poll_interval_seconds, 30);
        assert_eq!(
            config.source.archive_dir,
            Some(PathBuf::from("/var/lib/velostat/archive"))
        );
        assert_eq!(config.storage.busy_timeout(), Duration::from_secs(10));
        assert_eq!(config.ingest.batch_size, 1000);
        assert_eq!(config.ingest.queue_capacity, 50);
        assert_eq!(config.tracker.evict_after_seconds, Some(86400));
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [ingest]
            batch_size = 10
        "#;

        let config: VelostatConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.ingest.batch_size, 10);
        assert_eq!(config.ingest.queue_capacity, 500); // Default
        assert_eq!(config.source.poll_interval_seconds, 60); // Default
    }

    #[test]
    fn test_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        std::env::set_var("VELOSTAT_DB", "/data/velostat.db");
        std::env::set_var("VELOSTAT_POLL_INTERVAL_SECONDS", "120");
        std::env::set_var("VELOSTAT_BATCH_SIZE", "not-a-number");

        let config = VelostatConfig::default().with_env_overrides();
        assert_eq!(config.storage.path, PathBuf::from("/data/velostat.db"));
        assert_eq!(config.source.poll_interval_seconds, 120);
        assert_eq!(config.ingest.batch_size, 50_000); // Unparsable value ignored

        std::env::remove_var("VELOSTAT_DB");
        std::env::remove_var("VELOSTAT_POLL_INTERVAL_SECONDS");
        std::env::remove_var("VELOSTAT_BATCH_SIZE");
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config("/nonexistent/velostat.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/velostat.toml"));
    }
}

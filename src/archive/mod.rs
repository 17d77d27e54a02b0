use crate::source::{Parking, ParkingSource, Parkings};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[cfg(test)]
mod tests;

const NAME_PREFIX: &str = "parkings-";

/// Directory of recorded parkings snapshots, replayed in timestamp order.
///
/// Each snapshot is one file named `parkings-<unix seconds>.json` or
/// `parkings-<unix seconds>.json.gz` holding the API response body.
#[derive(Debug)]
pub struct Archive {
    directory: PathBuf,
    snapshots: Vec<ArchivedSnapshot>,
}

/// One recorded snapshot
#[derive(Clone, Debug, PartialEq)]
pub struct ArchivedSnapshot {
    /// Capture time, taken from the file name
    pub timestamp: DateTime<Utc>,
    pub path: PathBuf,
}

impl Archive {
    /// Scan `directory` for snapshot files.
    ///
    /// Files that do not follow the naming scheme are ignored, as are empty
    /// files. A matching name with an unparsable timestamp is an error.
    pub fn open(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        let entries = fs::read_dir(&directory)
            .with_context(|| format!("Failed to read archive directory {}", directory.display()))?;

        let mut snapshots = Vec::new();

        for entry in entries {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let file_name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };

            let timestamp = match parse_snapshot_name(file_name) {
                Some(ts) => ts?,
                None => {
                    debug!(file = %file_name, "Skipping non-snapshot file");
                    continue;
                }
            };

            let size = entry
                .metadata()
                .with_context(|| format!("Failed to stat {}", path.display()))?
                .len();
            if size == 0 {
                warn!(file = %file_name, "Skipping empty snapshot file");
                continue;
            }

            snapshots.push(ArchivedSnapshot { timestamp, path });
        }

        // Ties are broken by path so replay order is deterministic
        snapshots.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.path.cmp(&b.path)));

        info!(
            directory = %directory.display(),
            snapshots = snapshots.len(),
            "Opened snapshot archive"
        );

        Ok(Self {
            directory,
            snapshots,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Snapshots in ascending timestamp order
    pub fn snapshots(&self) -> &[ArchivedSnapshot] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl ArchivedSnapshot {
    /// Read and decode the snapshot (gzip if the name ends in `.gz`)
    pub fn load(&self) -> Result<Parkings> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open snapshot {}", self.path.display()))?;

        let is_compressed = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext == "gz")
            .unwrap_or(false);

        let mut json = String::new();
        if is_compressed {
            GzDecoder::new(file)
                .read_to_string(&mut json)
                .context("Failed to decompress snapshot file")?;
        } else {
            let mut file = file;
            file.read_to_string(&mut json)
                .context("Failed to read snapshot file")?;
        }

        serde_json::from_str(&json)
            .with_context(|| format!("Failed to decode snapshot {}", self.path.display()))
    }
}

#[async_trait]
impl ParkingSource for ArchivedSnapshot {
    fn name(&self) -> &str {
        "archive"
    }

    async fn list_parkings(&self) -> Result<Vec<Parking>> {
        let snapshot = self.clone();
        let parkings = tokio::task::spawn_blocking(move || snapshot.load())
            .await
            .context("Snapshot loader task failed")??;
        Ok(parkings.items)
    }
}

/// Parse `parkings-<unix>.json[.gz]`.
///
/// Returns `None` when the name does not follow the scheme at all.
pub fn parse_snapshot_name(file_name: &str) -> Option<Result<DateTime<Utc>>> {
    let stem = file_name
        .strip_suffix(".json.gz")
        .or_else(|| file_name.strip_suffix(".json"))?;
    let unix = stem.strip_prefix(NAME_PREFIX)?;

    Some(
        unix.parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| anyhow!("Invalid timestamp in snapshot name '{}'", file_name)),
    )
}

/// File name for a snapshot captured at `timestamp`
pub fn snapshot_file_name(timestamp: DateTime<Utc>, compressed: bool) -> String {
    let ext = if compressed { "json.gz" } else { "json" };
    format!("{}{}.{}", NAME_PREFIX, timestamp.timestamp(), ext)
}

/// Write a snapshot into `directory`.
///
/// Uses atomic write: writes to a .tmp file, fsyncs, then renames, so a
/// concurrent replay never reads a partial snapshot. Names have one-second
/// resolution; an existing snapshot for the same second is never replaced.
pub fn save_snapshot(
    directory: &Path,
    timestamp: DateTime<Utc>,
    parkings: &Parkings,
    compressed: bool,
) -> Result<PathBuf> {
    let file_name = snapshot_file_name(timestamp, compressed);
    let path = directory.join(&file_name);
    if path.exists() {
        bail!("Snapshot {} already exists", path.display());
    }

    let json = serde_json::to_vec(parkings).context("Failed to serialize snapshot")?;
    let tmp_path = directory.join(format!("{}.tmp", file_name));

    {
        let tmp_file =
            File::create(&tmp_path).context("Failed to create temporary snapshot file")?;

        let file = if compressed {
            let mut encoder = GzEncoder::new(tmp_file, Compression::default());
            encoder
                .write_all(&json)
                .context("Failed to write compressed snapshot data")?;
            encoder.finish().context("Failed to finish compression")?
        } else {
            let mut file = tmp_file;
            file.write_all(&json)
                .context("Failed to write snapshot data")?;
            file
        };

        file.sync_all()
            .context("Failed to sync snapshot file to disk")?;
    }

    fs::rename(&tmp_path, &path).context("Failed to rename temporary snapshot file")?;

    Ok(path)
}

/// Records the list fetched by one live cycle into an archive directory,
/// named after the cycle timestamp, so the bulk loader can replay the run
/// with the same timestamps.
///
/// A failed write is logged and does not fail the fetch.
pub struct ArchivingSource<'a> {
    inner: &'a dyn ParkingSource,
    directory: &'a Path,
    timestamp: DateTime<Utc>,
}

impl<'a> ArchivingSource<'a> {
    /// `timestamp` should have whole-second precision to match the file name.
    pub fn new(inner: &'a dyn ParkingSource, directory: &'a Path, timestamp: DateTime<Utc>) -> Self {
        Self {
            inner,
            directory,
            timestamp,
        }
    }
}

#[async_trait]
impl<'a> ParkingSource for ArchivingSource<'a> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn list_parkings(&self) -> Result<Vec<Parking>> {
        let items = self.inner.list_parkings().await?;
        let parkings = Parkings { items };
        let directory = self.directory.to_path_buf();
        let timestamp = self.timestamp;

        let parkings = tokio::task::spawn_blocking(move || {
            match save_snapshot(&directory, timestamp, &parkings, true) {
                Ok(path) => debug!(path = %path.display(), "Archived parkings snapshot"),
                Err(e) => warn!(error = %e, "Failed to archive parkings snapshot"),
            }
            parkings
        })
        .await
        .context("Snapshot archiver task failed")?;

        Ok(parkings.items)
    }
}

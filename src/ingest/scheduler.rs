//! Drives ingestion cycles: once over an archive, or forever on an interval.

use crate::archive::{Archive, ArchivingSource};
use crate::config::VelostatConfig;
use crate::error::{IngestError, Result};
use crate::ingest::batch::BatchWriter;
use crate::ingest::pipeline::{fetch, forward, run_cycle};
use crate::record::OutputRecord;
use crate::source::{Parking, ParkingSource};
use crate::state::StateTracker;
use crate::store::Storage;
use chrono::{DateTime, SubsecRound, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Status of the live tracking loop.
#[derive(Clone, Debug, Default)]
pub struct LiveStatus {
    /// Timestamp of the last successful cycle
    pub last_cycle: Option<DateTime<Utc>>,
    /// Last error message (if any)
    pub last_error: Option<String>,
    /// Total number of successful cycles
    pub cycle_count: u64,
    /// Total number of failed cycles
    pub error_count: u64,
    /// Rows committed across all cycles
    pub rows_written: u64,
}

/// Outcome of a bulk replay
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BulkSummary {
    pub snapshots: usize,
    pub rows: usize,
}

/// Ingestion context: owns the state tracker and the batching settings, and
/// runs cycles against it.
///
/// The tracker is the only state shared between cycles. It sits behind an
/// async mutex and the live loop runs one cycle at a time, so station states
/// are never advanced concurrently.
pub struct Ingestor {
    tracker: Arc<Mutex<StateTracker>>,
    batch_size: usize,
    queue_capacity: usize,
    default_increment: Duration,
    poll_interval: Duration,
    evict_after: Option<Duration>,
    archive_dir: Option<PathBuf>,
    status: Arc<Mutex<LiveStatus>>,
}

impl Ingestor {
    pub fn new(config: &VelostatConfig) -> Self {
        Self {
            tracker: Arc::new(Mutex::new(StateTracker::new())),
            batch_size: config.ingest.batch_size.max(1),
            queue_capacity: config.ingest.queue_capacity.max(1),
            default_increment: config.source.poll_interval(),
            poll_interval: config.source.poll_interval(),
            evict_after: config.tracker.evict_after_seconds.map(Duration::from_secs),
            archive_dir: config.source.archive_dir.clone(),
            status: Arc::new(Mutex::new(LiveStatus::default())),
        }
    }

    /// Shared handle to the tracker
    pub fn tracker(&self) -> Arc<Mutex<StateTracker>> {
        Arc::clone(&self.tracker)
    }

    /// Returns a clone of the status tracker for external monitoring.
    pub fn status(&self) -> Arc<Mutex<LiveStatus>> {
        Arc::clone(&self.status)
    }

    /// Replay every archived snapshot in timestamp order.
    ///
    /// All cycles feed one writer, so transactions span snapshot boundaries.
    /// Stops at the first failure; rows committed before it stay durable.
    pub async fn run_bulk<S>(&self, archive: &Archive, storage: S) -> Result<BulkSummary>
    where
        S: Storage + 'static,
    {
        info!(
            directory = %archive.directory().display(),
            snapshots = archive.len(),
            batch_size = self.batch_size,
            "Starting bulk import"
        );

        let (tx, writer) = self.spawn_writer(storage);

        let mut snapshots = 0;
        let mut cycle_result = Ok(());
        for snapshot in archive.snapshots() {
            match run_cycle(
                snapshot,
                &self.tracker,
                &tx,
                snapshot.timestamp,
                self.default_increment,
            )
            .await
            {
                Ok(records) => {
                    snapshots += 1;
                    debug!(
                        path = %snapshot.path.display(),
                        records = records,
                        "Snapshot replayed"
                    );
                }
                Err(e) => {
                    cycle_result = Err(e);
                    break;
                }
            }
        }
        drop(tx);

        let (_, written) = join_writer(writer).await;
        // A writer failure also closes the sink; report the writer's error
        let rows = written?;
        cycle_result?;

        info!(snapshots, rows, "Bulk import complete");
        Ok(BulkSummary { snapshots, rows })
    }

    /// Run one live cycle at `timestamp` with its own writer.
    ///
    /// Live timestamps are truncated to whole seconds, the resolution of
    /// archive file names, so an archived cycle replays with the same
    /// timestamps. Gives the storage back unless the writer task panicked.
    pub async fn run_live_cycle<S>(
        &self,
        source: &dyn ParkingSource,
        storage: S,
        timestamp: DateTime<Utc>,
    ) -> (Option<S>, Result<usize>)
    where
        S: Storage + 'static,
    {
        let timestamp = timestamp.trunc_subsecs(0);
        let archiving = self
            .archive_dir
            .as_deref()
            .map(|dir| ArchivingSource::new(source, dir, timestamp));
        let source: &dyn ParkingSource = match &archiving {
            Some(archiving) => archiving,
            None => source,
        };

        // The writer only starts once the list is in hand
        let (storage, result) = match fetch(source).await {
            Ok(parkings) => self.write_cycle(parkings, storage, timestamp).await,
            Err(e) => (Some(storage), Err(e)),
        };

        let cutoff = self
            .evict_after
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .and_then(|d| timestamp.checked_sub_signed(d));
        if let Some(cutoff) = cutoff {
            let evicted = self.tracker.lock().await.evict_unseen_since(cutoff);
            if evicted > 0 {
                info!(evicted, "Evicted stations not seen recently");
            }
        }

        (storage, result)
    }

    async fn write_cycle<S>(
        &self,
        parkings: Vec<Parking>,
        storage: S,
        timestamp: DateTime<Utc>,
    ) -> (Option<S>, Result<usize>)
    where
        S: Storage + 'static,
    {
        let (tx, writer) = self.spawn_writer(storage);
        let cycle = forward(
            parkings,
            &self.tracker,
            &tx,
            timestamp,
            self.default_increment,
        )
        .await;
        drop(tx);

        let (storage, written) = join_writer(writer).await;
        let result = match (cycle, written) {
            (_, Err(e)) => Err(e),
            (Err(e), Ok(_)) => Err(e),
            (Ok(_), Ok(rows)) => Ok(rows),
        };
        (storage, result)
    }

    /// Starts the live polling loop (non-blocking).
    ///
    /// The first cycle runs immediately, then one per poll interval. Ticks never
    /// overlap: a slow cycle delays the next tick instead of racing it. Failed
    /// cycles are logged and counted; the loop keeps going until the task is
    /// aborted.
    pub fn start_live<S>(self, source: Arc<dyn ParkingSource>, storage: S) -> JoinHandle<()>
    where
        S: Storage + 'static,
    {
        tokio::spawn(async move {
            info!(
                source = %source.name(),
                interval_secs = self.poll_interval.as_secs(),
                "Starting live tracking"
            );

            let mut ticker = interval(self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut storage = Some(storage);

            loop {
                ticker.tick().await;

                let Some(current) = storage.take() else {
                    error!("Storage lost after writer failure, stopping live tracking");
                    break;
                };

                let timestamp = Utc::now();
                let (returned, result) = self
                    .run_live_cycle(source.as_ref(), current, timestamp)
                    .await;
                storage = returned;

                let stations = self.tracker.lock().await.len();
                let mut status = self.status.lock().await;
                match result {
                    Ok(rows) => {
                        status.last_cycle = Some(timestamp);
                        status.last_error = None;
                        status.cycle_count += 1;
                        status.rows_written += rows as u64;
                        info!(rows, stations, "Cycle complete");
                    }
                    Err(e) => {
                        if let IngestError::Write { committed, .. } = &e {
                            status.rows_written += *committed as u64;
                        }
                        status.last_error = Some(e.to_string());
                        status.error_count += 1;
                        error!(error = %e, "Cycle failed, waiting for next tick");
                    }
                }
            }
        })
    }

    /// Spawn a blocking writer draining a bounded queue
    fn spawn_writer<S>(
        &self,
        storage: S,
    ) -> (mpsc::Sender<OutputRecord>, JoinHandle<(S, Result<usize>)>)
    where
        S: Storage + 'static,
    {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let batch_size = self.batch_size;

        let writer = tokio::task::spawn_blocking(move || {
            let mut writer = BatchWriter::new(storage, batch_size);
            let result = writer.write_from(rx);
            (writer.into_storage(), result)
        });

        (tx, writer)
    }
}

async fn join_writer<S>(writer: JoinHandle<(S, Result<usize>)>) -> (Option<S>, Result<usize>) {
    match writer.await {
        Ok((storage, result)) => (Some(storage), result),
        Err(e) => {
            warn!(error = %e, "Batch writer task did not finish");
            (
                None,
                Err(IngestError::Write {
                    committed: 0,
                    cause: anyhow::Error::new(e).context("Batch writer task failed"),
                }),
            )
        }
    }
}

use crate::error::{IngestError, Result};
use crate::record::OutputRecord;
use crate::source::{Parking, ParkingSource, Station};
use crate::state::StateTracker;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// Run one ingestion cycle: [`fetch`] the parkings list once, then
/// [`forward`] it. Returns the number of records forwarded.
///
/// The first fetch, validation or sink error aborts the cycle.
pub async fn run_cycle(
    source: &dyn ParkingSource,
    tracker: &Mutex<StateTracker>,
    sink: &mpsc::Sender<OutputRecord>,
    timestamp: DateTime<Utc>,
    default_increment: Duration,
) -> Result<usize> {
    let parkings = fetch(source).await?;
    let count = forward(parkings, tracker, sink, timestamp, default_increment).await?;

    debug!(
        source = %source.name(),
        timestamp = %timestamp,
        records = count,
        "Cycle records forwarded"
    );

    Ok(count)
}

/// Fetch the parkings list.
pub async fn fetch(source: &dyn ParkingSource) -> Result<Vec<Parking>> {
    source
        .list_parkings()
        .await
        .map_err(IngestError::source_unavailable)
}

/// Validate every station, then advance the tracker and send one record per
/// station (in list order) to `sink`.
///
/// Validation happens before any tracker update, so a malformed snapshot
/// leaves the tracker untouched.
pub async fn forward(
    parkings: Vec<Parking>,
    tracker: &Mutex<StateTracker>,
    sink: &mpsc::Sender<OutputRecord>,
    timestamp: DateTime<Utc>,
    default_increment: Duration,
) -> Result<usize> {
    let stations = parkings
        .into_iter()
        .map(Station::try_from)
        .collect::<Result<Vec<_>>>()?;

    let records: Vec<OutputRecord> = {
        let mut tracker = tracker.lock().await;
        stations
            .into_iter()
            .map(|station| {
                let observation = tracker.observe(
                    &station.id,
                    station.free_places,
                    timestamp,
                    default_increment,
                );
                OutputRecord::build(station, timestamp, observation)
            })
            .collect()
    };

    let count = records.len();
    for record in records {
        sink.send(record).await.map_err(|_| IngestError::SinkClosed)?;
    }

    Ok(count)
}

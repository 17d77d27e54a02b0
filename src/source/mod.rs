//! Parking sources: where a cycle's station snapshots come from.
//!
//! The live tracker polls the Velobike HTTP API ([`VelobikeClient`]); the bulk
//! loader replays archived snapshot files (see [`crate::archive`]). Both are
//! consumed by the pipeline through the [`ParkingSource`] trait.

mod parking;
mod velobike;

pub use parking::{Parking, Parkings, Position, Station};
pub use velobike::{VelobikeClient, BASE_URL};

use anyhow::Result;
use async_trait::async_trait;

/// Source of one cycle's parking snapshots.
///
/// Implementations perform one round trip per call and return stations in the
/// order the upstream provides them. Errors are surfaced to the pipeline as
/// `SourceUnavailable`.
#[async_trait]
pub trait ParkingSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Fetches the current list of parking snapshots.
    async fn list_parkings(&self) -> Result<Vec<Parking>>;
}

/// A fixed, in-memory list of parkings. Used to replay decoded snapshots.
#[async_trait]
impl ParkingSource for Vec<Parking> {
    fn name(&self) -> &str {
        "static"
    }

    async fn list_parkings(&self) -> Result<Vec<Parking>> {
        Ok(self.clone())
    }
}

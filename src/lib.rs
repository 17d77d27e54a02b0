// Archived parkings snapshots (bulk replay input, live capture output)
pub mod archive;

// TOML + environment configuration
pub mod config;

// Ingestion error taxonomy
pub mod error;

// Cycles, batch writer and scheduling
pub mod ingest;

// Output record construction
pub mod record;

// Parkings API client and source abstraction
pub mod source;

// Per-station time-in-state tracking
pub mod state;

// Transactional record storage
pub mod store;

pub use error::IngestError;
pub use ingest::{BatchWriter, BulkSummary, Ingestor, LiveStatus};
pub use record::OutputRecord;
pub use source::{Parking, ParkingSource, Station};
pub use state::StateTracker;
pub use store::{SqliteStore, Storage};

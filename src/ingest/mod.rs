//! Ingestion pipeline.
//!
//! ```text
//! ParkingSource (API or archive)
//!          ↓  one list per cycle
//! ┌─────────────────────────────────────────┐
//! │       run_cycle                          │
//! │  - validate stations                     │
//! │  - StateTracker::observe                 │
//! │  - OutputRecord::build                   │
//! └─────────────────────────────────────────┘
//!          ↓  bounded queue (backpressure)
//! ┌─────────────────────────────────────────┐
//! │       BatchWriter (blocking task)        │
//! │  - commit every batch_size records       │
//! └─────────────────────────────────────────┘
//!          ↓
//!       Storage
//! ```
//!
//! [`Ingestor`] owns the tracker and schedules cycles: once per archived
//! snapshot with one shared writer (bulk), or once per poll interval with a
//! writer per cycle (live).

mod batch;
mod pipeline;
mod scheduler;

pub use batch::{BatchWriter, DEFAULT_BATCH_SIZE};
pub use pipeline::run_cycle;
pub use scheduler::{BulkSummary, Ingestor, LiveStatus};

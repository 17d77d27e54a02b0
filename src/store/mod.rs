//! Durable sink for output records.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       BatchWriter                        │
//! │  - batch sizing, progress, failures      │
//! └─────────────────────────────────────────┘
//!          ↓ begin / insert / commit / rollback
//! ┌─────────────────────────────────────────┐
//! │       Storage (trait)                    │
//! │  - SqliteStore (rusqlite)                │
//! └─────────────────────────────────────────┘
//! ```

mod sqlite;

pub use sqlite::SqliteStore;

use crate::record::OutputRecord;
use anyhow::Result;

/// Transactional, append-only record storage.
///
/// Calls arrive in the order `begin`, any number of `insert`, then `commit`
/// or `rollback`. Implementations are driven from a blocking thread, so they
/// need to be `Send` but not `Sync`.
pub trait Storage: Send {
    /// Open a transaction
    fn begin(&mut self) -> Result<()>;

    /// Insert one record into the open transaction
    fn insert(&mut self, record: &OutputRecord) -> Result<()>;

    /// Make the open transaction durable
    fn commit(&mut self) -> Result<()>;

    /// Discard the open transaction
    fn rollback(&mut self) -> Result<()>;
}

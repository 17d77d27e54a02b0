//! SQLite-backed parking time series.

use super::Storage;
use crate::record::OutputRecord;
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use std::time::Duration;

/// Table layout. Rows are only ever appended; re-running a cycle after a failed
/// batch may store a (station, timestamp) pair twice.
const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS velobike_parkings (
        address TEXT NOT NULL,
        free_electric_places INTEGER NOT NULL,
        free_ordinary_places INTEGER NOT NULL,
        free_places INTEGER NOT NULL,
        has_terminal INTEGER NOT NULL,
        id TEXT NOT NULL,
        is_favorite INTEGER NOT NULL,
        is_locked INTEGER NOT NULL,
        name TEXT NOT NULL,
        station_types TEXT NOT NULL,      -- JSON array
        total_electric_places INTEGER NOT NULL,
        total_ordinary_places INTEGER NOT NULL,
        total_places INTEGER NOT NULL,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL,
        date TEXT NOT NULL,               -- YYYY-MM-DD (UTC)
        timestamp TEXT NOT NULL,          -- RFC 3339 (UTC)
        state_seconds REAL NOT NULL CHECK (state_seconds >= 0),
        state_cycles INTEGER NOT NULL CHECK (state_cycles >= 1)
    )
"#;

/// Positional parameters follow [`OutputRecord`] field order as bound in
/// [`SqliteStore::insert`].
const INSERT_RECORD: &str = r#"
    INSERT INTO velobike_parkings (
        address,
        free_electric_places,
        free_ordinary_places,
        free_places,
        has_terminal,
        id,
        is_favorite,
        is_locked,
        name,
        station_types,
        total_electric_places,
        total_ordinary_places,
        total_places,
        latitude,
        longitude,
        date,
        timestamp,
        state_seconds,
        state_cycles
    ) VALUES (
        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
        ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19
    )
"#;

/// Parking time series stored in a SQLite database.
///
/// The connection is owned exclusively by whoever drives the writes (the batch
/// writer's blocking task), so no internal locking is needed. Lock contention
/// with other processes is bounded by the busy timeout and surfaces as a
/// write error.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the database, checks it answers and creates the
    /// table if absent.
    pub fn open<P: AsRef<Path>>(db_path: P, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open database")?;
        Self::init(conn, busy_timeout)
    }

    /// In-memory database (tests, dry runs)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn, Duration::from_secs(5))
    }

    fn init(conn: Connection, busy_timeout: Duration) -> Result<Self> {
        conn.busy_timeout(busy_timeout)
            .context("Failed to set busy timeout")?;

        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .context("Database did not answer ping")?;

        conn.execute(CREATE_TABLE, [])
            .context("Failed to create velobike_parkings table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_parkings_date ON velobike_parkings(date)",
            [],
        )
        .context("Failed to create index")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_parkings_station ON velobike_parkings(id, timestamp)",
            [],
        )
        .context("Failed to create index")?;

        Ok(Self { conn })
    }

    /// Total number of stored rows
    pub fn row_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM velobike_parkings", [], |row| row.get(0))
            .context("Failed to count rows")?;
        Ok(count as u64)
    }

    /// Stored time in state for a station at a cycle timestamp (RFC 3339).
    /// Takes the earliest row when the cycle was stored more than once.
    pub fn state_seconds(&self, station_id: &str, timestamp: &str) -> Result<Option<f64>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT state_seconds FROM velobike_parkings \
                 WHERE id = ?1 AND timestamp = ?2 ORDER BY rowid LIMIT 1",
            )
            .context("Failed to prepare query")?;

        let mut rows = stmt
            .query(params![station_id, timestamp])
            .context("Failed to execute query")?;

        let seconds = match rows.next().context("Failed to read row")? {
            Some(row) => Some(row.get(0)?),
            None => None,
        };
        Ok(seconds)
    }
}

impl Storage for SqliteStore {
    fn begin(&mut self) -> Result<()> {
        self.conn
            .execute_batch("BEGIN")
            .context("Failed to begin transaction")
    }

    fn insert(&mut self, record: &OutputRecord) -> Result<()> {
        let station = &record.station;
        let station_types = serde_json::to_string(&station.station_types)
            .context("Failed to encode station types")?;

        let mut stmt = self
            .conn
            .prepare_cached(INSERT_RECORD)
            .context("Failed to prepare insert")?;

        stmt.execute(params![
            station.address,
            station.free_electric_places,
            station.free_ordinary_places,
            station.free_places,
            station.has_terminal,
            station.id,
            station.is_favourite,
            station.is_locked,
            station.name,
            station_types,
            station.total_electric_places,
            station.total_ordinary_places,
            station.total_places,
            station.latitude,
            station.longitude,
            record.date().to_string(),
            record.timestamp.to_rfc3339(),
            record.seconds_in_state,
            record.cycles_in_state as i64,
        ])
        .with_context(|| format!("Failed to insert record for station {}", station.id))?;

        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.conn
            .execute_batch("COMMIT")
            .context("Failed to commit transaction")
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn
            .execute_batch("ROLLBACK")
            .context("Failed to roll back transaction")
    }
}

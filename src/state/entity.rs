use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last known state of one parking station
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    /// Occupancy (free places) seen in the latest cycle
    pub last_occupancy: u32,

    /// Seconds the station has held `last_occupancy`
    pub seconds_in_state: f64,

    /// Consecutive cycles the station has held `last_occupancy`
    pub cycles_in_state: u64,

    /// Timestamp of the latest cycle that saw this station
    pub last_seen: DateTime<Utc>,
}

/// Result of observing a station in one cycle
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    pub seconds_in_state: f64,
    pub cycles_in_state: u64,
}

impl EntityState {
    pub fn observation(&self) -> Observation {
        Observation {
            seconds_in_state: self.seconds_in_state,
            cycles_in_state: self.cycles_in_state,
        }
    }
}

use crate::state::entity::{EntityState, Observation};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Tracks how long every station has held its current occupancy.
///
/// One [`EntityState`] per station id, created on first sighting and updated
/// on every later one. Entries are never removed implicitly: the map grows with
/// the number of distinct stations ever seen. Long running trackers can bound
/// it with [`StateTracker::evict_unseen_since`].
///
/// The tracker is plain data; callers that share it across tasks must
/// serialize access (the ingestor keeps it behind an async mutex).
#[derive(Debug, Default)]
pub struct StateTracker {
    states: HashMap<String, EntityState>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `occupancy` for `station_id` at `timestamp` and return the
    /// resulting time in state.
    ///
    /// - first sighting: time in state is seeded with `default_increment`
    /// - same occupancy: the gap since the previous sighting is added
    /// - new occupancy: time in state restarts at that gap
    ///
    /// Gaps are clamped at zero when the clock goes backwards. `last_seen`
    /// always becomes `timestamp`.
    pub fn observe(
        &mut self,
        station_id: &str,
        occupancy: u32,
        timestamp: DateTime<Utc>,
        default_increment: Duration,
    ) -> Observation {
        if let Some(state) = self.states.get_mut(station_id) {
            let elapsed = elapsed_seconds(state.last_seen, timestamp);
            if state.last_occupancy == occupancy {
                state.seconds_in_state += elapsed;
                state.cycles_in_state += 1;
            } else {
                state.seconds_in_state = elapsed;
                state.cycles_in_state = 1;
            }
            state.last_occupancy = occupancy;
            state.last_seen = timestamp;
            return state.observation();
        }

        debug!(station_id = %station_id, occupancy, "Tracking new station");
        let state = EntityState {
            last_occupancy: occupancy,
            seconds_in_state: default_increment.as_secs_f64(),
            cycles_in_state: 1,
            last_seen: timestamp,
        };
        let observation = state.observation();
        self.states.insert(station_id.to_string(), state);
        observation
    }

    /// Get tracked state for a station
    pub fn get(&self, station_id: &str) -> Option<&EntityState> {
        self.states.get(station_id)
    }

    /// Number of tracked stations
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Drop stations whose last sighting is older than `cutoff`.
    ///
    /// Returns the number of evicted entries. An evicted station that shows up
    /// again is treated as a first sighting.
    pub fn evict_unseen_since(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.states.len();
        self.states.retain(|_, state| state.last_seen >= cutoff);
        before - self.states.len()
    }
}

/// Seconds between two timestamps, never negative
fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let millis = (to - from).num_milliseconds();
    if millis <= 0 {
        0.0
    } else {
        millis as f64 / 1000.0
    }
}

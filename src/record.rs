use crate::source::Station;
use crate::state::Observation;
use chrono::{DateTime, NaiveDate, Utc};

/// One row of the parking time series: a station snapshot enriched with the
/// cycle timestamp and how long the station has held its occupancy.
///
/// Built once per station per cycle and handed to the batch writer by value.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputRecord {
    pub station: Station,
    pub timestamp: DateTime<Utc>,
    pub seconds_in_state: f64,
    pub cycles_in_state: u64,
}

impl OutputRecord {
    /// Combine a validated station, the cycle timestamp and the tracker's
    /// observation into a record.
    pub fn build(station: Station, timestamp: DateTime<Utc>, observation: Observation) -> Self {
        Self {
            station,
            timestamp,
            seconds_in_state: observation.seconds_in_state,
            cycles_in_state: observation.cycles_in_state,
        }
    }

    /// UTC calendar date of the cycle, used as the partition column
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

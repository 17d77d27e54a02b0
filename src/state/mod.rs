// Per-station state tracking across polling cycles

mod entity;
mod tracker;

pub use entity::{EntityState, Observation};
pub use tracker::StateTracker;

//! Background jobs.
//!
//! - `ThresholdSweep`: periodic alert generation for every company
//!
//! Jobs run on plain threads and stop through their handle's `shutdown`.

pub mod sweep;

pub use sweep::{SweepHandle, SweepStats, ThresholdSweep, sweep_once};

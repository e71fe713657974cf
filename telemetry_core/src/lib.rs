//! # Telemetry Core
//!
//! The observation model shared by every metrics source and by the remote write
//! client, plus the `MetricSource` capability used to collect observations.

pub mod error;
pub mod observation;
pub mod source;

pub use observation::{Identity, Observation, ObservationGroup};
pub use source::MetricSource;

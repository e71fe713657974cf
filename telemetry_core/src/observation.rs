use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A single measurement for a metric, as produced by a metric source.
///
/// Two observations may share a `name` as long as their label sets differ
/// (e.g. `cpu_usage_percent{mode="idle"}` and `cpu_usage_percent{mode="user"}`).
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    name: String,
    value: f64,
    labels: BTreeMap<String, String>,
    timestamp: Option<DateTime<Utc>>,
}

impl Observation {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Observation {
            name: name.into(),
            value,
            labels: BTreeMap::new(),
            timestamp: None,
        }
    }

    /// Adds a label; a later label with the same name replaces an earlier one.
    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }

    /// Pins the observation to an explicit instant instead of the group's instant.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
}

/// Observations which share a common freshness source.
///
/// Values read from a cached artifact (e.g. a stats file) carry the artifact's
/// modification time; values measured live carry none and are stamped with the
/// moment of the push.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObservationGroup {
    pub source_modified: Option<DateTime<Utc>>,
    pub observations: Vec<Observation>,
}

impl ObservationGroup {
    /// A group of values measured at collection time.
    pub fn live(observations: Vec<Observation>) -> Self {
        ObservationGroup {
            source_modified: None,
            observations,
        }
    }

    /// A group of values derived from an artifact last modified at `modified`.
    pub fn from_artifact(modified: Option<DateTime<Utc>>, observations: Vec<Observation>) -> Self {
        ObservationGroup {
            source_modified: modified,
            observations,
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// The `job` and `instance` labels attached to every pushed series.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Identity {
    pub job: String,
    pub instance: String,
}

impl Identity {
    pub fn new(job: impl Into<String>, instance: impl Into<String>) -> Self {
        Identity {
            job: job.into(),
            instance: instance.into(),
        }
    }
}

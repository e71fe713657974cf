use chrono::{DateTime, Duration, Utc};
use telemetry_core::Observation;

/// How old (in seconds) a source artifact's timestamp may be before the
/// collection time is used instead.
pub const DEFAULT_FRESHNESS_WINDOW_SECS: i64 = 60 * 60;

/// Chooses the sample timestamp for each observation in a push.
///
/// Receivers reject (or silently drop) samples which are older than their
/// acceptance window. A cached artifact's modification time is kept only while
/// it is within `freshness_window` of the collection time; otherwise the
/// collection time is used.
#[derive(Clone, Debug)]
pub struct TimestampResolver {
    collected_at: DateTime<Utc>,
    freshness_window: Duration,
}

impl TimestampResolver {
    pub fn new(collected_at: DateTime<Utc>, freshness_window: Duration) -> Self {
        TimestampResolver {
            collected_at,
            freshness_window,
        }
    }

    pub fn collected_at(&self) -> DateTime<Utc> {
        self.collected_at
    }

    /// The instant for observations sharing a source which was last modified at
    /// `source_modified` (or which have no source artifact).
    pub fn group_instant(&self, source_modified: Option<DateTime<Utc>>) -> DateTime<Utc> {
        match source_modified {
            // An instant after the collection time is clock skew; don't trust it
            Some(modified)
                if modified <= self.collected_at
                    && self.collected_at - modified <= self.freshness_window =>
            {
                modified
            }
            _ => self.collected_at,
        }
    }

    /// Resolve the sample timestamp (in milliseconds) for an observation.
    ///
    /// An explicit observation timestamp always wins.
    pub fn resolve(&self, observation: &Observation, source_modified: Option<DateTime<Utc>>) -> i64 {
        observation
            .timestamp()
            .unwrap_or_else(|| self.group_instant(source_modified))
            .timestamp_millis()
    }
}

use anyhow::{Context, Result};
use async_std::path::PathBuf;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heck::SnakeCase;
use serde_json::Value;
use std::io::ErrorKind;

use super::MetricSource;
use crate::observation::{Observation, ObservationGroup};

/// Reads a cached JSON statistics file written by some other tool.
///
/// Numeric fields become `<prefix>_<field>` gauges, booleans become 1 or 0, and
/// an object of numbers becomes one series per entry with a `key` label.
/// The file's modification time is used as the group's freshness instant.
pub struct StatsFileSource {
    path: PathBuf,
    prefix: String,
}

impl StatsFileSource {
    pub fn new(path: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        StatsFileSource {
            path: path.into(),
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl MetricSource for StatsFileSource {
    fn name(&self) -> &str {
        "stats-file"
    }

    async fn collect(&self) -> Result<ObservationGroup> {
        let metadata = match async_std::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!("no stats file at {}", self.path.display());
                return Ok(ObservationGroup::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", self.path.display()));
            }
        };
        let modified = metadata.modified().ok().map(DateTime::<Utc>::from);
        let input = async_std::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading {}", self.path.display()))?;
        let stats: Value = serde_json::from_str(&input)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        let observations = observations_from_json(&self.prefix, &stats)?;
        Ok(ObservationGroup::from_artifact(modified, observations))
    }
}

/// Flatten a stats document into observations
pub fn observations_from_json(prefix: &str, stats: &Value) -> Result<Vec<Observation>> {
    let fields = stats
        .as_object()
        .ok_or_else(|| anyhow::format_err!("expected stats to be a JSON object"))?;

    let mut out = Vec::with_capacity(fields.len());
    for (field, value) in fields {
        let name = metric_name(prefix, field);
        match value {
            Value::Object(entries) => {
                for (key, value) in entries {
                    if let Some(value) = as_number(value) {
                        out.push(Observation::new(name.clone(), value).with_label("key", key.clone()));
                    }
                }
            }
            value => {
                if let Some(value) = as_number(value) {
                    out.push(Observation::new(name, value));
                }
            }
        }
    }
    Ok(out)
}

fn metric_name(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_snake_case()
    } else {
        format!("{}_{}", prefix, field.to_snake_case())
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::Bool(true) => Some(1.0),
        Value::Bool(false) => Some(0.0),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flattens_stats_documents() {
        let stats: Value = serde_json::from_str(
            r#"{
                "totalSessions": 42,
                "totalMessages": 1337.5,
                "streakActive": true,
                "lastSessionId": "abc123",
                "messagesByModel": { "opus": 10, "haiku": 3, "unknown": null },
                "history": [1, 2, 3]
            }"#,
        )
        .unwrap();
        let observations = observations_from_json("stats", &stats).unwrap();

        // It skips strings, nulls and arrays
        assert_eq!(observations.len(), 5);

        let find = |name: &str, key: Option<&str>| {
            observations
                .iter()
                .find(|o| o.name() == name && o.labels().get("key").map(String::as_str) == key)
                .map(|o| o.value())
        };
        assert_eq!(find("stats_total_sessions", None), Some(42.0));
        assert_eq!(find("stats_total_messages", None), Some(1337.5));
        assert_eq!(find("stats_streak_active", None), Some(1.0));
        assert_eq!(find("stats_messages_by_model", Some("opus")), Some(10.0));
        assert_eq!(find("stats_messages_by_model", Some("haiku")), Some(3.0));
    }

    #[test]
    fn rejects_non_object_documents() {
        let stats: Value = serde_json::from_str("[1, 2]").unwrap();
        assert!(observations_from_json("stats", &stats).is_err());
    }

    #[test]
    fn missing_file_is_empty() {
        let source = StatsFileSource::new(
            std::env::temp_dir().join("telemetry-core-missing-stats.json"),
            "stats",
        );
        let group = async_std::task::block_on(source.collect()).unwrap();
        assert!(group.is_empty());
        assert_eq!(group.source_modified, None);
    }

    #[test]
    fn reads_stats_file_with_modified_time() {
        let path = std::env::temp_dir().join(format!(
            "telemetry-core-stats-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"dailyActiveMinutes": 95}"#).unwrap();

        let source = StatsFileSource::new(path.clone(), "stats");
        let group = async_std::task::block_on(source.collect()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(group.len(), 1);
        assert_eq!(group.observations[0].name(), "stats_daily_active_minutes");
        assert!(group.source_modified.is_some());
    }
}

//! Converts observations into wire-ready time series.

use std::collections::HashSet;
use telemetry_core::{Identity, Observation};

use crate::error::ValidationError;
use crate::proto;

/// The label which carries the metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";
pub const JOB_LABEL: &str = "job";
pub const INSTANCE_LABEL: &str = "instance";

/// Labels which are injected by the client and may not be set by an observation.
const RESERVED_LABELS: [&str; 3] = [METRIC_NAME_LABEL, JOB_LABEL, INSTANCE_LABEL];

/// Build the label set for an observation, sorted by label name.
///
/// Receivers expect labels sorted by name; some accept unsorted labels and
/// index them incorrectly.
pub fn labels_for(
    observation: &Observation,
    identity: &Identity,
) -> Result<Vec<proto::Label>, ValidationError> {
    let metric = observation.name();
    if metric.is_empty() {
        return Err(ValidationError::EmptyName);
    }

    let mut labels = Vec::with_capacity(RESERVED_LABELS.len() + observation.labels().len());
    labels.push(label(METRIC_NAME_LABEL, metric));
    labels.push(label(JOB_LABEL, &identity.job));
    labels.push(label(INSTANCE_LABEL, &identity.instance));
    for (name, value) in observation.labels() {
        if name.is_empty() {
            return Err(ValidationError::EmptyLabelName {
                metric: metric.into(),
            });
        }
        if RESERVED_LABELS.contains(&name.as_str()) {
            return Err(ValidationError::ReservedLabel {
                metric: metric.into(),
                label: name.clone(),
            });
        }
        labels.push(label(name, value));
    }

    // `String` ordering is a byte-wise comparison
    labels.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(labels)
}

/// Assemble one single-sample series per observation.
///
/// `timestamp` resolves the sample time (in milliseconds) for each observation.
pub fn assemble<F>(
    observations: &[Observation],
    identity: &Identity,
    timestamp: F,
) -> Result<Vec<proto::TimeSeries>, ValidationError>
where
    F: Fn(&Observation) -> i64,
{
    let mut out = Vec::with_capacity(observations.len());
    for observation in observations {
        let labels = labels_for(observation, identity)?;
        let samples = vec![proto::Sample {
            value: observation.value(),
            timestamp: timestamp(observation),
        }];
        out.push(proto::TimeSeries { labels, samples });
    }
    Ok(out)
}

/// Check that no two series share the same label set.
///
/// A receiver rejects the second sample of a series as a duplicate, so this is
/// reported as a caller bug instead.
pub fn check_unique(series: &[proto::TimeSeries]) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(series.len());
    for ts in series {
        let key = ts
            .labels
            .iter()
            .map(|l| (l.name.as_str(), l.value.as_str()))
            .collect::<Vec<_>>();
        if !seen.insert(key) {
            let metric = ts
                .labels
                .iter()
                .find(|l| l.name == METRIC_NAME_LABEL)
                .map(|l| l.value.clone())
                .unwrap_or_default();
            return Err(ValidationError::DuplicateSeries {
                metric,
                labels: format_labels(&ts.labels),
            });
        }
    }
    Ok(())
}

fn label(name: &str, value: &str) -> proto::Label {
    proto::Label {
        name: name.into(),
        value: value.into(),
    }
}

fn format_labels(labels: &[proto::Label]) -> String {
    let pairs = labels
        .iter()
        .map(|l| format!("{}={:?}", l.name, l.value))
        .collect::<Vec<_>>();
    format!("{{{}}}", pairs.join(","))
}

#[cfg(test)]
mod test {
    use super::*;

    fn identity() -> Identity {
        Identity::new("health", "host1")
    }

    fn names(labels: &[proto::Label]) -> Vec<&str> {
        labels.iter().map(|l| l.name.as_str()).collect()
    }

    #[test]
    fn sorts_labels_by_name() {
        let obs = Observation::new("requests", 1.0)
            .with_label("b", "1")
            .with_label("a", "2")
            .with_label("Z", "3");
        let labels = labels_for(&obs, &identity()).unwrap();

        // Uppercase sorts before underscore, which sorts before lowercase
        assert_eq!(names(&labels), vec!["Z", "__name__", "a", "b", "instance", "job"]);
        assert_eq!(labels[1].value, "requests");
        assert_eq!(labels[2].value, "2");
        assert_eq!(labels[4].value, "host1");
        assert_eq!(labels[5].value, "health");
    }

    #[test]
    fn rejects_reserved_labels() {
        for reserved in &["__name__", "job", "instance"] {
            let obs = Observation::new("requests", 1.0).with_label(*reserved, "x");
            assert_eq!(
                labels_for(&obs, &identity()),
                Err(ValidationError::ReservedLabel {
                    metric: "requests".into(),
                    label: reserved.to_string(),
                })
            );
        }
    }

    #[test]
    fn rejects_empty_names() {
        let obs = Observation::new("", 1.0);
        assert_eq!(labels_for(&obs, &identity()), Err(ValidationError::EmptyName));

        let obs = Observation::new("requests", 1.0).with_label("", "x");
        assert_eq!(
            labels_for(&obs, &identity()),
            Err(ValidationError::EmptyLabelName {
                metric: "requests".into()
            })
        );
    }

    #[test]
    fn assembles_one_sample_per_observation() {
        let observations = vec![
            Observation::new("cpu_usage_percent", 12.5).with_label("mode", "idle"),
            Observation::new("cpu_usage_percent", 3.1).with_label("mode", "user"),
            Observation::new("memory_usage_percent", 45.0),
        ];
        let series = assemble(&observations, &identity(), |_| 1_000).unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(names(&series[0].labels), vec!["__name__", "instance", "job", "mode"]);
        assert_eq!(names(&series[2].labels), vec!["__name__", "instance", "job"]);
        for (ts, obs) in series.iter().zip(&observations) {
            assert_eq!(ts.samples.len(), 1);
            assert_eq!(ts.samples[0].value, obs.value());
            assert_eq!(ts.samples[0].timestamp, 1_000);
        }
        assert!(check_unique(&series).is_ok());
    }

    #[test]
    fn stops_at_the_first_invalid_observation() {
        let observations = vec![
            Observation::new("ok", 1.0),
            Observation::new("bad", 1.0).with_label("job", "other"),
        ];
        assert!(matches!(
            assemble(&observations, &identity(), |_| 0),
            Err(ValidationError::ReservedLabel { .. })
        ));
    }

    #[test]
    fn detects_duplicate_series() {
        let observations = vec![
            Observation::new("cpu_usage_percent", 12.5).with_label("mode", "idle"),
            Observation::new("cpu_usage_percent", 13.0).with_label("mode", "idle"),
        ];
        let series = assemble(&observations, &identity(), |_| 0).unwrap();
        assert_eq!(
            check_unique(&series),
            Err(ValidationError::DuplicateSeries {
                metric: "cpu_usage_percent".into(),
                labels: r#"{__name__="cpu_usage_percent",instance="host1",job="health",mode="idle"}"#
                    .into(),
            })
        );
    }
}

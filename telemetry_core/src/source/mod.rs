//! # Metric Sources
//!
//! Each source produces a flat list of observations; it knows nothing about how
//! they are encoded or delivered.

mod scan;
mod stats_file;
mod system;

pub use scan::DirectoryScanSource;
pub use stats_file::StatsFileSource;
pub use system::SystemSource;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;

use crate::error::log_error;
use crate::observation::ObservationGroup;

/// The MetricSource trait must be implemented by each collector whose
/// observations are pushed to the remote write endpoint.
#[async_trait]
pub trait MetricSource: Send + Sync {
    fn name(&self) -> &str;

    /// Collects the source's observations.
    ///
    /// An absent input (e.g. a missing stats file) is not an error; it produces an empty group.
    async fn collect(&self) -> Result<ObservationGroup>;
}

/// Collect from every source concurrently.
///
/// A source which fails is logged and omitted; the others are still returned.
pub async fn collect_all(sources: &[Box<dyn MetricSource>]) -> Vec<ObservationGroup> {
    let results = join_all(
        sources
            .iter()
            .map(|source| async move { (source.name(), source.collect().await) }),
    )
    .await;

    let mut groups = Vec::with_capacity(results.len());
    for (name, result) in results {
        match result {
            Ok(group) => {
                tracing::debug!("collected {} observations from {}", group.len(), name);
                groups.push(group);
            }
            Err(err) => log_error(&format!("omitting source {}", name), &err),
        }
    }
    groups
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Observation;

    struct Fixed(Vec<Observation>);

    #[async_trait]
    impl MetricSource for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn collect(&self) -> Result<ObservationGroup> {
            Ok(ObservationGroup::live(self.0.clone()))
        }
    }

    struct Broken;

    #[async_trait]
    impl MetricSource for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn collect(&self) -> Result<ObservationGroup> {
            Err(anyhow::format_err!("unreadable input"))
        }
    }

    #[test]
    fn omits_failed_sources() {
        let sources: Vec<Box<dyn MetricSource>> = vec![
            Box::new(Fixed(vec![Observation::new("a", 1.0)])),
            Box::new(Broken),
            Box::new(Fixed(vec![Observation::new("b", 2.0), Observation::new("c", 3.0)])),
        ];
        let groups = async_std::task::block_on(collect_all(&sources));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 1);
        assert_eq!(groups[1].len(), 2);
    }

    #[test]
    fn no_sources_is_an_empty_batch() {
        let groups = async_std::task::block_on(collect_all(&[]));
        assert!(groups.is_empty());
    }
}

use anyhow::{Context, Result};
use async_std::path::PathBuf;
use async_trait::async_trait;
use futures::stream::StreamExt;
use std::time::{Duration, SystemTime};

use super::MetricSource;
use crate::observation::{Observation, ObservationGroup};

/// Files modified within this window are counted as recent.
const RECENT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Scans a directory tree (e.g. session logs) at collection time.
///
/// Always measured live, so the group carries no freshness instant.
pub struct DirectoryScanSource {
    root: PathBuf,
    prefix: String,
}

impl DirectoryScanSource {
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        DirectoryScanSource {
            root: root.into(),
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl MetricSource for DirectoryScanSource {
    fn name(&self) -> &str {
        "directory-scan"
    }

    async fn collect(&self) -> Result<ObservationGroup> {
        if !self.root.is_dir().await {
            tracing::debug!("no directory to scan at {}", self.root.display());
            return Ok(ObservationGroup::default());
        }

        let cutoff = SystemTime::now()
            .checked_sub(RECENT_WINDOW)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut totals = ScanTotals::default();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = async_std::fs::read_dir(&dir)
                .await
                .with_context(|| format!("listing {}", dir.display()))?;
            while let Some(entry) = entries.next().await {
                let entry = entry.with_context(|| format!("listing {}", dir.display()))?;
                let metadata = entry
                    .metadata()
                    .await
                    .with_context(|| format!("reading {}", entry.path().display()))?;
                if metadata.is_dir() {
                    pending.push(entry.path());
                } else if metadata.is_file() {
                    totals.add(metadata.len(), metadata.modified().ok(), cutoff);
                }
            }
        }
        Ok(ObservationGroup::live(totals.into_observations(&self.prefix)))
    }
}

#[derive(Debug, Default, PartialEq)]
struct ScanTotals {
    files: u64,
    bytes: u64,
    recent: u64,
}

impl ScanTotals {
    fn add(&mut self, len: u64, modified: Option<SystemTime>, cutoff: SystemTime) {
        self.files += 1;
        self.bytes += len;
        if modified.map(|time| time >= cutoff).unwrap_or(false) {
            self.recent += 1;
        }
    }

    fn into_observations(self, prefix: &str) -> Vec<Observation> {
        vec![
            Observation::new(format!("{}_files", prefix), self.files as f64),
            Observation::new(format!("{}_bytes", prefix), self.bytes as f64),
            Observation::new(format!("{}_files_modified_24h", prefix), self.recent as f64),
        ]
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::ErrorKind;

use super::MetricSource;
use crate::observation::{Observation, ObservationGroup};

const LOADAVG_PATH: &str = "/proc/loadavg";
const MEMINFO_PATH: &str = "/proc/meminfo";
const UPTIME_PATH: &str = "/proc/uptime";

/// Samples host health from the Linux `/proc` filesystem.
///
/// Files which don't exist (e.g. on macOS) are skipped.
#[derive(Default)]
pub struct SystemSource;

impl SystemSource {
    pub fn new() -> Self {
        SystemSource
    }
}

#[async_trait]
impl MetricSource for SystemSource {
    fn name(&self) -> &str {
        "system"
    }

    async fn collect(&self) -> Result<ObservationGroup> {
        let mut out = Vec::new();

        if let Some(content) = read_proc(LOADAVG_PATH).await? {
            let [one, five, fifteen] = parse_loadavg(&content)?;
            out.push(Observation::new("system_load_average", one).with_label("period", "1m"));
            out.push(Observation::new("system_load_average", five).with_label("period", "5m"));
            out.push(Observation::new("system_load_average", fifteen).with_label("period", "15m"));
        }

        if let Some(content) = read_proc(MEMINFO_PATH).await? {
            let memory = parse_meminfo(&content)?;
            out.push(Observation::new("memory_total_bytes", memory.total_bytes as f64));
            out.push(Observation::new("memory_usage_percent", memory.usage_percent()));
        }

        if let Some(content) = read_proc(UPTIME_PATH).await? {
            out.push(Observation::new("system_uptime_seconds", parse_uptime(&content)?));
        }

        Ok(ObservationGroup::live(out))
    }
}

async fn read_proc(path: &str) -> Result<Option<String>> {
    match async_std::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path)),
    }
}

/// Parse the 1, 5 and 15 minute load averages from `/proc/loadavg`.
pub fn parse_loadavg(content: &str) -> Result<[f64; 3]> {
    let mut fields = content.split_whitespace();
    let mut next = || -> Result<f64> {
        fields
            .next()
            .context("missing load average")?
            .parse()
            .context("invalid load average")
    };
    Ok([next()?, next()?, next()?])
}

#[derive(Debug, PartialEq)]
pub struct MemoryInfo {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl MemoryInfo {
    pub fn usage_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        let used = self.total_bytes.saturating_sub(self.available_bytes);
        used as f64 / self.total_bytes as f64 * 100.0
    }
}

/// Parse `MemTotal` and `MemAvailable` from `/proc/meminfo`.
pub fn parse_meminfo(content: &str) -> Result<MemoryInfo> {
    let mut total = None;
    let mut available = None;
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let slot = match parts.next() {
            Some("MemTotal:") => &mut total,
            Some("MemAvailable:") => &mut available,
            _ => continue,
        };
        let kib: u64 = parts
            .next()
            .context("missing meminfo value")?
            .parse()
            .with_context(|| format!("invalid meminfo line '{}'", line))?;
        *slot = Some(kib.checked_mul(1024).context("meminfo value out of range")?);
    }
    Ok(MemoryInfo {
        total_bytes: total.context("missing MemTotal")?,
        available_bytes: available.context("missing MemAvailable")?,
    })
}

/// Parse the system uptime (in seconds) from `/proc/uptime`.
pub fn parse_uptime(content: &str) -> Result<f64> {
    content
        .split_whitespace()
        .next()
        .context("missing uptime")?
        .parse()
        .context("invalid uptime")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_loadavg() {
        let loads = parse_loadavg("0.52 0.58 0.59 2/1234 56789\n").unwrap();
        assert_eq!(loads, [0.52, 0.58, 0.59]);
        assert!(parse_loadavg("0.52").is_err());
    }

    #[test]
    fn parses_meminfo() {
        let memory = parse_meminfo(
            "MemTotal:       16000000 kB\n\
             MemFree:         1000000 kB\n\
             MemAvailable:    4000000 kB\n\
             Buffers:          200000 kB\n",
        )
        .unwrap();
        assert_eq!(memory.total_bytes, 16_000_000 * 1024);
        assert_eq!(memory.available_bytes, 4_000_000 * 1024);
        assert_eq!(memory.usage_percent(), 75.0);

        assert!(parse_meminfo("MemTotal: 100 kB\n").is_err());
        assert!(parse_meminfo(
            "MemTotal: 18446744073709551615 kB\n\
             MemAvailable: 1 kB\n"
        )
        .is_err());
    }

    #[test]
    fn parses_uptime() {
        assert_eq!(parse_uptime("350735.47 234388.90\n").unwrap(), 350735.47);
        assert!(parse_uptime("").is_err());
    }
}

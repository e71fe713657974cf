use anyhow::{Context, Result};
use heck::SnakeCase;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use structopt::StructOpt;

use telemetry_core::source::{DirectoryScanSource, StatsFileSource, SystemSource};
use telemetry_core::{Identity, MetricSource};
use telemetry_remote_write::{Auth, RemoteWriteConfig};

#[derive(Debug)]
pub struct Config {
    /// Enables debug logging
    pub debug: bool,

    /// Encode the request and report its size, without sending it
    pub dry_run: bool,

    /// Where and how to push; see [`RemoteWriteConfig`]
    pub remote_write: RemoteWriteConfig,

    /// A cached JSON statistics file to read metrics from.
    pub stats_file: Option<PathBuf>,

    /// The metric name prefix for values from `stats_file`.
    pub stats_prefix: String,

    /// A directory to scan at collection time.
    pub scan_dir: Option<PathBuf>,

    /// The metric name prefix for values from `scan_dir`.
    pub scan_prefix: String,

    /// Whether to collect host metrics from `/proc`.
    pub collect_system: bool,
}

impl Config {
    /// Loads configuration from arguments, env and dotenv
    pub fn load() -> Result<Config> {
        // Attempts to find a `.env` file to initialize/extend the environment
        dotenv::dotenv().ok();

        // Load the config from arguments, then environment variables
        Config::from_environment(Environment::from_args())
    }

    fn from_environment(env: Environment) -> Result<Config> {
        if env.job.is_empty() {
            return Err(anyhow::format_err!("invalid PUSH_JOB: must not be empty"));
        }
        if env.instance.is_empty() {
            return Err(anyhow::format_err!("invalid PUSH_INSTANCE: must not be empty"));
        }
        let freshness_window = chrono::Duration::from_std(Duration::from_secs(env.freshness_window))
            .context("invalid FRESHNESS_WINDOW")?;
        Ok(Config {
            debug: env.debug || env_flag("DEBUG")?,
            dry_run: env.dry_run,
            remote_write: RemoteWriteConfig {
                url: env.url,
                identity: Identity::new(env.job, env.instance),
                auth: auth_mode(env.username, env.password, env.bearer_token)?,
                timeout: match env.timeout {
                    ToggleValue::Enabled(secs) => Some(Duration::from_secs(secs)),
                    ToggleValue::EnabledDefault => Some(DEFAULT_TIMEOUT),
                    ToggleValue::Disabled => None,
                },
                freshness_window,
            },
            stats_file: env.stats_file,
            stats_prefix: metric_prefix(env.stats_prefix, "STATS_PREFIX")?,
            scan_dir: env.scan_dir,
            scan_prefix: metric_prefix(env.scan_prefix, "SCAN_PREFIX")?,
            collect_system: env.system || env_flag("COLLECT_SYSTEM")?,
        })
    }

    /// The metric sources enabled by this configuration.
    pub fn sources(&self) -> Vec<Box<dyn MetricSource>> {
        let mut sources: Vec<Box<dyn MetricSource>> = Vec::new();
        if self.collect_system {
            sources.push(Box::new(SystemSource::new()));
        }
        if let Some(path) = &self.stats_file {
            sources.push(Box::new(StatsFileSource::new(path.clone(), self.stats_prefix.clone())));
        }
        if let Some(dir) = &self.scan_dir {
            sources.push(Box::new(DirectoryScanSource::new(dir.clone(), self.scan_prefix.clone())));
        }
        sources
    }
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, StructOpt)]
#[structopt(name = "telemetry-push")]
struct Environment {
    /// Enables debug logging
    #[structopt(short, long)]
    debug: bool,

    /// Encode the write request and report its size, without sending it
    #[structopt(long)]
    dry_run: bool,

    /// The url to send prometheus remote write requests to
    #[structopt(short, long, env = "REMOTE_WRITE_URL")]
    url: String,

    /// The `job` label added to every metric
    #[structopt(long, env = "PUSH_JOB", default_value = "telemetry-push")]
    job: String,

    /// The `instance` label added to every metric
    #[structopt(long, env = "PUSH_INSTANCE")]
    instance: String,

    /// The username for HTTP basic auth
    #[structopt(long, env = "REMOTE_WRITE_USERNAME")]
    username: Option<String>,

    /// The password for HTTP basic auth
    #[structopt(long, env = "REMOTE_WRITE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// A token for bearer auth
    #[structopt(long, env = "REMOTE_WRITE_BEARER_TOKEN", hide_env_values = true)]
    bearer_token: Option<String>,

    /// How long (in seconds) to wait for the remote write response
    #[structopt(long, env = "REMOTE_WRITE_TIMEOUT", default_value = "30")]
    timeout: ToggleValue<u64>,

    /// How old (in seconds) a stats file may be before its values are stamped with the current time
    #[structopt(long, env = "FRESHNESS_WINDOW", default_value = "3600")]
    freshness_window: u64,

    /// A cached JSON stats file to read metrics from
    #[structopt(long, env = "STATS_FILE", parse(from_os_str))]
    stats_file: Option<PathBuf>,

    /// The metric name prefix for stats file values
    #[structopt(long, env = "STATS_PREFIX", default_value = "stats")]
    stats_prefix: String,

    /// A directory to scan for file counts and sizes
    #[structopt(long, env = "SCAN_DIR", parse(from_os_str))]
    scan_dir: Option<PathBuf>,

    /// The metric name prefix for directory scan values
    #[structopt(long, env = "SCAN_PREFIX", default_value = "scan")]
    scan_prefix: String,

    /// Collect host metrics (load, memory, uptime) from /proc
    #[structopt(long)]
    system: bool,
}

/// Reads a boolean flag which may only be set through the environment.
fn env_flag(name: &str) -> Result<bool> {
    match dotenv::var(name).ok() {
        Some(val) if val == "true" || val == "on" || val == "1" => Ok(true),
        Some(val) if val == "false" || val == "off" || val == "0" || val == "" => Ok(false),
        Some(val) => val.parse::<bool>().with_context(|| format!("invalid {}", name)),
        None => Ok(false),
    }
}

/// Picks the single authentication mode from the configured credentials.
fn auth_mode(
    username: Option<String>,
    password: Option<String>,
    bearer_token: Option<String>,
) -> Result<Auth> {
    let username = username.filter(|s| !s.is_empty());
    let password = password.filter(|s| !s.is_empty());
    let bearer_token = bearer_token.filter(|s| !s.is_empty());
    match (username, password, bearer_token) {
        (None, None, None) => Ok(Auth::None),
        (None, None, Some(token)) => Ok(Auth::Bearer { token }),
        (Some(username), Some(password), None) => Ok(Auth::Basic { username, password }),
        (Some(_), None, None) => Err(anyhow::format_err!(
            "REMOTE_WRITE_USERNAME is set without REMOTE_WRITE_PASSWORD"
        )),
        (None, Some(_), None) => Err(anyhow::format_err!(
            "REMOTE_WRITE_PASSWORD is set without REMOTE_WRITE_USERNAME"
        )),
        (_, _, Some(_)) => Err(anyhow::format_err!(
            "basic auth and REMOTE_WRITE_BEARER_TOKEN can't be used together"
        )),
    }
}

/// Metric name prefixes must already be snake case, e.g. "claude_stats"
fn metric_prefix(prefix: String, name: &str) -> Result<String> {
    if prefix.is_empty() || prefix == prefix.to_snake_case() {
        Ok(prefix)
    } else {
        Err(anyhow::format_err!("invalid {}: expected snake_case", name))
    }
}

#[derive(Debug, Eq, PartialEq)]
enum ToggleValue<T: FromStr> {
    Enabled(T),
    EnabledDefault,
    Disabled,
}

impl<T: FromStr> Default for ToggleValue<T> {
    fn default() -> Self {
        ToggleValue::Disabled
    }
}

impl<T: FromStr> FromStr for ToggleValue<T> {
    type Err = T::Err;
    fn from_str(val: &str) -> std::result::Result<Self, Self::Err> {
        match val {
            "false" | "off" | "0" | "" => Ok(ToggleValue::Disabled),
            "true" | "on" | "1" => Ok(ToggleValue::EnabledDefault),
            _ => val.parse().map(ToggleValue::Enabled),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config> {
        let mut argv = vec!["telemetry-push", "--url", "http://localhost/write", "--instance", "host1"];
        argv.extend_from_slice(args);
        Config::from_environment(Environment::from_iter_safe(argv)?)
    }

    #[test]
    fn parses_toggle_values() {
        assert_eq!("off".parse::<ToggleValue<u64>>(), Ok(ToggleValue::Disabled));
        assert_eq!("0".parse::<ToggleValue<u64>>(), Ok(ToggleValue::Disabled));
        assert_eq!("on".parse::<ToggleValue<u64>>(), Ok(ToggleValue::EnabledDefault));
        assert_eq!("45".parse::<ToggleValue<u64>>(), Ok(ToggleValue::Enabled(45)));
        assert!("soon".parse::<ToggleValue<u64>>().is_err());
    }

    #[test]
    fn selects_a_single_auth_mode() {
        let some = |s: &str| Some(s.to_string());
        assert_eq!(auth_mode(None, None, None).unwrap(), Auth::None);
        assert_eq!(auth_mode(some(""), None, some("")).unwrap(), Auth::None);
        assert_eq!(
            auth_mode(None, None, some("tok")).unwrap(),
            Auth::Bearer {
                token: "tok".into()
            }
        );
        assert_eq!(
            auth_mode(some("user"), some("pass"), None).unwrap(),
            Auth::Basic {
                username: "user".into(),
                password: "pass".into()
            }
        );
        assert!(auth_mode(some("user"), None, None).is_err());
        assert!(auth_mode(None, some("pass"), None).is_err());
        assert!(auth_mode(some("user"), some("pass"), some("tok")).is_err());
    }

    #[test]
    fn validates_metric_prefixes() {
        assert_eq!(metric_prefix("claude_stats".into(), "STATS_PREFIX").unwrap(), "claude_stats");
        assert_eq!(metric_prefix("".into(), "STATS_PREFIX").unwrap(), "");
        assert!(metric_prefix("ClaudeStats".into(), "STATS_PREFIX").is_err());
        assert!(metric_prefix("claude-stats".into(), "STATS_PREFIX").is_err());
    }

    #[test]
    fn loads_arguments() {
        let config = parse(&[
            "--job",
            "productivity",
            "--timeout",
            "off",
            "--freshness-window",
            "600",
            "--stats-file",
            "/tmp/stats-cache.json",
            "--system",
        ])
        .unwrap();
        assert_eq!(config.remote_write.url, "http://localhost/write");
        assert_eq!(config.remote_write.identity, Identity::new("productivity", "host1"));
        assert_eq!(config.remote_write.timeout, None);
        assert_eq!(config.remote_write.freshness_window, chrono::Duration::minutes(10));
        assert_eq!(config.stats_prefix, "stats");
        assert!(config.collect_system);
        assert_eq!(config.sources().len(), 2);
    }

    #[test]
    fn rejects_out_of_range_freshness_window() {
        let err = parse(&["--freshness-window", "9223372036854775807"]).unwrap_err();
        assert!(err.to_string().contains("FRESHNESS_WINDOW"));
        assert!(parse(&["--freshness-window", "18446744073709551615"]).is_err());
    }

    #[test]
    fn rejects_empty_identity() {
        assert!(parse(&["--job", ""]).is_err());
    }
}

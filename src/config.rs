//! # Configuration
//!
//! Tool-level settings, built once at startup and passed by reference into
//! every component.
//!
//! Precedence: command-line flags, then environment variables, then defaults.

use crate::constants::{
    DEFAULT_CONFIRMATION_TIMEOUT_SECS, DEFAULT_READ_CONCURRENCY, DEFAULT_RETRY_MAX_ATTEMPTS,
    DEFAULT_WRITE_CONCURRENCY, SNAPSHOT_TTL_DAYS, STATE_DIR_NAME,
};
use crate::provider::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}' (expected text or json)")),
        }
    }
}

/// Where a run writes: the resolved region and the profile used to reach it
///
/// Recorded in the rollback snapshot so a rollback can be checked against
/// (and routed to) the region the put went to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreTarget {
    pub region: String,
    pub profile: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Target region; `None` lets the AWS provider chain decide
    pub region: Option<String>,
    /// Named AWS profile
    pub profile: Option<String>,
    /// Writes issued concurrently per batch
    pub write_concurrency: usize,
    /// Reads issued concurrently during diff lookups and export
    pub read_concurrency: usize,
    /// Throttling retry policy for writes
    pub retry: RetryPolicy,
    /// How long a confirmation prompt waits before treating silence as "no"
    pub confirmation_timeout: Duration,
    /// Skip interactive confirmation (non-interactive / forced mode)
    pub assume_yes: bool,
    /// Directory holding the rollback snapshot
    pub state_dir: PathBuf,
    /// Snapshots older than this are discarded on load
    pub snapshot_ttl: chrono::Duration,
    pub log_format: LogFormat,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            region: None,
            profile: None,
            write_concurrency: DEFAULT_WRITE_CONCURRENCY,
            read_concurrency: DEFAULT_READ_CONCURRENCY,
            retry: RetryPolicy::default(),
            confirmation_timeout: Duration::from_secs(DEFAULT_CONFIRMATION_TIMEOUT_SECS),
            assume_yes: false,
            state_dir: default_state_dir(),
            snapshot_ttl: chrono::Duration::days(SNAPSHOT_TTL_DAYS),
            log_format: LogFormat::Text,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            region: env_var_opt("AWS_REGION").or_else(|| env_var_opt("AWS_DEFAULT_REGION")),
            profile: env_var_opt("AWS_PROFILE"),
            write_concurrency: env_var_or_default(
                "PARAM_SYNC_WRITE_CONCURRENCY",
                DEFAULT_WRITE_CONCURRENCY,
            )
            .max(1),
            read_concurrency: env_var_or_default(
                "PARAM_SYNC_READ_CONCURRENCY",
                DEFAULT_READ_CONCURRENCY,
            )
            .max(1),
            retry: RetryPolicy {
                max_attempts: env_var_or_default(
                    "PARAM_SYNC_MAX_ATTEMPTS",
                    DEFAULT_RETRY_MAX_ATTEMPTS,
                )
                .max(1),
                ..defaults.retry
            },
            confirmation_timeout: defaults.confirmation_timeout,
            assume_yes: env_var_or_default_bool("PARAM_SYNC_ASSUME_YES", false),
            state_dir: env_var_opt("PARAM_SYNC_STATE_DIR").map_or(defaults.state_dir, PathBuf::from),
            snapshot_ttl: defaults.snapshot_ttl,
            log_format: env_var_opt("PARAM_SYNC_LOG_FORMAT")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
        }
    }

    /// Override the region, keeping the current one when `region` is `None`
    #[must_use]
    pub fn with_region(mut self, region: Option<String>) -> Self {
        if region.is_some() {
            self.region = region;
        }
        self
    }

    #[must_use]
    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        if profile.is_some() {
            self.profile = profile;
        }
        self
    }

    /// Batch size used for writes, never zero
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.write_concurrency.max(1)
    }
}

/// `~/.param-sync`, falling back to the working directory when there is no home
fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(STATE_DIR_NAME)
}

fn env_var_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map_or(default, |v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
}

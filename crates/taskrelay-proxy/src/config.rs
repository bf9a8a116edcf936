//! Proxy configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use taskrelay_core::PollPolicy;

/// Where task records are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Process memory; only a local worker can see the records.
    Memory,
    /// A directory shared with the worker.
    File,
}

/// How work reaches the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DispatchKind {
    /// Run the worker inside the proxy process.
    Local,
    /// Post to a worker service.
    Http,
}

/// Configuration errors found at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("--worker-url is required for http dispatch")]
    MissingWorkerUrl,

    #[error("--backend-url is required for local dispatch")]
    MissingBackendUrl,

    #[error("a memory store cannot be shared with an http worker")]
    UnsharedStore,

    #[error("--purge-interval-secs must be greater than zero")]
    ZeroPurgeInterval,

    #[error("invalid poll policy: {0}")]
    Policy(String),
}

/// Proxy configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "taskrelay-proxy")]
#[command(about = "TaskRelay proxy - bounded-latency facade over slow work", long_about = None)]
pub struct Config {
    /// HTTP bind address.
    #[arg(long, env = "TASKRELAY_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: String,

    /// Stage prefix added to redirect locations.
    #[arg(long, env = "TASKRELAY_STAGE_NAME")]
    pub stage_name: Option<String>,

    /// Task store backend.
    #[arg(long, env = "TASKRELAY_STORE", value_enum, default_value = "file")]
    pub store: StoreKind,

    /// Directory for the file store.
    #[arg(long, env = "TASKRELAY_STORE_DIR", default_value = "./taskrelay-data")]
    pub store_dir: PathBuf,

    /// How work is handed to the worker.
    #[arg(long, env = "TASKRELAY_DISPATCH", value_enum, default_value = "local")]
    pub dispatch: DispatchKind,

    /// Worker service base URL (http dispatch).
    #[arg(long, env = "TASKRELAY_WORKER_URL")]
    pub worker_url: Option<String>,

    /// Backend base URL for the in-process worker (local dispatch).
    #[arg(long, env = "TASKRELAY_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Delay between record reads (milliseconds).
    #[arg(long, env = "TASKRELAY_POLL_INTERVAL_MS", default_value_t = 2_000)]
    pub poll_interval_ms: u64,

    /// Give up before polling once this much has elapsed (milliseconds).
    #[arg(long, env = "TASKRELAY_EARLY_FAILURE_MS", default_value_t = 16_000)]
    pub early_failure_ms: u64,

    /// Redirect once this much has elapsed (milliseconds).
    #[arg(long, env = "TASKRELAY_POLL_BUDGET_MS", default_value_t = 22_000)]
    pub poll_budget_ms: u64,

    /// Lifetime of a task record (seconds, 0 disables expiry).
    #[arg(long, env = "TASKRELAY_RECORD_TTL_SECS", default_value_t = 900)]
    pub record_ttl_secs: u64,

    /// Period of the expired-record sweep (seconds).
    #[arg(long, env = "TASKRELAY_PURGE_INTERVAL_SECS", default_value_t = 60)]
    pub purge_interval_secs: u64,

    /// Timeout for one downstream call made by the local worker (seconds).
    #[arg(long, env = "TASKRELAY_DOWNSTREAM_TIMEOUT_SECS", default_value_t = 300)]
    pub downstream_timeout_secs: u64,
}

impl Config {
    /// Timing policy for the poll loop.
    pub fn policy(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_millis(self.poll_interval_ms),
            Duration::from_millis(self.early_failure_ms),
            Duration::from_millis(self.poll_budget_ms),
        )
    }

    /// Record TTL, if expiry is enabled.
    pub fn record_ttl(&self) -> Option<chrono::Duration> {
        taskrelay_worker::config::record_ttl_from_secs(self.record_ttl_secs)
    }

    /// Sweep period.
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }

    /// Downstream call timeout for the local worker.
    pub fn downstream_timeout(&self) -> Duration {
        Duration::from_secs(self.downstream_timeout_secs)
    }

    /// Stage name with surrounding slashes removed, if any remains.
    pub fn stage(&self) -> Option<String> {
        self.stage_name
            .as_deref()
            .map(|s| s.trim_matches('/'))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// Reject combinations that cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.policy()
            .validate()
            .map_err(|e| ConfigError::Policy(e.to_string()))?;

        if self.purge_interval_secs == 0 {
            return Err(ConfigError::ZeroPurgeInterval);
        }

        match self.dispatch {
            DispatchKind::Http if self.store == StoreKind::Memory => {
                Err(ConfigError::UnsharedStore)
            }
            DispatchKind::Http if self.worker_url.is_none() => Err(ConfigError::MissingWorkerUrl),
            DispatchKind::Local if self.backend_url.is_none() => {
                Err(ConfigError::MissingBackendUrl)
            }
            _ => Ok(()),
        }
    }
}

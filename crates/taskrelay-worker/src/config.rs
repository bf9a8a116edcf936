//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Worker configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "taskrelay-worker")]
#[command(about = "TaskRelay worker service", long_about = None)]
pub struct Config {
    /// HTTP bind address for the invoke endpoint.
    #[arg(long, env = "TASKRELAY_WORKER_BIND_ADDR", default_value = "0.0.0.0:8081")]
    pub bind_addr: String,

    /// Directory shared with the proxy for task records.
    #[arg(long, env = "TASKRELAY_STORE_DIR", default_value = "./taskrelay-data")]
    pub store_dir: PathBuf,

    /// Base URL of the backend the downstream calls are forwarded to.
    #[arg(long, env = "TASKRELAY_BACKEND_URL")]
    pub backend_url: String,

    /// Lifetime of a stored result (seconds, 0 disables expiry).
    #[arg(long, env = "TASKRELAY_RECORD_TTL_SECS", default_value_t = 900)]
    pub record_ttl_secs: u64,

    /// Timeout for one downstream call (seconds).
    #[arg(long, env = "TASKRELAY_DOWNSTREAM_TIMEOUT_SECS", default_value_t = 300)]
    pub downstream_timeout_secs: u64,
}

impl Config {
    /// Record TTL, if expiry is enabled.
    pub fn record_ttl(&self) -> Option<chrono::Duration> {
        record_ttl_from_secs(self.record_ttl_secs)
    }

    /// Downstream call timeout.
    pub fn downstream_timeout(&self) -> Duration {
        Duration::from_secs(self.downstream_timeout_secs)
    }
}

/// Convert a TTL in seconds to a record TTL, 0 meaning none.
pub fn record_ttl_from_secs(secs: u64) -> Option<chrono::Duration> {
    match secs {
        0 => None,
        secs => i64::try_from(secs).ok().and_then(chrono::Duration::try_seconds),
    }
}

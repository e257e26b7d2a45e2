use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::CacheSettings;
use crate::retry::RetryPolicy;

#[derive(Debug, Parser)]
#[command(name = "imagepool", version, about = "Serve random image URLs from a self-refilling cache")]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Load image URLs from a file into a category's collection
    Seed(SeedArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SeedArgs {
    /// Category key to seed, e.g. `ysh`
    #[arg(long)]
    pub category: String,

    /// File with one URL per line; blank lines and `#` comments are skipped
    pub file: PathBuf,
}

/// Process configuration, read from flags with environment fallbacks.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Server bind address
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3000")]
    pub bind_addr: SocketAddr,

    /// Redis connection URL
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// URLs fetched per reload, and the pool capacity
    #[arg(long, env = "CACHE_CAPACITY", default_value_t = 20)]
    pub cache_capacity: usize,

    /// Seconds a pool stays fresh after a reload
    #[arg(long, env = "CACHE_EXPIRATION_SECS", default_value_t = 1800)]
    pub cache_expiration_secs: u64,

    /// Minimum seconds between stale-pool sweeps
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 300)]
    pub sweep_interval_secs: u64,

    /// Requests processed concurrently
    #[arg(long, env = "MAX_CONNECTIONS", default_value_t = 10)]
    pub max_connections: usize,

    /// Seconds a request waits for a processing slot
    #[arg(long, env = "ADMISSION_TIMEOUT_SECS", default_value_t = 5)]
    pub admission_timeout_secs: u64,

    /// Requests per client per minute
    #[arg(long, env = "RATE_LIMIT", default_value_t = 100)]
    pub rate_limit: usize,

    /// Reload attempts before a request fails
    #[arg(long, env = "MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Backoff unit between reload attempts, in milliseconds
    #[arg(long, env = "RETRY_INTERVAL_MS", default_value_t = 1000)]
    pub retry_interval_ms: u64,

    /// Seconds allowed for one store round trip
    #[arg(long, env = "STORE_TIMEOUT_SECS", default_value_t = 4)]
    pub store_timeout_secs: u64,

    /// Seconds allowed to establish the store connection
    #[arg(long, env = "CONNECT_TIMEOUT_SECS", default_value_t = 15)]
    pub connect_timeout_secs: u64,

    /// Background replenish workers
    #[arg(long, env = "REPLENISH_WORKERS", default_value_t = 2)]
    pub replenish_workers: usize,
}

impl Config {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// The runtime policy handed to the service components.
    pub fn settings(&self) -> ServiceSettings {
        ServiceSettings {
            cache_capacity: self.cache_capacity,
            cache_expiration: Duration::from_secs(self.cache_expiration_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            max_connections: self.max_connections,
            admission_timeout: Duration::from_secs(self.admission_timeout_secs),
            rate_limit: self.rate_limit,
            max_retries: self.max_retries,
            retry_interval: Duration::from_millis(self.retry_interval_ms),
            store_timeout: Duration::from_secs(self.store_timeout_secs),
            replenish_workers: self.replenish_workers,
        }
    }
}

/// Cache, admission and retry policy, as reported by `GET /config`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSettings {
    pub cache_capacity: usize,
    #[serde(with = "humantime_serde")]
    pub cache_expiration: Duration,
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    pub max_connections: usize,
    #[serde(with = "humantime_serde")]
    pub admission_timeout: Duration,
    pub rate_limit: usize,
    pub max_retries: u32,
    #[serde(with = "humantime_serde")]
    pub retry_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub store_timeout: Duration,
    pub replenish_workers: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        let cache = CacheSettings::default();
        let retry = RetryPolicy::default();
        Self {
            cache_capacity: cache.capacity,
            cache_expiration: cache.expiration,
            sweep_interval: cache.sweep_interval,
            max_connections: 10,
            admission_timeout: Duration::from_secs(5),
            rate_limit: 100,
            max_retries: retry.max_attempts,
            retry_interval: retry.interval,
            store_timeout: Duration::from_secs(4),
            replenish_workers: 2,
        }
    }
}

impl ServiceSettings {
    pub fn cache(&self) -> CacheSettings {
        CacheSettings {
            capacity: self.cache_capacity,
            expiration: self.cache_expiration,
            sweep_interval: self.sweep_interval,
        }
    }

    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy::new()
            .max_attempts(self.max_retries)
            .interval(self.retry_interval)
    }
}

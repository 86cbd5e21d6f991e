//! Engine configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of compiled programs kept
    pub compiler_cache_capacity: usize,
    /// Maximum number of accounts kept in the volume cache
    pub volume_cache_capacity: usize,
    /// Accept transactions older than the newest in-flight one
    pub allow_past_timestamps: bool,
    /// Give up waiting for account locks after this long
    pub lock_timeout: Option<Duration>,
    /// Give up waiting for log ingestion after this long
    pub ingestion_timeout: Option<Duration>,
    /// Mailbox size of the lock scheduler
    pub lock_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            compiler_cache_capacity: 1024,
            volume_cache_capacity: 10_000,
            allow_past_timestamps: false,
            lock_timeout: None,
            ingestion_timeout: None,
            lock_queue_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            compiler_cache_capacity: env_parse("LEDGER_COMPILER_CACHE_CAPACITY")
                .unwrap_or(defaults.compiler_cache_capacity),
            volume_cache_capacity: env_parse("LEDGER_VOLUME_CACHE_CAPACITY")
                .unwrap_or(defaults.volume_cache_capacity),
            allow_past_timestamps: env_parse("LEDGER_ALLOW_PAST_TIMESTAMPS")
                .unwrap_or(defaults.allow_past_timestamps),
            lock_timeout: env_parse("LEDGER_LOCK_TIMEOUT_MS").map(Duration::from_millis),
            ingestion_timeout: env_parse("LEDGER_INGESTION_TIMEOUT_MS").map(Duration::from_millis),
            lock_queue_capacity: env_parse("LEDGER_LOCK_QUEUE_CAPACITY")
                .unwrap_or(defaults.lock_queue_capacity),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

/// Per-command options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameters {
    /// Run the whole pipeline without committing anything
    pub dry_run: bool,
    /// Return once the log is appended; locks are released in the
    /// background when the log is ingested
    pub async_mode: bool,
    /// Makes the command safe to retry
    pub idempotency_key: Option<String>,
}

impl Parameters {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    pub fn with_idempotency_key(key: impl Into<String>) -> Self {
        Self {
            idempotency_key: Some(key.into()),
            ..Self::default()
        }
    }
}

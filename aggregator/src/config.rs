use serde::Deserialize;
use serde::Serialize;
use std::time::Duration;
use tender_sanitizer::SanitizerConfig;

use crate::retry::RetryPolicy;

/// Local storage quota of the extension runtime the aggregate was designed for.
pub const DEFAULT_QUOTA_BYTES: u64 = 10 * 1024 * 1024;

/// Configuration for the aggregation coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Retry policy applied to every storage call
    #[serde(default)]
    pub retry: RetryConfig,

    /// How long a `read_all` snapshot is served from memory
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Period of the storage health check
    #[serde(default = "default_maintenance_interval_secs")]
    pub maintenance_interval_secs: u64,

    /// Cached snapshots older than this are dropped by the health check
    #[serde(default = "default_cache_stale_after_secs")]
    pub cache_stale_after_secs: u64,

    /// Container entry that holds the whole aggregate
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Byte limit enforced by the bundled backends; `0` or `null` disables it
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: Option<u64>,

    #[serde(default)]
    pub sanitizer: SanitizerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_multiplier() -> u32 {
    2
}

fn default_cache_ttl_ms() -> u64 {
    5_000
}

fn default_maintenance_interval_secs() -> u64 {
    30
}

fn default_cache_stale_after_secs() -> u64 {
    60
}

fn default_storage_key() -> String {
    "tenderData".to_string()
}

fn default_quota_bytes() -> Option<u64> {
    Some(DEFAULT_QUOTA_BYTES)
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_delay_ms),
            self.multiplier,
        )
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            cache_ttl_ms: default_cache_ttl_ms(),
            maintenance_interval_secs: default_maintenance_interval_secs(),
            cache_stale_after_secs: default_cache_stale_after_secs(),
            storage_key: default_storage_key(),
            quota_bytes: default_quota_bytes(),
            sanitizer: SanitizerConfig::default(),
        }
    }
}

impl AggregatorConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be > 0".to_string());
        }

        if self.retry.multiplier == 0 {
            return Err("retry.multiplier must be > 0".to_string());
        }

        if self.maintenance_interval_secs == 0 {
            return Err("maintenance_interval_secs must be > 0".to_string());
        }

        if self.storage_key.trim().is_empty() {
            return Err("storage_key must not be empty".to_string());
        }

        Ok(())
    }

    /// Effective quota; TOML has no null, so `0` also means unlimited.
    pub fn quota(&self) -> Option<u64> {
        self.quota_bytes.filter(|bytes| *bytes > 0)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }

    pub fn cache_stale_after(&self) -> Duration {
        Duration::from_secs(self.cache_stale_after_secs)
    }
}

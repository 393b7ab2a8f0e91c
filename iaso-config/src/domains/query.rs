//! Query engine defaults

use crate::error::ConfigResult;
use crate::validation::{validate_ordered, validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Defaults applied to every query and mutation unless a call site overrides them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// How long fetched data is considered fresh
    #[serde(with = "crate::domains::utils::serde_duration_ms", default)]
    pub stale_time: Duration,

    /// How long an unobserved entry stays cached before eviction
    #[serde(
        with = "crate::domains::utils::serde_duration_ms",
        default = "default_cache_time"
    )]
    pub cache_time: Duration,

    /// Number of retries for a failed query
    #[serde(default = "default_retry")]
    pub retry: u32,

    /// Number of retries for a failed mutation
    #[serde(default)]
    pub mutation_retry: u32,

    /// First retry delay, doubled on every attempt
    #[serde(
        with = "crate::domains::utils::serde_duration_ms",
        default = "default_retry_initial_delay"
    )]
    pub retry_initial_delay: Duration,

    /// Upper bound of the retry delay
    #[serde(
        with = "crate::domains::utils::serde_duration_ms",
        default = "default_retry_max_delay"
    )]
    pub retry_max_delay: Duration,

    /// Period of the background sweep removing expired entries
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_gc_interval"
    )]
    pub gc_interval: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,
            cache_time: default_cache_time(),
            retry: default_retry(),
            mutation_retry: 0,
            retry_initial_delay: default_retry_initial_delay(),
            retry_max_delay: default_retry_max_delay(),
            gc_interval: default_gc_interval(),
        }
    }
}

impl Validatable for QueryConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(
            self.retry_initial_delay.as_millis(),
            "retry_initial_delay",
            self.domain_name(),
        )?;
        validate_ordered(
            self.retry_initial_delay,
            self.retry_max_delay,
            "retry_initial_delay",
            "retry_max_delay",
            self.domain_name(),
        )?;
        validate_positive(self.gc_interval.as_secs(), "gc_interval", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "query"
    }
}

fn default_cache_time() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_retry() -> u32 {
    3
}

fn default_retry_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_retry_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_gc_interval() -> Duration {
    Duration::from_secs(60)
}

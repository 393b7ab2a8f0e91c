//! Engine defaults

use crate::options::Retry;
use iaso_resilience::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Defaults applied when query or mutation options leave a value unset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDefaults {
    #[serde(with = "humantime_serde")]
    pub stale_time: Duration,

    #[serde(with = "humantime_serde")]
    pub cache_time: Duration,

    /// Retries for failed query fetches
    pub retry: u32,

    /// Retries for failed mutations
    pub mutation_retry: u32,

    #[serde(with = "humantime_serde")]
    pub retry_initial_delay: Duration,

    #[serde(with = "humantime_serde")]
    pub retry_max_delay: Duration,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,
            cache_time: Duration::from_secs(300),
            retry: 3,
            mutation_retry: 0,
            retry_initial_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(30),
        }
    }
}

impl QueryDefaults {
    /// Policy for a query, honoring its own retry option first
    pub fn query_retry(&self, retry: Option<Retry>) -> RetryPolicy {
        retry
            .unwrap_or(Retry::from(self.retry))
            .policy(self.retry_initial_delay, self.retry_max_delay)
    }

    pub fn mutation_retry(&self, retry: Option<Retry>) -> RetryPolicy {
        retry
            .unwrap_or(Retry::from(self.mutation_retry))
            .policy(self.retry_initial_delay, self.retry_max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_resolution() {
        let defaults = QueryDefaults::default();
        assert_eq!(defaults.query_retry(None).max_attempts, 4);
        assert_eq!(defaults.query_retry(Some(Retry::Never)).max_attempts, 1);
        assert_eq!(defaults.mutation_retry(None).max_attempts, 1);
        assert_eq!(defaults.mutation_retry(Some(Retry::Times(2))).max_attempts, 3);
    }
}

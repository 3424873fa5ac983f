//! Options handed to backend drivers.

use super::lookup_bool;

pub const ENABLE_CROSS_PARTITION_QUERY_ENV: &str = "COSMOS_ENABLE_CROSS_PARTITION_QUERY";
pub const MAX_RETRY_ATTEMPTS_ENV: &str = "COSMOS_MAX_RETRY_ATTEMPTS";
pub const MAX_RETRY_WAIT_TIME_ENV: &str = "COSMOS_MAX_RETRY_WAIT_TIME";

/// Driver behaviour shared by every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverOptions {
    /// Default for queries that do not say otherwise.
    pub enable_cross_partition_query: bool,
    /// Retries on throttled (429) responses.
    pub max_retry_attempts: u32,
    /// Upper bound on total time spent waiting between retries, in ms.
    pub max_retry_wait_ms: u64,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            enable_cross_partition_query: true,
            max_retry_attempts: 9,
            max_retry_wait_ms: 30_000,
        }
    }
}

impl DriverOptions {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Unparseable numbers fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            enable_cross_partition_query: lookup_bool(
                &lookup,
                ENABLE_CROSS_PARTITION_QUERY_ENV,
                defaults.enable_cross_partition_query,
            ),
            max_retry_attempts: lookup(MAX_RETRY_ATTEMPTS_ENV)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_retry_attempts),
            max_retry_wait_ms: lookup(MAX_RETRY_WAIT_TIME_ENV)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_retry_wait_ms),
        }
    }
}

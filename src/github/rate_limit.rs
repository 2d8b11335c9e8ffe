use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::time::Duration;

use crate::config::Config;

pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// How the client reacts to primary rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub min_wait: Duration,
    pub max_retries: u32,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            min_wait: Duration::from_secs(5),
            max_retries: 10,
        }
    }
}

impl From<&Config> for RateLimitPolicy {
    fn from(config: &Config) -> Self {
        Self {
            min_wait: Duration::from_secs(config.rate_limit.min_wait_secs),
            max_retries: config.rate_limit.max_retries,
        }
    }
}

/// True for a 403 whose remaining quota is reported as exactly zero.
///
/// A 403 without that header (or with quota left) is an ordinary failure.
pub fn is_quota_exhausted(status: StatusCode, headers: &HeaderMap) -> bool {
    status == StatusCode::FORBIDDEN
        && headers
            .get(REMAINING_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim() == "0")
            .unwrap_or(false)
}

/// Remaining quota as reported by the server, when it says.
pub fn remaining(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(REMAINING_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Seconds-since-epoch from the reset header; absent or garbled counts as 0.
pub fn reset_epoch(headers: &HeaderMap) -> i64 {
    headers
        .get(RESET_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(0)
}

/// Time to sleep before retrying: until the reset instant, never less than `min_wait`.
pub fn wait_duration(reset_epoch: i64, now: DateTime<Utc>, min_wait: Duration) -> Duration {
    let until_reset = reset_epoch.saturating_sub(now.timestamp()).max(0);
    Duration::from_secs(until_reset as u64).max(min_wait)
}

//! Retry orchestrator defaults and cache key prefixes.

/// Prefix for persisted error records: `contract_error:<id>`.
pub const CONTRACT_ERROR_KEY_PREFIX: &str = "contract_error";

/// Prefix for critical-error alert flags: `alert:<id>`.
pub const ALERT_KEY_PREFIX: &str = "alert";

/// Hash key accumulating per-category error counters.
pub const ERROR_STATS_KEY: &str = "error_stats";

pub const DEFAULT_RETRY_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;
pub const DEFAULT_RETRY_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;

pub const DEFAULT_BREAKER_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_BREAKER_RECOVERY_TIMEOUT_MS: i64 = 60_000;

/// Jitter multiplies each computed delay by a uniform factor in this range.
pub const RETRY_JITTER_MIN: f64 = 0.5;
pub const RETRY_JITTER_MAX: f64 = 1.0;

/// Error records are kept for 7 days.
pub const ERROR_RECORD_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Alert flags are kept for 1 hour.
pub const ALERT_TTL_SECS: u64 = 60 * 60;

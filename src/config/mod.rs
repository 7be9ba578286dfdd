//! Configuration for the mediation services, loaded from environment
//! variables with sensible defaults.
use std::env;

use crate::constants::*;

/// Process-level settings shared by every component.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// The URL for the Redis instance.
    pub redis_url: String,
    /// The JSON-RPC endpoint of the chain to observe.
    pub rpc_url: String,
    /// The contract whose state and transactions are mediated.
    pub contract_address: String,
    /// Optional webhook endpoint for in-app notifications.
    pub notification_webhook_url: Option<String>,
    /// Optional signing key for webhook payloads.
    pub notification_signing_key: Option<String>,
    /// Optional endpoint external event envelopes are forwarded to.
    pub event_monitor_url: Option<String>,
}

impl ServiceConfig {
    /// Creates a new `ServiceConfig` instance from environment variables.
    ///
    /// # Panics
    ///
    /// Panics if `REDIS_URL`, `RPC_URL` or `CONTRACT_ADDRESS` are not set,
    /// as they are required for the services to function.
    pub fn from_env() -> Self {
        Self {
            redis_url: env::var("REDIS_URL").expect("REDIS_URL must be set"),
            rpc_url: env::var("RPC_URL").expect("RPC_URL must be set"),
            contract_address: env::var("CONTRACT_ADDRESS")
                .expect("CONTRACT_ADDRESS must be set")
                .to_lowercase(),
            notification_webhook_url: env::var("NOTIFICATION_WEBHOOK_URL").ok(),
            notification_signing_key: env::var("NOTIFICATION_SIGNING_KEY").ok(),
            event_monitor_url: env::var("EVENT_MONITOR_URL").ok(),
        }
    }
}

/// Tracker tuning knobs.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Number of receipt polls before a transaction is declared timed out.
    pub max_retries: u32,
    /// Delay between polling passes.
    pub retry_interval_ms: u64,
    /// Wall-clock budget before a pending transaction times out.
    pub timeout_ms: i64,
    /// Recorded but not gating: confirmation happens on first successful receipt.
    pub confirmation_blocks: u64,
    pub notifications_enabled: bool,
    pub realtime_enabled: bool,
    /// Maximum hashes drained from the queues per pass.
    pub batch_size: usize,
    pub cleanup_interval_ms: u64,
    /// Terminal records older than this are evicted by cleanup.
    pub retention_ms: i64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_TRACKER_MAX_RETRIES,
            retry_interval_ms: DEFAULT_TRACKER_RETRY_INTERVAL_MS,
            timeout_ms: DEFAULT_TRACKER_TIMEOUT_MS,
            confirmation_blocks: DEFAULT_TRACKER_CONFIRMATION_BLOCKS,
            notifications_enabled: true,
            realtime_enabled: true,
            batch_size: DEFAULT_TRACKER_BATCH_SIZE,
            cleanup_interval_ms: DEFAULT_TRACKER_CLEANUP_INTERVAL_MS,
            retention_ms: DEFAULT_TRACKER_RETENTION_MS,
        }
    }
}

impl TrackerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: parse_env("TRACKER_MAX_RETRIES", defaults.max_retries),
            retry_interval_ms: parse_env("TRACKER_RETRY_INTERVAL_MS", defaults.retry_interval_ms),
            timeout_ms: parse_env("TRACKER_TIMEOUT_MS", defaults.timeout_ms),
            confirmation_blocks: parse_env(
                "TRACKER_CONFIRMATION_BLOCKS",
                defaults.confirmation_blocks,
            ),
            notifications_enabled: parse_env_bool("TRACKER_NOTIFICATIONS_ENABLED", true),
            realtime_enabled: parse_env_bool("TRACKER_REALTIME_ENABLED", true),
            batch_size: parse_env("TRACKER_BATCH_SIZE", defaults.batch_size),
            cleanup_interval_ms: parse_env(
                "TRACKER_CLEANUP_INTERVAL_MS",
                defaults.cleanup_interval_ms,
            ),
            retention_ms: parse_env("TRACKER_RETENTION_MS", defaults.retention_ms),
        }
    }
}

/// Synchronizer tuning knobs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub sync_interval_ms: u64,
    /// TTL applied to cached state snapshots.
    pub state_ttl_secs: u64,
    /// TTL applied to per-contract session records.
    pub contract_session_ttl_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_interval_ms: DEFAULT_SYNC_INTERVAL_MS,
            state_ttl_secs: DEFAULT_STATE_TTL_SECS,
            contract_session_ttl_secs: DEFAULT_CONTRACT_SESSION_TTL_SECS,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sync_interval_ms: parse_env("SYNC_INTERVAL_MS", defaults.sync_interval_ms),
            state_ttl_secs: parse_env("SYNC_STATE_TTL_SECS", defaults.state_ttl_secs),
            contract_session_ttl_secs: parse_env(
                "SYNC_CONTRACT_SESSION_TTL_SECS",
                defaults.contract_session_ttl_secs,
            ),
        }
    }
}

/// Backoff parameters for one guarded call.
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_RETRY_MAX_RETRIES,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            multiplier: DEFAULT_RETRY_MULTIPLIER,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            jitter: true,
        }
    }
}

impl RetryStrategy {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: parse_env("RETRY_MAX_RETRIES", defaults.max_retries),
            base_delay_ms: parse_env("RETRY_BASE_DELAY_MS", defaults.base_delay_ms),
            multiplier: parse_env("RETRY_MULTIPLIER", defaults.multiplier),
            max_delay_ms: parse_env("RETRY_MAX_DELAY_MS", defaults.max_delay_ms),
            jitter: parse_env_bool("RETRY_JITTER", true),
        }
    }
}

/// Per-service circuit breaker thresholds.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the breaker.
    pub failure_threshold: u32,
    /// Open duration before a half-open probe is allowed.
    pub recovery_timeout_ms: i64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_BREAKER_FAILURE_THRESHOLD,
            recovery_timeout_ms: DEFAULT_BREAKER_RECOVERY_TIMEOUT_MS,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            failure_threshold: parse_env("BREAKER_FAILURE_THRESHOLD", defaults.failure_threshold),
            recovery_timeout_ms: parse_env(
                "BREAKER_RECOVERY_TIMEOUT_MS",
                defaults.recovery_timeout_ms,
            ),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazy_static::lazy_static;
    use std::env;
    use std::sync::Mutex;

    // Use a mutex to ensure tests don't run in parallel when modifying env vars
    lazy_static! {
        static ref ENV_MUTEX: Mutex<()> = Mutex::new(());
    }

    fn setup() {
        for name in [
            "REDIS_URL",
            "RPC_URL",
            "CONTRACT_ADDRESS",
            "NOTIFICATION_WEBHOOK_URL",
            "NOTIFICATION_SIGNING_KEY",
            "EVENT_MONITOR_URL",
            "TRACKER_MAX_RETRIES",
            "TRACKER_RETRY_INTERVAL_MS",
            "TRACKER_TIMEOUT_MS",
            "TRACKER_CONFIRMATION_BLOCKS",
            "TRACKER_NOTIFICATIONS_ENABLED",
            "TRACKER_REALTIME_ENABLED",
            "TRACKER_BATCH_SIZE",
            "TRACKER_CLEANUP_INTERVAL_MS",
            "TRACKER_RETENTION_MS",
            "SYNC_INTERVAL_MS",
            "SYNC_STATE_TTL_SECS",
            "SYNC_CONTRACT_SESSION_TTL_SECS",
            "RETRY_MAX_RETRIES",
            "RETRY_BASE_DELAY_MS",
            "RETRY_MULTIPLIER",
            "RETRY_MAX_DELAY_MS",
            "RETRY_JITTER",
            "BREAKER_FAILURE_THRESHOLD",
            "BREAKER_RECOVERY_TIMEOUT_MS",
        ] {
            env::remove_var(name);
        }

        env::set_var("REDIS_URL", "redis://localhost:6379");
        env::set_var("RPC_URL", "http://localhost:8545");
        env::set_var("CONTRACT_ADDRESS", "0xAbC0000000000000000000000000000000000001");
    }

    #[test]
    fn test_service_config_lowercases_contract_address() {
        let _lock = ENV_MUTEX.lock().unwrap();
        setup();

        let config = ServiceConfig::from_env();

        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(
            config.contract_address,
            "0xabc0000000000000000000000000000000000001"
        );
        assert!(config.notification_webhook_url.is_none());
    }

    #[test]
    fn test_tracker_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        setup();

        let config = TrackerConfig::from_env();

        assert_eq!(config.max_retries, 30);
        assert_eq!(config.retry_interval_ms, 5000);
        assert_eq!(config.timeout_ms, 300_000);
        assert_eq!(config.confirmation_blocks, 1);
        assert!(config.notifications_enabled);
        assert!(config.realtime_enabled);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.cleanup_interval_ms, 3_600_000);
        assert_eq!(config.retention_ms, 86_400_000);
    }

    #[test]
    fn test_tracker_overrides_and_invalid_values() {
        let _lock = ENV_MUTEX.lock().unwrap();
        setup();
        env::set_var("TRACKER_MAX_RETRIES", "12");
        env::set_var("TRACKER_BATCH_SIZE", "not_a_number");
        env::set_var("TRACKER_NOTIFICATIONS_ENABLED", "false");

        let config = TrackerConfig::from_env();

        assert_eq!(config.max_retries, 12);
        // Falls back to the default when parsing fails
        assert_eq!(config.batch_size, 10);
        assert!(!config.notifications_enabled);
    }

    #[test]
    fn test_sync_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        setup();

        let config = SyncConfig::from_env();

        assert_eq!(config.sync_interval_ms, 30_000);
        assert_eq!(config.state_ttl_secs, 300);
        assert_eq!(config.contract_session_ttl_secs, 86_400);
    }

    #[test]
    fn test_retry_strategy_defaults_and_overrides() {
        let _lock = ENV_MUTEX.lock().unwrap();
        setup();

        let strategy = RetryStrategy::from_env();
        assert_eq!(strategy.max_retries, 3);
        assert_eq!(strategy.base_delay_ms, 1000);
        assert_eq!(strategy.multiplier, 2.0);
        assert_eq!(strategy.max_delay_ms, 30_000);
        assert!(strategy.jitter);

        env::set_var("RETRY_MULTIPLIER", "1.5");
        env::set_var("RETRY_JITTER", "false");
        let strategy = RetryStrategy::from_env();
        assert_eq!(strategy.multiplier, 1.5);
        assert!(!strategy.jitter);
    }

    #[test]
    fn test_breaker_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        setup();

        let config = CircuitBreakerConfig::from_env();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.recovery_timeout_ms, 60_000);
    }
}

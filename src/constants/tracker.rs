//! Transaction tracker defaults and cache key prefixes.

/// Prefix for per-hash tracking records: `tx_status:<hash>`.
pub const TX_STATUS_KEY_PREFIX: &str = "tx_status";

/// Prefix for batch aggregates: `tx_batch:<id>`.
pub const TX_BATCH_KEY_PREFIX: &str = "tx_batch";

/// Prefix for priority polling queues: `tx_tracking_queue:<priority>`.
pub const TX_TRACKING_QUEUE_KEY_PREFIX: &str = "tx_tracking_queue";

/// Prefix for per-user decoded event history lists: `event_history:<addr>`.
pub const EVENT_HISTORY_KEY_PREFIX: &str = "event_history";

/// Event history lists are trimmed to this many entries.
pub const EVENT_HISTORY_MAX_ENTRIES: usize = 100;

pub const DEFAULT_TRACKER_MAX_RETRIES: u32 = 30;
pub const DEFAULT_TRACKER_RETRY_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_TRACKER_TIMEOUT_MS: i64 = 300_000;
pub const DEFAULT_TRACKER_CONFIRMATION_BLOCKS: u64 = 1;
pub const DEFAULT_TRACKER_BATCH_SIZE: usize = 10;
pub const DEFAULT_TRACKER_CLEANUP_INTERVAL_MS: u64 = 3_600_000;
pub const DEFAULT_TRACKER_RETENTION_MS: i64 = 86_400_000;

/// Tracking records expire from the cache after 24 hours.
pub const TX_RECORD_TTL_SECS: u64 = 24 * 60 * 60;

/// Batch aggregates expire from the cache after 24 hours.
pub const TX_BATCH_TTL_SECS: u64 = 24 * 60 * 60;

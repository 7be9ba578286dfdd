//! State synchronizer defaults and cache key prefixes.

/// Global contract configuration snapshot key.
pub const CONTRACT_STATE_KEY: &str = "contractState";

/// Prefix for per-user permission snapshots: `userPermission:<addr>`.
pub const USER_PERMISSION_KEY_PREFIX: &str = "userPermission";

/// Prefix for mini-app session snapshots: `miniAppSession:<addr>`.
pub const MINI_APP_SESSION_KEY_PREFIX: &str = "miniAppSession";

/// Prefix for active-session flags: `active_session:<addr>`.
pub const ACTIVE_SESSION_KEY_PREFIX: &str = "active_session";

/// Prefix for session records keyed by user and contract:
/// `contractSession:<user>:<contract>`.
pub const CONTRACT_SESSION_KEY_PREFIX: &str = "contractSession";

pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_STATE_TTL_SECS: u64 = 300;
pub const DEFAULT_CONTRACT_SESSION_TTL_SECS: u64 = 86_400;

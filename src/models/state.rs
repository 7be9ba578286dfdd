//! Cached chain-state snapshots kept in sync by the state synchronizer.

use serde::{Deserialize, Serialize};

/// Global contract configuration, cached under `contractState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractStateSnapshot {
    pub owner: String,
    pub paused: bool,
    pub session_duration_secs: u64,
    pub permission_count: u64,
    pub last_updated: String,
}

/// Per-user permission flags, cached under `userPermission:<addr>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPermissionState {
    pub user_address: String,
    pub active: bool,
    pub level: u64,
    pub expires_at: Option<String>,
    pub granted_at: Option<String>,
    pub last_updated: String,
}

/// Mini-app session flags, cached under `miniAppSession:<addr>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiniAppSessionState {
    pub user_address: String,
    pub active: bool,
    pub app_address: Option<String>,
    pub expires_at: Option<String>,
    pub last_updated: String,
}

/// Per user-and-contract session record, cached under
/// `contractSession:<user>:<contract>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractSession {
    pub user_address: String,
    pub contract_address: String,
    pub permissions: Vec<String>,
    pub created_at: String,
    pub expires_at: Option<String>,
}

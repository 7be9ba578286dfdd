//! Periodic reconciliation of cached contract and user state with the chain.
//!
//! The cache is authoritative for reads between ticks; each tick refetches
//! the global contract configuration, refreshes the permission and session
//! snapshots of every known user, and drops cache-only session records whose
//! on-chain counterpart is gone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::constants::{
    ACTIVE_SESSION_KEY_PREFIX, CONTRACT_SESSION_KEY_PREFIX, CONTRACT_STATE_KEY,
    EVENT_HISTORY_KEY_PREFIX, MINI_APP_SESSION_KEY_PREFIX, USER_PERMISSION_KEY_PREFIX,
};
use crate::models::{
    ContractSession, ContractStateSnapshot, MiniAppSessionState, SyncError, UserPermissionState,
};
use crate::repositories::CacheStore;
use crate::services::ChainProviderTrait;

pub struct StateSynchronizer<P, C> {
    provider: Arc<P>,
    cache: Arc<C>,
    config: SyncConfig,
    running: Arc<AtomicBool>,
}

impl<P, C> Clone for StateSynchronizer<P, C> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            cache: self.cache.clone(),
            config: self.config.clone(),
            running: self.running.clone(),
        }
    }
}

fn user_permission_key(user: &str) -> String {
    format!("{}:{}", USER_PERMISSION_KEY_PREFIX, user.to_lowercase())
}

fn mini_app_session_key(user: &str) -> String {
    format!("{}:{}", MINI_APP_SESSION_KEY_PREFIX, user.to_lowercase())
}

fn active_session_key(user: &str) -> String {
    format!("{}:{}", ACTIVE_SESSION_KEY_PREFIX, user.to_lowercase())
}

fn contract_session_key(user: &str, contract: &str) -> String {
    format!(
        "{}:{}:{}",
        CONTRACT_SESSION_KEY_PREFIX,
        user.to_lowercase(),
        contract.to_lowercase()
    )
}

impl<P, C> StateSynchronizer<P, C>
where
    P: ChainProviderTrait + 'static,
    C: CacheStore + 'static,
{
    pub fn new(provider: Arc<P>, cache: Arc<C>, config: SyncConfig) -> Self {
        Self {
            provider,
            cache,
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts the reconciliation loop. A tick completes before the next
    /// sleep, so ticks never overlap.
    pub fn start_sync(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(
            "State synchronizer started (every {}ms)",
            self.config.sync_interval_ms
        );

        let synchronizer = self.clone();
        tokio::spawn(async move {
            while synchronizer.running.load(Ordering::SeqCst) {
                if let Err(e) = synchronizer.sync_once().await {
                    error!("Sync tick failed: {}", e);
                }
                tokio::time::sleep(Duration::from_millis(synchronizer.config.sync_interval_ms))
                    .await;
            }
            debug!("Sync loop stopped");
        });
    }

    pub fn stop_sync(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!("State synchronizer stopping");
    }

    /// One reconciliation tick. A failed global-state fetch aborts the tick;
    /// per-user failures are logged and skipped.
    pub async fn sync_once(&self) -> Result<(), SyncError> {
        self.sync_contract_state().await?;

        for user in self.discover_users().await? {
            if let Err(e) = self.refresh_user_state(&user).await {
                warn!("User state refresh failed for {}: {}", user, e);
            }
        }

        self.reconcile_contract_sessions().await?;
        Ok(())
    }

    async fn sync_contract_state(&self) -> Result<(), SyncError> {
        let snapshot = self.provider.get_contract_state().await?;
        let json = serde_json::to_string(&snapshot)
            .map_err(|e| SyncError::InvalidData(format!("Contract state: {}", e)))?;
        self.cache
            .set_ex(CONTRACT_STATE_KEY, &json, self.config.state_ttl_secs)
            .await?;
        debug!(
            "Contract state cached (paused: {}, permissions: {})",
            snapshot.paused, snapshot.permission_count
        );
        Ok(())
    }

    /// Users worth refreshing: anyone with event history or an active
    /// session marker.
    async fn discover_users(&self) -> Result<Vec<String>, SyncError> {
        let mut users = Vec::new();
        for prefix in [EVENT_HISTORY_KEY_PREFIX, ACTIVE_SESSION_KEY_PREFIX] {
            let keys = self.cache.keys(&format!("{}:*", prefix)).await?;
            for key in keys {
                if let Some(user) = key.strip_prefix(&format!("{}:", prefix)) {
                    users.push(user.to_lowercase());
                }
            }
        }
        users.sort();
        users.dedup();
        Ok(users)
    }

    /// Immediate out-of-band refresh of one user's cached state. Inactive
    /// on-chain state evicts the corresponding cache keys.
    pub async fn refresh_user_state(&self, user_address: &str) -> Result<(), SyncError> {
        let permission = self.provider.get_user_permission_state(user_address).await?;
        if permission.active {
            let json = serde_json::to_string(&permission)
                .map_err(|e| SyncError::InvalidData(format!("Permission state: {}", e)))?;
            self.cache
                .set_ex(
                    &user_permission_key(user_address),
                    &json,
                    self.config.state_ttl_secs,
                )
                .await?;
        } else {
            self.cache.del(&user_permission_key(user_address)).await?;
        }

        let session = self.provider.get_mini_app_session(user_address).await?;
        if session.active {
            let json = serde_json::to_string(&session)
                .map_err(|e| SyncError::InvalidData(format!("Session state: {}", e)))?;
            self.cache
                .set_ex(
                    &mini_app_session_key(user_address),
                    &json,
                    self.config.state_ttl_secs,
                )
                .await?;
            self.cache
                .set_ex(
                    &active_session_key(user_address),
                    "1",
                    self.config.state_ttl_secs,
                )
                .await?;
        } else {
            self.cache.del(&mini_app_session_key(user_address)).await?;
            self.cache.del(&active_session_key(user_address)).await?;
        }

        Ok(())
    }

    /// Drops cache-only contract session records whose on-chain session no
    /// longer exists.
    async fn reconcile_contract_sessions(&self) -> Result<(), SyncError> {
        let prefix = format!("{}:", CONTRACT_SESSION_KEY_PREFIX);
        let keys = self.cache.keys(&format!("{}*", prefix)).await?;

        for key in keys {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            let Some((user, contract)) = rest.split_once(':') else {
                warn!("Skipping malformed session key {}", key);
                continue;
            };
            match self.provider.has_active_session(user, contract).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!("Dropping stale session {} / {}", user, contract);
                    self.cache.del(&key).await?;
                }
                Err(e) => warn!("Session check failed for {}: {}", key, e),
            }
        }
        Ok(())
    }

    /// Cache-only session record with a fixed expiry.
    pub async fn create_contract_session(
        &self,
        user_address: &str,
        contract_address: &str,
        permissions: Vec<String>,
    ) -> Result<ContractSession, SyncError> {
        let ttl = self.config.contract_session_ttl_secs;
        let session = ContractSession {
            user_address: user_address.to_lowercase(),
            contract_address: contract_address.to_lowercase(),
            permissions,
            created_at: Utc::now().to_rfc3339(),
            expires_at: Some(
                (Utc::now() + chrono::Duration::seconds(ttl as i64)).to_rfc3339(),
            ),
        };
        let json = serde_json::to_string(&session)
            .map_err(|e| SyncError::InvalidData(format!("Contract session: {}", e)))?;
        self.cache
            .set_ex(
                &contract_session_key(user_address, contract_address),
                &json,
                ttl,
            )
            .await?;
        Ok(session)
    }

    pub async fn get_cached_contract_state(
        &self,
    ) -> Result<Option<ContractStateSnapshot>, SyncError> {
        let Some(json) = self.cache.get(CONTRACT_STATE_KEY).await? else {
            return Ok(None);
        };
        let snapshot = serde_json::from_str(&json)
            .map_err(|e| SyncError::InvalidData(format!("Contract state: {}", e)))?;
        Ok(Some(snapshot))
    }

    pub async fn get_cached_user_permission(
        &self,
        user_address: &str,
    ) -> Result<Option<UserPermissionState>, SyncError> {
        let Some(json) = self.cache.get(&user_permission_key(user_address)).await? else {
            return Ok(None);
        };
        let state = serde_json::from_str(&json)
            .map_err(|e| SyncError::InvalidData(format!("Permission state: {}", e)))?;
        Ok(Some(state))
    }

    pub async fn get_cached_mini_app_session(
        &self,
        user_address: &str,
    ) -> Result<Option<MiniAppSessionState>, SyncError> {
        let Some(json) = self.cache.get(&mini_app_session_key(user_address)).await? else {
            return Ok(None);
        };
        let state = serde_json::from_str(&json)
            .map_err(|e| SyncError::InvalidData(format!("Session state: {}", e)))?;
        Ok(Some(state))
    }
}

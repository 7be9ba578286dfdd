//! Transaction lifecycle records persisted by the tracker.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Failed,
    Cancelled,
    Timeout,
    Unknown,
}

impl TransactionStatus {
    /// Every status except `Pending` is terminal; a terminal record never
    /// transitions back to pending.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Timeout => "timeout",
            TransactionStatus::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Queue tiers, drained highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl TransactionPriority {
    pub const ALL: [TransactionPriority; 4] = [
        TransactionPriority::Critical,
        TransactionPriority::High,
        TransactionPriority::Medium,
        TransactionPriority::Low,
    ];
}

impl fmt::Display for TransactionPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionPriority::Critical => "critical",
            TransactionPriority::High => "high",
            TransactionPriority::Medium => "medium",
            TransactionPriority::Low => "low",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionCategory {
    Permission,
    Transfer,
    Session,
    Admin,
    Other,
}

impl fmt::Display for TransactionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionCategory::Permission => "permission",
            TransactionCategory::Transfer => "transfer",
            TransactionCategory::Session => "session",
            TransactionCategory::Admin => "admin",
            TransactionCategory::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// A decoded log entry from the known contract interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedContractEvent {
    pub name: String,
    pub contract_address: String,
    pub params: HashMap<String, String>,
}

/// Envelope forwarded to the external event-monitoring collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalEventEnvelope {
    pub transaction_hash: String,
    pub user_address: Option<String>,
    pub block_number: Option<u64>,
    pub event: DecodedContractEvent,
    pub observed_at: String,
}

/// Persisted per-hash tracking record, stored under `tx_status:<hash>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub hash: String,
    pub user_address: Option<String>,
    pub status: TransactionStatus,
    pub category: TransactionCategory,
    pub priority: TransactionPriority,

    // Mempool enrichment, best-effort.
    pub from: Option<String>,
    pub to: Option<String>,
    pub value: Option<String>,
    pub nonce: Option<u64>,
    pub gas_limit: Option<u64>,
    pub input: Option<String>,
    pub method: Option<String>,

    // Receipt fields, populated on confirmation.
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub effective_gas_price: Option<String>,
    pub log_count: Option<usize>,
    pub confirmations: Option<u64>,
    pub decoded_events: Vec<DecodedContractEvent>,
    pub estimated_confirmation_time_ms: Option<i64>,

    pub error: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub batch_id: Option<String>,
    pub metadata: Option<serde_json::Value>,

    pub created_at: String,
    pub updated_at: String,
}

impl TransactionRecord {
    pub fn new(
        hash: &str,
        user_address: Option<&str>,
        category: TransactionCategory,
        priority: TransactionPriority,
        max_retries: u32,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            hash: hash.to_string(),
            user_address: user_address.map(|u| u.to_lowercase()),
            status: TransactionStatus::Pending,
            category,
            priority,
            from: None,
            to: None,
            value: None,
            nonce: None,
            gas_limit: None,
            input: None,
            method: None,
            block_number: None,
            gas_used: None,
            effective_gas_price: None,
            log_count: None,
            confirmations: None,
            decoded_events: Vec::new(),
            estimated_confirmation_time_ms: None,
            error: None,
            retry_count: 0,
            max_retries,
            batch_id: None,
            metadata,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Completed,
    Failed,
    Partial,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
            BatchStatus::Partial => "partial",
        };
        write!(f, "{}", s)
    }
}

/// Persisted batch aggregate, stored under `tx_batch:<id>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionBatch {
    pub id: String,
    pub transaction_hashes: Vec<String>,
    pub status: BatchStatus,
    pub success_count: u32,
    pub failure_count: u32,
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl TransactionBatch {
    pub fn new(id: &str, hashes: Vec<String>) -> Self {
        Self {
            id: id.to_string(),
            transaction_hashes: hashes,
            status: BatchStatus::Pending,
            success_count: 0,
            failure_count: 0,
            created_at: Utc::now().to_rfc3339(),
            completed_at: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        (self.success_count + self.failure_count) as usize >= self.transaction_hashes.len()
    }
}

/// Aggregates returned by `get_transaction_stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionStats {
    pub total: u64,
    pub by_status: HashMap<String, u64>,
    pub by_category: HashMap<String, u64>,
    pub by_priority: HashMap<String, u64>,
    pub recent_24h: u64,
}

//! Structured error records produced by the retry orchestrator, plus the
//! circuit breaker state it maintains per service key.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Contract,
    RateLimit,
    Timeout,
    Validation,
    Permission,
    Authentication,
    Resource,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Contract => "contract",
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Permission => "permission",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Resource => "resource",
            ErrorCategory::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorSeverity::Low => "low",
            ErrorSeverity::Medium => "medium",
            ErrorSeverity::High => "high",
            ErrorSeverity::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// Append-only record of a classified failure. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractError {
    pub id: String,
    pub error_type: String,
    pub message: String,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub context: HashMap<String, String>,
    pub timestamp: String,
    pub retryable: bool,
    pub retry_count: u32,
    pub max_retries: u32,
    pub next_retry: Option<String>,
    pub resolved: bool,
}

impl ContractError {
    pub fn new(
        error_type: &str,
        message: &str,
        category: ErrorCategory,
        severity: ErrorSeverity,
        retryable: bool,
        max_retries: u32,
        context: HashMap<String, String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            error_type: error_type.to_string(),
            message: message.to_string(),
            category,
            severity,
            context,
            timestamp: Utc::now().to_rfc3339(),
            retryable,
            retry_count: 0,
            max_retries,
            next_retry: None,
            resolved: false,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == ErrorSeverity::Critical
    }
}

/// Call-site context used for classification and breaker keying.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub service: Option<String>,
    pub function_name: Option<String>,
    pub details: HashMap<String, String>,
}

impl ErrorContext {
    pub fn for_service(service: &str) -> Self {
        Self {
            service: Some(service.to_string()),
            ..Default::default()
        }
    }

    pub fn for_function(function_name: &str) -> Self {
        Self {
            function_name: Some(function_name.to_string()),
            ..Default::default()
        }
    }

    pub fn with_detail(mut self, key: &str, value: &str) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        self
    }

    /// Breaker/service key: service, else function name, else "unknown".
    pub fn service_key(&self) -> String {
        self.service
            .clone()
            .or_else(|| self.function_name.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        };
        write!(f, "{}", s)
    }
}

/// Per-service breaker bookkeeping. Timestamps are UNIX milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub failure_count: u32,
    pub last_failure_at: Option<i64>,
    pub state: CircuitState,
    pub next_attempt_at: Option<i64>,
}

impl Default for CircuitBreakerState {
    fn default() -> Self {
        Self {
            failure_count: 0,
            last_failure_at: None,
            state: CircuitState::Closed,
            next_attempt_at: None,
        }
    }
}

//! Error classification rules.
//!
//! Classification is a pure function of the error message text: the same
//! message always yields the same category, severity and retry policy.
//! Rules are checked in a fixed priority order and the first match wins.

use crate::models::{ErrorCategory, ErrorSeverity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub retryable: bool,
    pub max_retries: u32,
}

fn contains_any(message: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| message.contains(needle))
}

/// Classifies an error message. Matching is case-insensitive.
pub fn classify(message: &str) -> Classification {
    let message = message.to_lowercase();

    if contains_any(
        &message,
        &[
            "network",
            "connection",
            "econnrefused",
            "econnreset",
            "enotfound",
            "socket",
            "dns",
        ],
    ) {
        return Classification {
            category: ErrorCategory::Network,
            severity: ErrorSeverity::High,
            retryable: true,
            max_retries: 5,
        };
    }

    if contains_any(
        &message,
        &["revert", "execution reverted", "transaction failed", "contract"],
    ) {
        // Ownership and authorization reverts never succeed on retry
        if contains_any(
            &message,
            &["not owner", "not authorized", "permission denied"],
        ) {
            return Classification {
                category: ErrorCategory::Contract,
                severity: ErrorSeverity::Critical,
                retryable: false,
                max_retries: 0,
            };
        }
        if contains_any(&message, &["execution reverted", "transaction failed"]) {
            return Classification {
                category: ErrorCategory::Contract,
                severity: ErrorSeverity::High,
                retryable: true,
                max_retries: 3,
            };
        }
        return Classification {
            category: ErrorCategory::Contract,
            severity: ErrorSeverity::Medium,
            retryable: true,
            max_retries: 3,
        };
    }

    if contains_any(&message, &["rate limit", "too many requests", "429"]) {
        return Classification {
            category: ErrorCategory::RateLimit,
            severity: ErrorSeverity::Medium,
            retryable: true,
            max_retries: 3,
        };
    }

    if contains_any(&message, &["timeout", "timed out", "deadline"]) {
        return Classification {
            category: ErrorCategory::Timeout,
            severity: ErrorSeverity::Medium,
            retryable: true,
            max_retries: 3,
        };
    }

    if contains_any(&message, &["invalid", "validation", "malformed", "bad request"]) {
        return Classification {
            category: ErrorCategory::Validation,
            severity: ErrorSeverity::Medium,
            retryable: false,
            max_retries: 0,
        };
    }

    if contains_any(&message, &["permission", "forbidden", "access denied"]) {
        return Classification {
            category: ErrorCategory::Permission,
            severity: ErrorSeverity::High,
            retryable: false,
            max_retries: 0,
        };
    }

    if contains_any(&message, &["unauthorized", "authentication", "api key"]) {
        return Classification {
            category: ErrorCategory::Authentication,
            severity: ErrorSeverity::High,
            retryable: false,
            max_retries: 0,
        };
    }

    if contains_any(
        &message,
        &["insufficient funds", "out of memory", "resource", "quota"],
    ) {
        return Classification {
            category: ErrorCategory::Resource,
            severity: ErrorSeverity::Medium,
            retryable: true,
            max_retries: 2,
        };
    }

    Classification {
        category: ErrorCategory::Unknown,
        severity: ErrorSeverity::Medium,
        retryable: false,
        max_retries: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_errors_are_retryable() {
        let c = classify("connection refused by peer");
        assert_eq!(c.category, ErrorCategory::Network);
        assert_eq!(c.severity, ErrorSeverity::High);
        assert!(c.retryable);
        assert_eq!(c.max_retries, 5);
    }

    #[test]
    fn test_ownership_reverts_are_critical_and_final() {
        let c = classify("execution reverted: Not owner");
        assert_eq!(c.category, ErrorCategory::Contract);
        assert_eq!(c.severity, ErrorSeverity::Critical);
        assert!(!c.retryable);
        assert_eq!(c.max_retries, 0);
    }

    #[test]
    fn test_plain_reverts_are_retryable() {
        let c = classify("execution reverted: slippage");
        assert_eq!(c.category, ErrorCategory::Contract);
        assert_eq!(c.severity, ErrorSeverity::High);
        assert!(c.retryable);

        let c = classify("contract call mismatch");
        assert_eq!(c.category, ErrorCategory::Contract);
        assert_eq!(c.severity, ErrorSeverity::Medium);
        assert!(c.retryable);
    }

    #[test]
    fn test_rate_limit_and_timeout() {
        let c = classify("429 Too Many Requests");
        assert_eq!(c.category, ErrorCategory::RateLimit);
        assert!(c.retryable);

        let c = classify("request timed out after 30s");
        assert_eq!(c.category, ErrorCategory::Timeout);
        assert!(c.retryable);
        assert_eq!(c.max_retries, 3);
    }

    #[test]
    fn test_validation_and_auth_never_retry() {
        for message in [
            "invalid address checksum",
            "access denied for caller",
            "unauthorized: missing api key",
        ] {
            let c = classify(message);
            assert!(!c.retryable, "{} should not be retryable", message);
            assert_eq!(c.max_retries, 0);
        }
    }

    #[test]
    fn test_resource_errors_get_two_retries() {
        let c = classify("insufficient funds for gas");
        assert_eq!(c.category, ErrorCategory::Resource);
        assert!(c.retryable);
        assert_eq!(c.max_retries, 2);
    }

    #[test]
    fn test_unknown_is_conservative() {
        let c = classify("something odd happened");
        assert_eq!(c.category, ErrorCategory::Unknown);
        assert_eq!(c.severity, ErrorSeverity::Medium);
        assert!(!c.retryable);
    }

    #[test]
    fn test_priority_order_network_beats_timeout() {
        // A message matching both network and timeout rules classifies as network
        let c = classify("network timeout while dialing");
        assert_eq!(c.category, ErrorCategory::Network);
    }

    #[test]
    fn test_classification_is_pure() {
        let first = classify("rate limit exceeded");
        let second = classify("rate limit exceeded");
        assert_eq!(first, second);
    }
}

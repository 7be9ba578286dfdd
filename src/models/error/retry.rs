use std::fmt::Display;
use thiserror::Error;

/// Outcome of a guarded execution. The two variants are deliberately
/// distinguishable by pattern matching: callers short-circuited by an open
/// breaker never see the underlying operation error, and an exhausted retry
/// loop always surfaces the original (unwrapped) last error.
#[derive(Debug, Error)]
pub enum RetryError<E: Display> {
    #[error("circuit breaker open for service '{service}', retry in {retry_after_ms}ms")]
    BreakerOpen { service: String, retry_after_ms: i64 },

    #[error("{0}")]
    Exhausted(E),
}

impl<E: Display> RetryError<E> {
    /// Returns the original operation error, if any.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Exhausted(e) => Some(e),
            RetryError::BreakerOpen { .. } => None,
        }
    }

    pub fn is_breaker_open(&self) -> bool {
        matches!(self, RetryError::BreakerOpen { .. })
    }
}

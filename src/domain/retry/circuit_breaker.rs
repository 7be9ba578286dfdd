//! Circuit breaker state machine.
//!
//! Transitions are expressed as a pure `next(state, event) -> state`
//! function over [`CircuitBreakerState`], keeping the machine testable
//! without clocks or locks. The orchestrator owns the per-service map.
//!
//! Closed --(failures >= threshold)--> Open
//! Open   --(now >= next_attempt)---> HalfOpen (on check)
//! HalfOpen --(trial success)-------> Closed
//! HalfOpen --(trial failure)-------> Open, fresh recovery window

use crate::config::CircuitBreakerConfig;
use crate::models::{CircuitBreakerState, CircuitState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerEvent {
    /// The guarded operation succeeded.
    Success,
    /// The guarded operation failed at the given UNIX-millisecond instant.
    Failure { at_ms: i64 },
}

/// Verdict for an incoming call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakerDecision {
    /// Proceed normally.
    Allow,
    /// Breaker is open; fail fast without invoking the operation.
    Reject { retry_after_ms: i64 },
}

/// Applies one event to a breaker state.
pub fn next(
    state: &CircuitBreakerState,
    event: BreakerEvent,
    config: &CircuitBreakerConfig,
) -> CircuitBreakerState {
    match (state.state, event) {
        (_, BreakerEvent::Success) => CircuitBreakerState::default(),

        (CircuitState::Closed, BreakerEvent::Failure { at_ms }) => {
            let failure_count = state.failure_count + 1;
            if failure_count >= config.failure_threshold {
                CircuitBreakerState {
                    failure_count,
                    last_failure_at: Some(at_ms),
                    state: CircuitState::Open,
                    next_attempt_at: Some(at_ms + config.recovery_timeout_ms),
                }
            } else {
                CircuitBreakerState {
                    failure_count,
                    last_failure_at: Some(at_ms),
                    state: CircuitState::Closed,
                    next_attempt_at: None,
                }
            }
        }

        // A single half-open trial failure forces the breaker back open with
        // a fresh recovery window.
        (CircuitState::HalfOpen, BreakerEvent::Failure { at_ms })
        | (CircuitState::Open, BreakerEvent::Failure { at_ms }) => CircuitBreakerState {
            failure_count: state.failure_count + 1,
            last_failure_at: Some(at_ms),
            state: CircuitState::Open,
            next_attempt_at: Some(at_ms + config.recovery_timeout_ms),
        },
    }
}

/// Decides whether a call may proceed at `now_ms`, moving an elapsed Open
/// breaker into HalfOpen. Returns the possibly-updated state alongside the
/// decision.
pub fn check(
    state: &CircuitBreakerState,
    now_ms: i64,
) -> (CircuitBreakerState, BreakerDecision) {
    match state.state {
        CircuitState::Closed | CircuitState::HalfOpen => (state.clone(), BreakerDecision::Allow),
        CircuitState::Open => {
            let next_attempt_at = state.next_attempt_at.unwrap_or(now_ms);
            if now_ms >= next_attempt_at {
                let mut probing = state.clone();
                probing.state = CircuitState::HalfOpen;
                (probing, BreakerDecision::Allow)
            } else {
                (
                    state.clone(),
                    BreakerDecision::Reject {
                        retry_after_ms: next_attempt_at - now_ms,
                    },
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            recovery_timeout_ms: 1000,
        }
    }

    #[test]
    fn test_opens_at_threshold() {
        let config = config();
        let mut state = CircuitBreakerState::default();

        for at_ms in [10, 20] {
            state = next(&state, BreakerEvent::Failure { at_ms }, &config);
            assert_eq!(state.state, CircuitState::Closed);
        }

        state = next(&state, BreakerEvent::Failure { at_ms: 30 }, &config);
        assert_eq!(state.state, CircuitState::Open);
        assert_eq!(state.failure_count, 3);
        assert_eq!(state.next_attempt_at, Some(1030));
    }

    #[test]
    fn test_success_resets_from_any_state() {
        let config = config();
        let mut state = CircuitBreakerState::default();
        for at_ms in [1, 2, 3] {
            state = next(&state, BreakerEvent::Failure { at_ms }, &config);
        }
        assert_eq!(state.state, CircuitState::Open);

        let reset = next(&state, BreakerEvent::Success, &config);
        assert_eq!(reset, CircuitBreakerState::default());
    }

    #[test]
    fn test_open_rejects_until_window_elapses() {
        let config = config();
        let mut state = CircuitBreakerState::default();
        for at_ms in [1, 2, 3] {
            state = next(&state, BreakerEvent::Failure { at_ms }, &config);
        }

        let (unchanged, decision) = check(&state, 500);
        assert_eq!(unchanged.state, CircuitState::Open);
        assert_eq!(decision, BreakerDecision::Reject { retry_after_ms: 503 });

        let (probing, decision) = check(&state, 1003);
        assert_eq!(probing.state, CircuitState::HalfOpen);
        assert_eq!(decision, BreakerDecision::Allow);
    }

    #[test]
    fn test_half_open_failure_reopens_with_fresh_window() {
        let config = config();
        let mut state = CircuitBreakerState::default();
        for at_ms in [1, 2, 3] {
            state = next(&state, BreakerEvent::Failure { at_ms }, &config);
        }
        let (half_open, _) = check(&state, 2000);
        assert_eq!(half_open.state, CircuitState::HalfOpen);

        let reopened = next(&half_open, BreakerEvent::Failure { at_ms: 2000 }, &config);
        assert_eq!(reopened.state, CircuitState::Open);
        assert_eq!(reopened.next_attempt_at, Some(3000));
    }

    #[test]
    fn test_half_open_success_closes() {
        let config = config();
        let half_open = CircuitBreakerState {
            failure_count: 3,
            last_failure_at: Some(3),
            state: CircuitState::HalfOpen,
            next_attempt_at: Some(1003),
        };

        let closed = next(&half_open, BreakerEvent::Success, &config);
        assert_eq!(closed.state, CircuitState::Closed);
        assert_eq!(closed.failure_count, 0);
    }
}

//! Retry orchestration for chain and service calls.
//!
//! Wraps fallible async operations with classification-aware bounded retries,
//! exponential backoff with jitter, and a per-service circuit breaker.
//! Every failure is classified and persisted as a [`ContractError`] record.

mod classifier;
pub use classifier::*;

mod circuit_breaker;
pub use circuit_breaker::*;

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;

use crate::config::{CircuitBreakerConfig, RetryStrategy};
use crate::constants::{
    ALERT_KEY_PREFIX, ALERT_TTL_SECS, CONTRACT_ERROR_KEY_PREFIX, ERROR_RECORD_TTL_SECS,
    ERROR_STATS_KEY, RETRY_JITTER_MAX, RETRY_JITTER_MIN,
};
use crate::models::{
    CircuitBreakerState, ContractError, ErrorContext, RepositoryError, RetryError,
};
use crate::repositories::CacheStore;
use crate::utils::now_millis;

pub struct RetryOrchestrator<C: CacheStore> {
    cache: Arc<C>,
    strategy: RetryStrategy,
    breaker_config: CircuitBreakerConfig,
    // Guarded map, only ever locked around read-modify-write (never across await)
    breakers: Mutex<HashMap<String, CircuitBreakerState>>,
}

impl<C: CacheStore> RetryOrchestrator<C> {
    pub fn new(
        cache: Arc<C>,
        strategy: RetryStrategy,
        breaker_config: CircuitBreakerConfig,
    ) -> Self {
        Self {
            cache,
            strategy,
            breaker_config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Classifies and persists one failure, returning the stored record.
    /// Aggregate counters are incremented and critical errors additionally
    /// leave an alert record.
    pub async fn handle_error(
        &self,
        error_type: &str,
        message: &str,
        context: &ErrorContext,
    ) -> Result<ContractError, RepositoryError> {
        let classification = classify(message);

        let mut details = context.details.clone();
        if let Some(service) = &context.service {
            details.insert("service".to_string(), service.clone());
        }
        if let Some(function_name) = &context.function_name {
            details.insert("function".to_string(), function_name.clone());
        }

        let record = ContractError::new(
            error_type,
            message,
            classification.category,
            classification.severity,
            classification.retryable,
            classification.max_retries,
            details,
        );

        let key = format!("{}:{}", CONTRACT_ERROR_KEY_PREFIX, record.id);
        let json = serde_json::to_string(&record)
            .map_err(|e| RepositoryError::InvalidData(format!("Failed to serialize error: {}", e)))?;
        self.cache.set_ex(&key, &json, ERROR_RECORD_TTL_SECS).await?;
        self.cache
            .hincr(ERROR_STATS_KEY, &record.category.to_string())
            .await?;

        if record.is_critical() {
            let alert_key = format!("{}:{}", ALERT_KEY_PREFIX, record.id);
            self.cache.set_ex(&alert_key, &json, ALERT_TTL_SECS).await?;
        }

        Ok(record)
    }

    /// Executes `operation` with the orchestrator's default strategy.
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        operation: F,
        context: &ErrorContext,
    ) -> Result<T, RetryError<E>>
    where
        E: Display,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let strategy = self.strategy.clone();
        self.execute_with_strategy(operation, context, &strategy)
            .await
    }

    /// Executes `operation` under a caller-provided strategy.
    ///
    /// An open breaker for the context's service key fails fast without
    /// invoking the operation. Otherwise the operation runs up to
    /// `max_retries + 1` times; each failure is classified and persisted,
    /// and retrying stops as soon as the failure is non-retryable or the
    /// smaller of the strategy's and the classification's retry budgets is
    /// spent.
    pub async fn execute_with_strategy<T, E, F, Fut>(
        &self,
        operation: F,
        context: &ErrorContext,
        strategy: &RetryStrategy,
    ) -> Result<T, RetryError<E>>
    where
        E: Display,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let service = context.service_key();

        if let BreakerDecision::Reject { retry_after_ms } = self.breaker_decision(&service) {
            debug!(
                "Breaker open for '{}', rejecting call for {}ms",
                service, retry_after_ms
            );
            return Err(RetryError::BreakerOpen {
                service,
                retry_after_ms,
            });
        }

        let mut attempt: u32 = 0;
        loop {
            match operation().await {
                Ok(value) => {
                    self.record_breaker_event(&service, BreakerEvent::Success);
                    return Ok(value);
                }
                Err(error) => {
                    let message = error.to_string();
                    let classification = classify(&message);
                    self.record_breaker_event(
                        &service,
                        BreakerEvent::Failure {
                            at_ms: now_millis(),
                        },
                    );

                    let attempt_context = context
                        .clone()
                        .with_detail("attempt", &attempt.to_string());
                    if let Err(e) = self
                        .handle_error(
                            &classification.category.to_string(),
                            &message,
                            &attempt_context,
                        )
                        .await
                    {
                        warn!("Failed to persist error record: {}", e);
                    }

                    let allowed = strategy.max_retries.min(classification.max_retries);
                    if !classification.retryable || attempt >= allowed {
                        debug!(
                            "Giving up on '{}' after {} attempt(s): {}",
                            service,
                            attempt + 1,
                            message
                        );
                        return Err(RetryError::Exhausted(error));
                    }

                    let delay = self.backoff_delay(attempt, strategy);
                    debug!(
                        "Attempt {} for '{}' failed ({}), retrying in {:?}",
                        attempt + 1,
                        service,
                        message,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Single-attempt variant: checks the breaker, invokes once, records the
    /// outcome.
    pub async fn execute_with_circuit_breaker<T, E, F, Fut>(
        &self,
        operation: F,
        service_key: &str,
        context: &ErrorContext,
    ) -> Result<T, RetryError<E>>
    where
        E: Display,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let BreakerDecision::Reject { retry_after_ms } = self.breaker_decision(service_key) {
            return Err(RetryError::BreakerOpen {
                service: service_key.to_string(),
                retry_after_ms,
            });
        }

        match operation().await {
            Ok(value) => {
                self.record_breaker_event(service_key, BreakerEvent::Success);
                Ok(value)
            }
            Err(error) => {
                let message = error.to_string();
                self.record_breaker_event(
                    service_key,
                    BreakerEvent::Failure {
                        at_ms: now_millis(),
                    },
                );
                let classification = classify(&message);
                if let Err(e) = self
                    .handle_error(&classification.category.to_string(), &message, context)
                    .await
                {
                    warn!("Failed to persist error record: {}", e);
                }
                Err(RetryError::Exhausted(error))
            }
        }
    }

    pub fn get_circuit_breaker_status(&self, service: &str) -> CircuitBreakerState {
        let breakers = self.breakers.lock().unwrap();
        breakers.get(service).cloned().unwrap_or_default()
    }

    pub fn reset_circuit_breaker(&self, service: &str) {
        let mut breakers = self.breakers.lock().unwrap();
        breakers.remove(service);
    }

    /// Aggregate error counts per category.
    pub async fn get_error_stats(&self) -> Result<HashMap<String, i64>, RepositoryError> {
        self.cache.hgetall(ERROR_STATS_KEY).await
    }

    fn breaker_decision(&self, service: &str) -> BreakerDecision {
        let mut breakers = self.breakers.lock().unwrap();
        let state = breakers.entry(service.to_string()).or_default();
        let (updated, decision) = circuit_breaker::check(state, now_millis());
        *state = updated;
        decision
    }

    fn record_breaker_event(&self, service: &str, event: BreakerEvent) {
        let mut breakers = self.breakers.lock().unwrap();
        let state = breakers.entry(service.to_string()).or_default();
        *state = circuit_breaker::next(state, event, &self.breaker_config);
    }

    fn backoff_delay(&self, attempt: u32, strategy: &RetryStrategy) -> Duration {
        let exponential =
            strategy.base_delay_ms as f64 * strategy.multiplier.powi(attempt as i32);
        let capped = exponential.min(strategy.max_delay_ms as f64);
        let delay_ms = if strategy.jitter {
            let factor = rand::rng().random_range(RETRY_JITTER_MIN..=RETRY_JITTER_MAX);
            capped * factor
        } else {
            capped
        };
        Duration::from_millis(delay_ms as u64)
    }
}

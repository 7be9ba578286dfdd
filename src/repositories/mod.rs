//! Cache-backed persistence for tracking records, error records and state
//! snapshots. Two implementations exist: a Redis-backed store for production
//! and an in-memory twin for tests.

mod redis_base;
pub use redis_base::*;

mod cache_redis;
pub use cache_redis::*;

mod cache_in_memory;
pub use cache_in_memory::*;

use crate::models::RepositoryError;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// Thin abstraction over the cache commands the services need. Values are
/// JSON strings; callers own serialization.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError>;

    /// Stores `value` under `key` with a TTL in seconds.
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), RepositoryError>;

    async fn del(&self, key: &str) -> Result<(), RepositoryError>;

    /// Returns keys matching a trailing-wildcard pattern such as `tx_status:*`.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, RepositoryError>;

    async fn exists(&self, key: &str) -> Result<bool, RepositoryError>;

    /// Appends a value to the tail of the list at `key`.
    async fn rpush(&self, key: &str, value: &str) -> Result<(), RepositoryError>;

    /// Pops up to `count` values from the head of the list at `key`.
    async fn lpop(&self, key: &str, count: usize) -> Result<Vec<String>, RepositoryError>;

    async fn lrange(&self, key: &str, start: isize, stop: isize)
        -> Result<Vec<String>, RepositoryError>;

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), RepositoryError>;

    /// Increments `field` of the hash at `key` by one, returning the new value.
    async fn hincr(&self, key: &str, field: &str) -> Result<i64, RepositoryError>;

    /// Returns all field/value pairs of the hash at `key`.
    async fn hgetall(
        &self,
        key: &str,
    ) -> Result<std::collections::HashMap<String, i64>, RepositoryError>;
}

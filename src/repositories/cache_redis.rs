//! Redis-backed cache store built on a shared connection manager.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::models::RepositoryError;
use crate::repositories::{CacheStore, RedisRepository};

#[derive(Clone)]
pub struct RedisCacheStore {
    client: Arc<ConnectionManager>,
}

impl RedisCacheStore {
    pub fn new(connection_manager: Arc<ConnectionManager>) -> Self {
        Self {
            client: connection_manager,
        }
    }

    fn conn(&self) -> ConnectionManager {
        // ConnectionManager is a cheap handle over a multiplexed connection
        self.client.as_ref().clone()
    }
}

impl RedisRepository for RedisCacheStore {}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        let mut conn = self.conn();
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| self.map_redis_error(e, "cache_get"))?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), RepositoryError> {
        let mut conn = self.conn();
        let _: () = conn
            .set_ex(key, value, ttl_secs)
            .await
            .map_err(|e| self.map_redis_error(e, "cache_set_ex"))?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), RepositoryError> {
        let mut conn = self.conn();
        let _: () = conn
            .del(key)
            .await
            .map_err(|e| self.map_redis_error(e, "cache_del"))?;
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, RepositoryError> {
        let mut conn = self.conn();
        let keys: Vec<String> = conn
            .keys(pattern)
            .await
            .map_err(|e| self.map_redis_error(e, "cache_keys"))?;
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool, RepositoryError> {
        let mut conn = self.conn();
        let exists: bool = conn
            .exists(key)
            .await
            .map_err(|e| self.map_redis_error(e, "cache_exists"))?;
        Ok(exists)
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        let mut conn = self.conn();
        let _: () = conn
            .rpush(key, value)
            .await
            .map_err(|e| self.map_redis_error(e, "cache_rpush"))?;
        Ok(())
    }

    async fn lpop(&self, key: &str, count: usize) -> Result<Vec<String>, RepositoryError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn();
        let values: Vec<String> = conn
            .lpop(key, NonZeroUsize::new(count))
            .await
            .map_err(|e| self.map_redis_error(e, "cache_lpop"))?;
        Ok(values)
    }

    async fn lrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, RepositoryError> {
        let mut conn = self.conn();
        let values: Vec<String> = conn
            .lrange(key, start, stop)
            .await
            .map_err(|e| self.map_redis_error(e, "cache_lrange"))?;
        Ok(values)
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), RepositoryError> {
        let mut conn = self.conn();
        let _: () = conn
            .ltrim(key, start, stop)
            .await
            .map_err(|e| self.map_redis_error(e, "cache_ltrim"))?;
        Ok(())
    }

    async fn hincr(&self, key: &str, field: &str) -> Result<i64, RepositoryError> {
        let mut conn = self.conn();
        let value: i64 = conn
            .hincr(key, field, 1)
            .await
            .map_err(|e| self.map_redis_error(e, "cache_hincr"))?;
        Ok(value)
    }

    async fn hgetall(
        &self,
        key: &str,
    ) -> Result<std::collections::HashMap<String, i64>, RepositoryError> {
        let mut conn = self.conn();
        let values: std::collections::HashMap<String, i64> = conn
            .hgetall(key)
            .await
            .map_err(|e| self.map_redis_error(e, "cache_hgetall"))?;
        Ok(values)
    }
}

impl std::fmt::Debug for RedisCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheStore").finish()
    }
}

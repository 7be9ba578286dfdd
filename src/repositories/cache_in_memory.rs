//! In-memory cache store used by tests and local development. Mirrors the
//! Redis-backed store's semantics, including TTL expiry on read and
//! trailing-wildcard key matching.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::RepositoryError;
use crate::repositories::CacheStore;

#[derive(Debug)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    values: RwLock<HashMap<String, StoredValue>>,
    lists: RwLock<HashMap<String, Vec<String>>>,
    hashes: RwLock<HashMap<String, HashMap<String, i64>>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(pattern: &str, key: &str) -> bool {
        match pattern.strip_suffix('*') {
            Some(prefix) => key.starts_with(prefix),
            None => key == pattern,
        }
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        {
            let values = self.values.read().await;
            match values.get(key) {
                Some(stored) if !stored.is_expired() => return Ok(Some(stored.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Lazily drop the expired entry
        self.values.write().await.remove(key);
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), RepositoryError> {
        let mut values = self.values.write().await;
        values.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), RepositoryError> {
        self.values.write().await.remove(key);
        self.lists.write().await.remove(key);
        self.hashes.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, RepositoryError> {
        let values = self.values.read().await;
        let lists = self.lists.read().await;
        let mut keys: Vec<String> = values
            .iter()
            .filter(|(key, stored)| Self::matches(pattern, key) && !stored.is_expired())
            .map(|(key, _)| key.clone())
            .collect();
        keys.extend(
            lists
                .keys()
                .filter(|key| Self::matches(pattern, key))
                .cloned(),
        );
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool, RepositoryError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        let mut lists = self.lists.write().await;
        lists
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
        Ok(())
    }

    async fn lpop(&self, key: &str, count: usize) -> Result<Vec<String>, RepositoryError> {
        let mut lists = self.lists.write().await;
        let Some(list) = lists.get_mut(key) else {
            return Ok(Vec::new());
        };
        let take = count.min(list.len());
        let popped: Vec<String> = list.drain(..take).collect();
        if list.is_empty() {
            lists.remove(key);
        }
        Ok(popped)
    }

    async fn lrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, RepositoryError> {
        let lists = self.lists.read().await;
        let Some(list) = lists.get(key) else {
            return Ok(Vec::new());
        };
        let len = list.len() as isize;
        let normalize = |index: isize| -> isize {
            if index < 0 {
                (len + index).max(0)
            } else {
                index
            }
        };
        let start = normalize(start);
        let stop = normalize(stop).min(len - 1);
        if start > stop || start >= len {
            return Ok(Vec::new());
        }
        Ok(list[start as usize..=stop as usize].to_vec())
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), RepositoryError> {
        let kept = self.lrange(key, start, stop).await?;
        let mut lists = self.lists.write().await;
        if kept.is_empty() {
            lists.remove(key);
        } else {
            lists.insert(key.to_string(), kept);
        }
        Ok(())
    }

    async fn hincr(&self, key: &str, field: &str) -> Result<i64, RepositoryError> {
        let mut hashes = self.hashes.write().await;
        let counter = hashes
            .entry(key.to_string())
            .or_default()
            .entry(field.to_string())
            .or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, i64>, RepositoryError> {
        let hashes = self.hashes.read().await;
        Ok(hashes.get(key).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_del() {
        let store = InMemoryCacheStore::new();
        store.set_ex("k1", "v1", 60).await.unwrap();
        assert_eq!(store.get("k1").await.unwrap(), Some("v1".to_string()));
        assert!(store.exists("k1").await.unwrap());

        store.del("k1").await.unwrap();
        assert_eq!(store.get("k1").await.unwrap(), None);
        assert!(!store.exists("k1").await.unwrap());
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let store = InMemoryCacheStore::new();
        store.set_ex("short", "v", 0).await.unwrap();
        assert_eq!(store.get("short").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_keys_trailing_wildcard() {
        let store = InMemoryCacheStore::new();
        store.set_ex("tx_status:0xaa", "1", 60).await.unwrap();
        store.set_ex("tx_status:0xbb", "2", 60).await.unwrap();
        store.set_ex("tx_batch:b1", "3", 60).await.unwrap();

        let mut keys = store.keys("tx_status:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["tx_status:0xaa", "tx_status:0xbb"]);

        let keys = store.keys("tx_batch:b1").await.unwrap();
        assert_eq!(keys, vec!["tx_batch:b1"]);
    }

    #[tokio::test]
    async fn test_list_push_pop_order() {
        let store = InMemoryCacheStore::new();
        store.rpush("q", "a").await.unwrap();
        store.rpush("q", "b").await.unwrap();
        store.rpush("q", "c").await.unwrap();

        let popped = store.lpop("q", 2).await.unwrap();
        assert_eq!(popped, vec!["a", "b"]);

        let rest = store.lpop("q", 10).await.unwrap();
        assert_eq!(rest, vec!["c"]);

        assert!(store.lpop("q", 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lrange_and_ltrim() {
        let store = InMemoryCacheStore::new();
        for value in ["a", "b", "c", "d"] {
            store.rpush("history", value).await.unwrap();
        }

        let all = store.lrange("history", 0, -1).await.unwrap();
        assert_eq!(all, vec!["a", "b", "c", "d"]);

        store.ltrim("history", -2, -1).await.unwrap();
        let kept = store.lrange("history", 0, -1).await.unwrap();
        assert_eq!(kept, vec!["c", "d"]);
    }

    #[tokio::test]
    async fn test_hincr_counts() {
        let store = InMemoryCacheStore::new();
        assert_eq!(store.hincr("stats", "network").await.unwrap(), 1);
        assert_eq!(store.hincr("stats", "network").await.unwrap(), 2);
        assert_eq!(store.hincr("stats", "timeout").await.unwrap(), 1);

        let all = store.hgetall("stats").await.unwrap();
        assert_eq!(all.get("network"), Some(&2));
        assert_eq!(all.get("timeout"), Some(&1));
        assert!(store.hgetall("missing").await.unwrap().is_empty());
    }
}

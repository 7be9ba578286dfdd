//! Transaction lifecycle tracking.
//!
//! Registered hashes are enqueued on per-priority queues and polled until a
//! terminal outcome: confirmed, failed, or timed out. Confirmed receipts are
//! enriched with decoded contract events which are archived per user and
//! forwarded to the event monitor. Batches aggregate the outcomes of their
//! member hashes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::config::TrackerConfig;
use crate::constants::{
    EVENT_HISTORY_KEY_PREFIX, EVENT_HISTORY_MAX_ENTRIES, TX_BATCH_KEY_PREFIX, TX_BATCH_TTL_SECS,
    TX_RECORD_TTL_SECS, TX_STATUS_KEY_PREFIX, TX_TRACKING_QUEUE_KEY_PREFIX,
};
use crate::models::{
    BatchStatus, ExternalEventEnvelope, TrackerError, TransactionBatch, TransactionCategory,
    TransactionPriority, TransactionRecord, TransactionStats, TransactionStatus,
};
use crate::repositories::CacheStore;
use crate::services::{
    ChainProviderTrait, EventMonitorTrait, NotificationServiceTrait, TransactionReceiptData,
};
use crate::utils::{millis_since, now_rfc3339};

pub struct TransactionTracker<P, C, N, M> {
    provider: Arc<P>,
    cache: Arc<C>,
    notifier: Option<Arc<N>>,
    event_monitor: Option<Arc<M>>,
    config: TrackerConfig,
    running: Arc<AtomicBool>,
}

impl<P, C, N, M> Clone for TransactionTracker<P, C, N, M> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            cache: self.cache.clone(),
            notifier: self.notifier.clone(),
            event_monitor: self.event_monitor.clone(),
            config: self.config.clone(),
            running: self.running.clone(),
        }
    }
}

fn status_key(hash: &str) -> String {
    format!("{}:{}", TX_STATUS_KEY_PREFIX, hash.to_lowercase())
}

fn batch_key(id: &str) -> String {
    format!("{}:{}", TX_BATCH_KEY_PREFIX, id)
}

fn queue_key(priority: TransactionPriority) -> String {
    format!("{}:{}", TX_TRACKING_QUEUE_KEY_PREFIX, priority)
}

impl<P, C, N, M> TransactionTracker<P, C, N, M>
where
    P: ChainProviderTrait + 'static,
    C: CacheStore + 'static,
    N: NotificationServiceTrait + 'static,
    M: EventMonitorTrait + 'static,
{
    pub fn new(
        provider: Arc<P>,
        cache: Arc<C>,
        notifier: Option<Arc<N>>,
        event_monitor: Option<Arc<M>>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            notifier,
            event_monitor,
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Registers a hash for tracking. Idempotent: a hash with an existing
    /// record (terminal or not) is left untouched.
    pub async fn track_transaction(
        &self,
        hash: &str,
        user_address: Option<&str>,
        category: TransactionCategory,
        priority: TransactionPriority,
        metadata: Option<serde_json::Value>,
    ) -> Result<(), TrackerError> {
        self.track_internal(hash, user_address, category, priority, metadata, None)
            .await
    }

    /// Tracks a group of hashes under a fresh batch id and persists the
    /// batch aggregate. Returns the batch id.
    pub async fn track_transaction_batch(
        &self,
        hashes: &[String],
        user_address: Option<&str>,
        category: TransactionCategory,
        priority: TransactionPriority,
    ) -> Result<String, TrackerError> {
        let batch_id = Uuid::new_v4().to_string();
        let normalized: Vec<String> = hashes.iter().map(|h| h.to_lowercase()).collect();

        for hash in &normalized {
            self.track_internal(hash, user_address, category, priority, None, Some(&batch_id))
                .await?;
        }

        let batch = TransactionBatch::new(&batch_id, normalized);
        self.save_batch(&batch).await?;
        info!(
            "Tracking batch {} with {} transaction(s)",
            batch_id,
            batch.transaction_hashes.len()
        );
        Ok(batch_id)
    }

    async fn track_internal(
        &self,
        hash: &str,
        user_address: Option<&str>,
        category: TransactionCategory,
        priority: TransactionPriority,
        metadata: Option<serde_json::Value>,
        batch_id: Option<&str>,
    ) -> Result<(), TrackerError> {
        let hash = hash.to_lowercase();
        if self.cache.exists(&status_key(&hash)).await? {
            debug!("Transaction {} already tracked, skipping", hash);
            return Ok(());
        }

        let mut record = TransactionRecord::new(
            &hash,
            user_address,
            category,
            priority,
            self.config.max_retries,
            metadata,
        );
        record.batch_id = batch_id.map(|id| id.to_string());

        // Best-effort mempool enrichment
        match self.provider.get_transaction(&hash).await {
            Ok(Some(tx)) => {
                record.from = Some(tx.from.to_lowercase());
                record.to = tx.to.map(|to| to.to_lowercase());
                record.value = Some(tx.value);
                record.nonce = Some(tx.nonce);
                record.gas_limit = Some(tx.gas_limit);
                record.input = Some(tx.input);
                record.method = tx.method;
            }
            Ok(None) => debug!("Transaction {} not yet visible in mempool", hash),
            Err(e) => warn!("Mempool lookup failed for {}: {}", hash, e),
        }

        self.save_record(&record).await?;
        self.cache.rpush(&queue_key(priority), &hash).await?;
        info!("Tracking transaction {} at priority {}", hash, priority);

        self.notify(
            record.user_address.as_deref(),
            "Transaction Submitted",
            &format!("Your {} transaction is being processed", record.category),
        )
        .await;

        Ok(())
    }

    pub async fn get_transaction_status(
        &self,
        hash: &str,
    ) -> Result<Option<TransactionRecord>, TrackerError> {
        self.load_record(hash).await
    }

    pub async fn get_batch_status(
        &self,
        batch_id: &str,
    ) -> Result<Option<TransactionBatch>, TrackerError> {
        let Some(json) = self.cache.get(&batch_key(batch_id)).await? else {
            return Ok(None);
        };
        let batch = serde_json::from_str(&json)
            .map_err(|e| TrackerError::InvalidData(format!("Batch {}: {}", batch_id, e)))?;
        Ok(Some(batch))
    }

    /// Returns a user's records, newest first, optionally filtered by status
    /// and category. Scan-and-filter over the status namespace.
    pub async fn get_user_transactions(
        &self,
        user_address: &str,
        status: Option<TransactionStatus>,
        category: Option<TransactionCategory>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TransactionRecord>, TrackerError> {
        let user = user_address.to_lowercase();
        let mut records = self.scan_records().await?;

        records.retain(|record| {
            record.user_address.as_deref() == Some(user.as_str())
                && status.map(|s| record.status == s).unwrap_or(true)
                && category.map(|c| record.category == c).unwrap_or(true)
        });
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(records.into_iter().skip(offset).take(limit).collect())
    }

    /// Aggregates counts by status, category and priority, plus activity in
    /// the last 24 hours. Scoped to one user when given.
    pub async fn get_transaction_stats(
        &self,
        user_address: Option<&str>,
    ) -> Result<TransactionStats, TrackerError> {
        let user = user_address.map(|u| u.to_lowercase());
        let records = self.scan_records().await?;

        let mut stats = TransactionStats::default();
        for record in records {
            if let Some(user) = &user {
                if record.user_address.as_deref() != Some(user.as_str()) {
                    continue;
                }
            }
            stats.total += 1;
            *stats
                .by_status
                .entry(record.status.to_string())
                .or_default() += 1;
            *stats
                .by_category
                .entry(record.category.to_string())
                .or_default() += 1;
            *stats
                .by_priority
                .entry(record.priority.to_string())
                .or_default() += 1;
            if millis_since(&record.created_at)
                .map(|elapsed| elapsed < 24 * 60 * 60 * 1000)
                .unwrap_or(false)
            {
                stats.recent_24h += 1;
            }
        }
        Ok(stats)
    }

    /// One polling pass: drains up to `batch_size` hashes from each priority
    /// queue, highest first, and settles the chunk concurrently. Individual
    /// failures are logged and absorbed.
    pub async fn process_tracking_queues(&self) -> Result<(), TrackerError> {
        for priority in TransactionPriority::ALL {
            let hashes = self
                .cache
                .lpop(&queue_key(priority), self.config.batch_size)
                .await?;
            if hashes.is_empty() {
                continue;
            }
            debug!(
                "Polling {} transaction(s) from the {} queue",
                hashes.len(),
                priority
            );

            let results = join_all(
                hashes
                    .iter()
                    .map(|hash| self.process_tracked_transaction(hash)),
            )
            .await;

            for (hash, result) in hashes.iter().zip(results) {
                if let Err(e) = result {
                    warn!("Polling {} failed: {}", hash, e);
                }
            }
        }
        Ok(())
    }

    async fn process_tracked_transaction(&self, hash: &str) -> Result<(), TrackerError> {
        let Some(mut record) = self.load_record(hash).await? else {
            return Ok(());
        };
        if record.status.is_terminal() {
            return Ok(());
        }

        // Wall-clock timeout takes precedence over the receipt lookup
        let age_ms = millis_since(&record.created_at).unwrap_or(0);
        if age_ms > self.config.timeout_ms {
            record.status = TransactionStatus::Timeout;
            record.error = Some(format!("Transaction timed out after {}ms", age_ms));
            self.finalize(&mut record).await?;
            return Ok(());
        }

        match self.provider.get_transaction_receipt(hash).await {
            Ok(Some(receipt)) if receipt.status => {
                self.confirm(&mut record, receipt).await?;
            }
            Ok(Some(receipt)) => {
                record.block_number = receipt.block_number;
                record.gas_used = Some(receipt.gas_used);
                record.status = TransactionStatus::Failed;
                record.error = Some("Transaction reverted on-chain".to_string());
                self.finalize(&mut record).await?;
            }
            Ok(None) => {
                record.retry_count += 1;
                if record.retry_count > record.max_retries {
                    record.status = TransactionStatus::Timeout;
                    record.error = Some(format!(
                        "Receipt not found after {} attempts",
                        record.retry_count
                    ));
                    self.finalize(&mut record).await?;
                } else {
                    self.save_record(&record).await?;
                    self.cache.rpush(&queue_key(record.priority), hash).await?;
                }
            }
            Err(e) => {
                warn!("Receipt fetch failed for {}: {}", hash, e);
                record.retry_count += 1;
                if record.retry_count > record.max_retries {
                    record.status = TransactionStatus::Failed;
                    record.error = Some(e.to_string());
                    self.finalize(&mut record).await?;
                } else {
                    self.save_record(&record).await?;
                    self.cache.rpush(&queue_key(record.priority), hash).await?;
                }
            }
        }
        Ok(())
    }

    async fn confirm(
        &self,
        record: &mut TransactionRecord,
        receipt: TransactionReceiptData,
    ) -> Result<(), TrackerError> {
        record.block_number = receipt.block_number;
        record.gas_used = Some(receipt.gas_used);
        record.effective_gas_price = receipt.effective_gas_price.clone();
        record.log_count = Some(receipt.logs.len());
        record.estimated_confirmation_time_ms = millis_since(&record.created_at);
        record.status = TransactionStatus::Confirmed;

        // confirmation_blocks is recorded in config but not gating: a
        // successful receipt confirms immediately
        match self.provider.get_block_number().await {
            Ok(current_block) => {
                record.confirmations = receipt
                    .block_number
                    .map(|mined| current_block.saturating_sub(mined));
            }
            Err(e) => warn!("Block number fetch failed: {}", e),
        }

        // Logs from other contracts or unknown topics decode to None and
        // are silently skipped
        record.decoded_events = receipt
            .logs
            .iter()
            .filter_map(|log| self.provider.decode_event_log(log))
            .collect();

        self.archive_events(record).await;
        self.forward_events(record).await;
        self.finalize(record).await
    }

    /// Persists a terminal transition, notifies the user and refreshes the
    /// parent batch counters.
    async fn finalize(&self, record: &mut TransactionRecord) -> Result<(), TrackerError> {
        self.save_record(record).await?;

        let (title, message) = match record.status {
            TransactionStatus::Confirmed => (
                "Transaction Confirmed",
                format!("Your {} transaction has been confirmed", record.category),
            ),
            TransactionStatus::Failed => (
                "Transaction Failed",
                format!(
                    "Your {} transaction failed: {}",
                    record.category,
                    record.error.as_deref().unwrap_or("unknown error")
                ),
            ),
            TransactionStatus::Timeout => (
                "Transaction Timeout",
                format!(
                    "Your {} transaction was not confirmed in time",
                    record.category
                ),
            ),
            _ => return self.update_batch_counters(record).await,
        };
        self.notify(record.user_address.as_deref(), title, &message)
            .await;

        self.update_batch_counters(record).await
    }

    async fn update_batch_counters(&self, record: &TransactionRecord) -> Result<(), TrackerError> {
        let Some(batch_id) = &record.batch_id else {
            return Ok(());
        };
        let Some(mut batch) = self.get_batch_status(batch_id).await? else {
            warn!("Batch {} missing for transaction {}", batch_id, record.hash);
            return Ok(());
        };

        if record.status == TransactionStatus::Confirmed {
            batch.success_count += 1;
        } else {
            batch.failure_count += 1;
        }

        // Seal only once every member has resolved
        if batch.is_resolved() {
            batch.status = if batch.failure_count == 0 {
                BatchStatus::Completed
            } else if batch.success_count == 0 {
                BatchStatus::Failed
            } else {
                BatchStatus::Partial
            };
            batch.completed_at = Some(now_rfc3339());
            info!("Batch {} sealed as {}", batch.id, batch.status);
        }

        self.save_batch(&batch).await
    }

    async fn archive_events(&self, record: &TransactionRecord) {
        let Some(user) = &record.user_address else {
            return;
        };
        let key = format!("{}:{}", EVENT_HISTORY_KEY_PREFIX, user);
        for event in &record.decoded_events {
            let Ok(json) = serde_json::to_string(event) else {
                continue;
            };
            if let Err(e) = self.cache.rpush(&key, &json).await {
                warn!("Event archive failed for {}: {}", user, e);
                return;
            }
        }
        if !record.decoded_events.is_empty() {
            let keep = EVENT_HISTORY_MAX_ENTRIES as isize;
            if let Err(e) = self.cache.ltrim(&key, -keep, -1).await {
                warn!("Event history trim failed for {}: {}", user, e);
            }
        }
    }

    async fn forward_events(&self, record: &TransactionRecord) {
        let Some(monitor) = &self.event_monitor else {
            return;
        };
        if !self.config.realtime_enabled {
            return;
        }
        for event in &record.decoded_events {
            let envelope = ExternalEventEnvelope {
                transaction_hash: record.hash.clone(),
                user_address: record.user_address.clone(),
                block_number: record.block_number,
                event: event.clone(),
                observed_at: now_rfc3339(),
            };
            // Fire-and-forget: delivery failures never affect tracking
            if let Err(e) = monitor.process_external_event_log(&envelope).await {
                warn!("Event forwarding failed for {}: {}", record.hash, e);
            }
        }
    }

    /// Deletes terminal records whose last update is older than the
    /// retention period. Returns the number of evicted records.
    pub async fn cleanup_old_transactions(&self) -> Result<u64, TrackerError> {
        let keys = self
            .cache
            .keys(&format!("{}:*", TX_STATUS_KEY_PREFIX))
            .await?;

        let mut evicted = 0;
        for key in keys {
            let Some(json) = self.cache.get(&key).await? else {
                continue;
            };
            let Ok(record) = serde_json::from_str::<TransactionRecord>(&json) else {
                // Unreadable records are evicted rather than kept forever
                self.cache.del(&key).await?;
                evicted += 1;
                continue;
            };
            let stale = millis_since(&record.updated_at)
                .map(|elapsed| elapsed > self.config.retention_ms)
                .unwrap_or(true);
            if record.status.is_terminal() && stale {
                self.cache.del(&key).await?;
                evicted += 1;
            }
        }
        if evicted > 0 {
            info!("Evicted {} old transaction record(s)", evicted);
        }
        Ok(evicted)
    }

    /// Starts the polling and cleanup loops. Each pass completes before its
    /// next sleep, so passes never overlap.
    pub fn start_tracking(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(
            "Transaction tracker started (poll every {}ms)",
            self.config.retry_interval_ms
        );

        let tracker = self.clone();
        tokio::spawn(async move {
            while tracker.running.load(Ordering::SeqCst) {
                if let Err(e) = tracker.process_tracking_queues().await {
                    warn!("Tracking pass failed: {}", e);
                }
                tokio::time::sleep(Duration::from_millis(tracker.config.retry_interval_ms)).await;
            }
            debug!("Tracking loop stopped");
        });

        let tracker = self.clone();
        tokio::spawn(async move {
            while tracker.running.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(tracker.config.cleanup_interval_ms))
                    .await;
                if !tracker.running.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = tracker.cleanup_old_transactions().await {
                    warn!("Cleanup pass failed: {}", e);
                }
            }
            debug!("Cleanup loop stopped");
        });
    }

    pub fn stop_tracking(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!("Transaction tracker stopping");
    }

    async fn notify(&self, user_address: Option<&str>, title: &str, message: &str) {
        if !self.config.notifications_enabled {
            return;
        }
        let (Some(notifier), Some(user)) = (&self.notifier, user_address) else {
            return;
        };
        if let Err(e) = notifier.send_in_app_notification(user, title, message).await {
            warn!("Notification '{}' for {} failed: {}", title, user, e);
        }
    }

    async fn save_record(&self, record: &TransactionRecord) -> Result<(), TrackerError> {
        let mut record = record.clone();
        record.updated_at = now_rfc3339();
        let json = serde_json::to_string(&record)
            .map_err(|e| TrackerError::InvalidData(format!("Record {}: {}", record.hash, e)))?;
        self.cache
            .set_ex(&status_key(&record.hash), &json, TX_RECORD_TTL_SECS)
            .await?;
        Ok(())
    }

    async fn load_record(&self, hash: &str) -> Result<Option<TransactionRecord>, TrackerError> {
        let Some(json) = self.cache.get(&status_key(hash)).await? else {
            return Ok(None);
        };
        let record = serde_json::from_str(&json)
            .map_err(|e| TrackerError::InvalidData(format!("Record {}: {}", hash, e)))?;
        Ok(Some(record))
    }

    async fn save_batch(&self, batch: &TransactionBatch) -> Result<(), TrackerError> {
        let json = serde_json::to_string(batch)
            .map_err(|e| TrackerError::InvalidData(format!("Batch {}: {}", batch.id, e)))?;
        self.cache
            .set_ex(&batch_key(&batch.id), &json, TX_BATCH_TTL_SECS)
            .await?;
        Ok(())
    }

    async fn scan_records(&self) -> Result<Vec<TransactionRecord>, TrackerError> {
        let keys = self
            .cache
            .keys(&format!("{}:*", TX_STATUS_KEY_PREFIX))
            .await?;
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(json) = self.cache.get(&key).await? else {
                continue;
            };
            match serde_json::from_str::<TransactionRecord>(&json) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable record at {}: {}", key, e),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::InMemoryCacheStore;
    use crate::services::provider::{MockChainProviderTrait, RawEventLog};
    use crate::services::{MockEventMonitorTrait, MockNotificationServiceTrait};
    use mockall::predicate::eq;

    const HASH: &str = "0x00000000000000000000000000000000000000000000000000000000000000aa";
    const USER: &str = "0x1111111111111111111111111111111111111111";

    struct TestMocks {
        provider: MockChainProviderTrait,
        notifier: MockNotificationServiceTrait,
        monitor: MockEventMonitorTrait,
    }

    impl TestMocks {
        fn new() -> Self {
            Self {
                provider: MockChainProviderTrait::new(),
                notifier: MockNotificationServiceTrait::new(),
                monitor: MockEventMonitorTrait::new(),
            }
        }

        fn quiet(mut self) -> Self {
            self.notifier
                .expect_send_in_app_notification()
                .returning(|_, _, _| Ok(()));
            self
        }

        fn build(
            self,
            cache: Arc<InMemoryCacheStore>,
            config: TrackerConfig,
        ) -> TransactionTracker<
            MockChainProviderTrait,
            InMemoryCacheStore,
            MockNotificationServiceTrait,
            MockEventMonitorTrait,
        > {
            TransactionTracker::new(
                Arc::new(self.provider),
                cache,
                Some(Arc::new(self.notifier)),
                Some(Arc::new(self.monitor)),
                config,
            )
        }
    }

    fn receipt(status: bool, block: u64) -> TransactionReceiptData {
        TransactionReceiptData {
            transaction_hash: HASH.to_string(),
            block_number: Some(block),
            status,
            gas_used: 21_000,
            effective_gas_price: Some("1000000000".to_string()),
            logs: vec![],
        }
    }

    #[tokio::test]
    async fn test_track_transaction_is_idempotent() {
        let cache = Arc::new(InMemoryCacheStore::new());
        let mut mocks = TestMocks::new().quiet();
        // Mempool lookup happens only on first registration
        mocks
            .provider
            .expect_get_transaction()
            .times(1)
            .returning(|_| Ok(None));

        let tracker = mocks.build(cache.clone(), TrackerConfig::default());
        tracker
            .track_transaction(
                HASH,
                Some(USER),
                TransactionCategory::Transfer,
                TransactionPriority::High,
                None,
            )
            .await
            .unwrap();
        tracker
            .track_transaction(
                HASH,
                Some(USER),
                TransactionCategory::Transfer,
                TransactionPriority::High,
                None,
            )
            .await
            .unwrap();

        // One record, one queue entry
        let record = tracker.get_transaction_status(HASH).await.unwrap().unwrap();
        assert_eq!(record.status, TransactionStatus::Pending);
        let queued = cache
            .lrange(&queue_key(TransactionPriority::High), 0, -1)
            .await
            .unwrap();
        assert_eq!(queued.len(), 1);
    }

    #[tokio::test]
    async fn test_successful_receipt_confirms_with_events() {
        let cache = Arc::new(InMemoryCacheStore::new());
        let mut mocks = TestMocks::new().quiet();
        mocks.provider.expect_get_transaction().returning(|_| Ok(None));
        mocks
            .provider
            .expect_get_transaction_receipt()
            .with(eq(HASH))
            .returning(|_| {
                let mut receipt = receipt(true, 100);
                receipt.logs = vec![RawEventLog {
                    address: "0xcontract".to_string(),
                    topics: vec!["0xtopic".to_string()],
                    data: "0x".to_string(),
                }];
                Ok(Some(receipt))
            });
        mocks
            .provider
            .expect_get_block_number()
            .returning(|| Ok(105));
        mocks.provider.expect_decode_event_log().returning(|_| {
            Some(crate::models::DecodedContractEvent {
                name: "Transfer".to_string(),
                contract_address: "0xcontract".to_string(),
                params: Default::default(),
            })
        });
        mocks
            .monitor
            .expect_process_external_event_log()
            .times(1)
            .returning(|_| Ok(()));

        let tracker = mocks.build(cache.clone(), TrackerConfig::default());
        tracker
            .track_transaction(
                HASH,
                Some(USER),
                TransactionCategory::Transfer,
                TransactionPriority::High,
                None,
            )
            .await
            .unwrap();
        tracker.process_tracking_queues().await.unwrap();

        let record = tracker.get_transaction_status(HASH).await.unwrap().unwrap();
        assert_eq!(record.status, TransactionStatus::Confirmed);
        assert_eq!(record.block_number, Some(100));
        assert_eq!(record.confirmations, Some(5));
        assert_eq!(record.gas_used, Some(21_000));
        assert_eq!(record.decoded_events.len(), 1);
        assert!(record.estimated_confirmation_time_ms.is_some());

        // Decoded events are archived per user
        let history = cache
            .lrange(&format!("event_history:{}", USER), 0, -1)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_reverted_receipt_fails_terminally() {
        let cache = Arc::new(InMemoryCacheStore::new());
        let mut mocks = TestMocks::new().quiet();
        mocks.provider.expect_get_transaction().returning(|_| Ok(None));
        mocks
            .provider
            .expect_get_transaction_receipt()
            .returning(|_| Ok(Some(receipt(false, 90))));

        let tracker = mocks.build(cache, TrackerConfig::default());
        tracker
            .track_transaction(
                HASH,
                Some(USER),
                TransactionCategory::Permission,
                TransactionPriority::Critical,
                None,
            )
            .await
            .unwrap();
        tracker.process_tracking_queues().await.unwrap();

        let record = tracker.get_transaction_status(HASH).await.unwrap().unwrap();
        assert_eq!(record.status, TransactionStatus::Failed);
        assert!(record.error.as_deref().unwrap().contains("reverted"));

        // A terminal record is not reprocessed on the next pass
        tracker.process_tracking_queues().await.unwrap();
        let record = tracker.get_transaction_status(HASH).await.unwrap().unwrap();
        assert_eq!(record.status, TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn test_missing_receipt_requeues_then_times_out() {
        let cache = Arc::new(InMemoryCacheStore::new());
        let mut mocks = TestMocks::new().quiet();
        mocks.provider.expect_get_transaction().returning(|_| Ok(None));
        mocks
            .provider
            .expect_get_transaction_receipt()
            .returning(|_| Ok(None));

        let config = TrackerConfig {
            max_retries: 2,
            ..TrackerConfig::default()
        };
        let tracker = mocks.build(cache.clone(), config);
        tracker
            .track_transaction(
                HASH,
                Some(USER),
                TransactionCategory::Session,
                TransactionPriority::Medium,
                None,
            )
            .await
            .unwrap();

        // Two passes exhaust the retry budget on the third
        tracker.process_tracking_queues().await.unwrap();
        let record = tracker.get_transaction_status(HASH).await.unwrap().unwrap();
        assert_eq!(record.status, TransactionStatus::Pending);
        assert_eq!(record.retry_count, 1);

        tracker.process_tracking_queues().await.unwrap();
        tracker.process_tracking_queues().await.unwrap();

        let record = tracker.get_transaction_status(HASH).await.unwrap().unwrap();
        assert_eq!(record.status, TransactionStatus::Timeout);
        assert!(record.error.as_deref().unwrap().contains("not found"));

        // Queue is drained once terminal
        let queued = cache
            .lrange(&queue_key(TransactionPriority::Medium), 0, -1)
            .await
            .unwrap();
        assert!(queued.is_empty());
    }

    #[tokio::test]
    async fn test_stale_pending_record_times_out_before_receipt_lookup() {
        let cache = Arc::new(InMemoryCacheStore::new());
        let mut mocks = TestMocks::new().quiet();
        mocks.provider.expect_get_transaction().returning(|_| Ok(None));
        // No receipt expectation: the timeout check short-circuits

        let config = TrackerConfig {
            timeout_ms: 0,
            ..TrackerConfig::default()
        };
        let tracker = mocks.build(cache, config);
        tracker
            .track_transaction(
                HASH,
                Some(USER),
                TransactionCategory::Other,
                TransactionPriority::Low,
                None,
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        tracker.process_tracking_queues().await.unwrap();

        let record = tracker.get_transaction_status(HASH).await.unwrap().unwrap();
        assert_eq!(record.status, TransactionStatus::Timeout);
    }

    #[tokio::test]
    async fn test_batch_seals_partial() {
        let cache = Arc::new(InMemoryCacheStore::new());
        let hash_ok = "0x00000000000000000000000000000000000000000000000000000000000000a1";
        let hash_bad = "0x00000000000000000000000000000000000000000000000000000000000000a2";

        let mut mocks = TestMocks::new().quiet();
        mocks.provider.expect_get_transaction().returning(|_| Ok(None));
        mocks
            .provider
            .expect_get_transaction_receipt()
            .returning(move |hash| {
                if hash == hash_ok {
                    Ok(Some(receipt(true, 50)))
                } else {
                    Ok(Some(receipt(false, 50)))
                }
            });
        mocks
            .provider
            .expect_get_block_number()
            .returning(|| Ok(51));
        mocks.provider.expect_decode_event_log().returning(|_| None);
        mocks
            .monitor
            .expect_process_external_event_log()
            .returning(|_| Ok(()));

        let tracker = mocks.build(cache, TrackerConfig::default());
        let batch_id = tracker
            .track_transaction_batch(
                &[hash_ok.to_string(), hash_bad.to_string()],
                Some(USER),
                TransactionCategory::Transfer,
                TransactionPriority::High,
            )
            .await
            .unwrap();

        let batch = tracker.get_batch_status(&batch_id).await.unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::Pending);
        assert_eq!(batch.transaction_hashes.len(), 2);

        tracker.process_tracking_queues().await.unwrap();

        let batch = tracker.get_batch_status(&batch_id).await.unwrap().unwrap();
        assert_eq!(batch.success_count, 1);
        assert_eq!(batch.failure_count, 1);
        assert_eq!(batch.status, BatchStatus::Partial);
        assert!(batch.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_user_queries_filter_and_sort() {
        let cache = Arc::new(InMemoryCacheStore::new());
        let mut mocks = TestMocks::new().quiet();
        mocks.provider.expect_get_transaction().returning(|_| Ok(None));

        let tracker = mocks.build(cache, TrackerConfig::default());
        let other_user = "0x2222222222222222222222222222222222222222";

        for (i, user) in [(1, USER), (2, USER), (3, other_user)] {
            let hash = format!("0x{:064x}", i);
            tracker
                .track_transaction(
                    &hash,
                    Some(user),
                    TransactionCategory::Transfer,
                    TransactionPriority::Medium,
                    None,
                )
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let mine = tracker
            .get_user_transactions(USER, None, None, 10, 0)
            .await
            .unwrap();
        assert_eq!(mine.len(), 2);
        // Newest first
        assert!(mine[0].created_at >= mine[1].created_at);

        let pending = tracker
            .get_user_transactions(USER, Some(TransactionStatus::Pending), None, 1, 0)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);

        let stats = tracker.get_transaction_stats(None).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_status.get("pending"), Some(&3));
        assert_eq!(stats.recent_24h, 3);

        let user_stats = tracker.get_transaction_stats(Some(USER)).await.unwrap();
        assert_eq!(user_stats.total, 2);
    }

    #[tokio::test]
    async fn test_cleanup_evicts_only_stale_terminal_records() {
        let cache = Arc::new(InMemoryCacheStore::new());
        let mut mocks = TestMocks::new().quiet();
        mocks.provider.expect_get_transaction().returning(|_| Ok(None));

        let config = TrackerConfig {
            retention_ms: 0,
            ..TrackerConfig::default()
        };
        let tracker = mocks.build(cache.clone(), config);

        tracker
            .track_transaction(
                HASH,
                Some(USER),
                TransactionCategory::Transfer,
                TransactionPriority::High,
                None,
            )
            .await
            .unwrap();

        // Pending records survive cleanup regardless of age
        assert_eq!(tracker.cleanup_old_transactions().await.unwrap(), 0);

        let mut record = tracker.get_transaction_status(HASH).await.unwrap().unwrap();
        record.status = TransactionStatus::Confirmed;
        tracker.save_record(&record).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(tracker.cleanup_old_transactions().await.unwrap(), 1);
        assert!(tracker.get_transaction_status(HASH).await.unwrap().is_none());
    }
}

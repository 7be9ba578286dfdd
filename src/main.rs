//! Process bootstrap: logging, configuration, Redis and RPC wiring, then the
//! tracker and synchronizer loops until Ctrl-C.

use std::sync::Arc;

use log::{info, warn};
use redis::aio::ConnectionManager;

use chain_sentry::config::{
    CircuitBreakerConfig, RetryStrategy, ServiceConfig, SyncConfig, TrackerConfig,
};
use chain_sentry::domain::{RetryOrchestrator, StateSynchronizer, TransactionTracker};
use chain_sentry::logging::setup_logging;
use chain_sentry::models::ErrorContext;
use chain_sentry::repositories::RedisCacheStore;
use chain_sentry::services::{
    ChainProviderTrait, EvmChainProvider, HttpEventMonitor, WebhookNotificationService,
};

const RPC_TIMEOUT_SECONDS: u64 = 30;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_logging();
    let config = ServiceConfig::from_env();

    let client = redis::Client::open(config.redis_url.as_str())?;
    let connection_manager = ConnectionManager::new(client).await?;
    let cache = Arc::new(RedisCacheStore::new(Arc::new(connection_manager)));

    let provider = Arc::new(EvmChainProvider::new(
        &config.rpc_url,
        &config.contract_address,
        RPC_TIMEOUT_SECONDS,
    )?);

    // Startup connectivity probe through the retry guard
    let orchestrator = RetryOrchestrator::new(
        cache.clone(),
        RetryStrategy::from_env(),
        CircuitBreakerConfig::from_env(),
    );
    let probe_provider = provider.clone();
    match orchestrator
        .execute_with_retry(
            || {
                let provider = probe_provider.clone();
                async move { provider.get_block_number().await }
            },
            &ErrorContext::for_service("rpc"),
        )
        .await
    {
        Ok(block) => info!("Connected to chain at block {}", block),
        Err(e) => warn!("Chain connectivity probe failed: {}", e),
    }

    let notifier = config
        .notification_webhook_url
        .clone()
        .map(|url| {
            Arc::new(WebhookNotificationService::new(
                url,
                config.notification_signing_key.clone(),
            ))
        });
    let event_monitor = config
        .event_monitor_url
        .clone()
        .map(|url| Arc::new(HttpEventMonitor::new(url)));

    let tracker = TransactionTracker::new(
        provider.clone(),
        cache.clone(),
        notifier,
        event_monitor,
        TrackerConfig::from_env(),
    );
    tracker.start_tracking();

    let synchronizer = StateSynchronizer::new(provider, cache, SyncConfig::from_env());
    synchronizer.start_sync();

    info!("chain-sentry running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    tracker.stop_tracking();
    synchronizer.stop_sync();
    info!("Shutdown complete");
    Ok(())
}

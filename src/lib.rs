//! Chain Sentry mediates between an application and an unreliable,
//! high-latency blockchain RPC endpoint.
//!
//! Three cooperating components share a cache store and a chain-read client:
//!
//! - [`domain::RetryOrchestrator`] classifies failures, persists structured
//!   error records, and guards calls with bounded backoff retries and
//!   per-service circuit breakers.
//! - [`domain::TransactionTracker`] registers submitted transaction hashes
//!   and polls priority queues until each reaches a terminal outcome,
//!   decoding contract events from confirmed receipts along the way.
//! - [`domain::StateSynchronizer`] periodically reconciles cached contract
//!   configuration and per-user permission/session snapshots with the chain.
//!
//! External collaborators (RPC node, Redis, webhook receivers) sit behind
//! traits in [`services`] and [`repositories`] and are mockable in tests.

pub mod config;
pub mod constants;
pub mod domain;
pub mod logging;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

//! # CohortSync Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - SQLite repositories for tracking, genomics, retry and snapshot state
//! - The partner registry HTTP client
//! - The in-process event bus and partitioned inbound dispatcher
//! - Cron schedulers for the fetch, publish and sweep jobs
//! - Configuration loading and in-process metrics
//!
//! ## Architecture
//! - Implements traits defined in `cohortsync-core`
//! - Depends on `cohortsync-common` for storage primitives
//! - Contains all "impure" code (I/O, timers, network)

pub mod config;
pub mod database;
pub mod errors;
pub mod events;
pub mod http;
pub mod integrations;
pub mod observability;
pub mod scheduling;

// Re-export commonly used items
pub use database::*;
pub use errors::InfraError;
pub use events::{InProcessEventBus, InboundDispatcher, InboundHandler, SyncInboundHandler};
pub use http::*;
pub use integrations::*;
pub use observability::{JobMetrics, SyncMetrics};

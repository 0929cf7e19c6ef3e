//! # CohortSync App
//!
//! Process wiring for the synchronizer binary.
//!
//! This crate contains:
//! - Application context (dependency injection)
//! - Scheduler and dispatcher lifecycle
//! - NDJSON bridges between stdio and the event bus
//! - Logging setup
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Wires up the hexagonal architecture

pub mod context;
pub mod inbound;
pub mod logging;
pub mod outbound;

// Re-export for convenience
pub use context::*;

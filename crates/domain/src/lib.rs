//! # CohortSync Domain
//!
//! Business domain types for the participant lifecycle synchronizer.
//!
//! This crate contains:
//! - Tracking, genomics and partner-sync data types
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other CohortSync crates
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;

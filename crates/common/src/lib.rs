//! Shared primitives for the CohortSync crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: error classification shared by every layer
//! - `observability`: tracing instrumentation
//! - `platform`: SQLite storage (r2d2 pool, pragmas, connection wrapper)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

#[cfg(feature = "foundation")]
pub mod error;

#[cfg(feature = "platform")]
pub mod storage;

#[cfg(feature = "foundation")]
pub use error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};

//! HTTP plumbing shared by partner integrations

pub mod client;

pub use client::{HttpClient, HttpClientBuilder, RetryPolicy};

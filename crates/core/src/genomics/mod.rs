//! Genomics status pipeline: feed fetch, batching and publish.

pub mod batching;
pub mod fetch;
pub mod ports;
pub mod publisher;

pub use batching::slice_records;
pub use fetch::{FetchOutcome, FetchReport, GenomicsFetchService};
pub use publisher::{GenomicsBatchPublisher, PublishReport};

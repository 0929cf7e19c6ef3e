//! Partner registry API: status feed reads and participant/order writes

pub mod client;
pub mod errors;

pub use client::PartnerClient;
pub use errors::{PartnerError, PartnerErrorCategory};

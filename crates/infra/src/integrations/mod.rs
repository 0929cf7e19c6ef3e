//! External system integrations

pub mod partner;

pub use partner::{PartnerClient, PartnerError, PartnerErrorCategory};

//! Partner synchronization: change-detection gate, send path and retry sweep.

pub mod account;
pub mod change_detection;
pub mod ports;
pub mod retry_queue;
pub mod service;
pub mod sweeper;

pub use account::AccountChangeProcessor;
pub use change_detection::ChangeDetector;
pub use retry_queue::SyncRetryQueue;
pub use service::{SubmitResult, SyncService};
pub use sweeper::{SweepReport, SyncRetrySweeper};

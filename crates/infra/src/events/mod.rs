//! Internal event bus and inbound event dispatch
//!
//! ```text
//! GenomicsBatchPublisher / SyncService
//!        │ publish()
//!        ▼
//! InProcessEventBus (broadcast) ──► subscribers
//!
//! inbound source ──► InboundDispatcher
//!                      ├── mpsc ──► partition 0 worker
//!                      ├── mpsc ──► partition 1 worker
//!                      └── ...      (hash(partition_key) % N)
//! ```

pub mod bus;
pub mod dispatcher;

pub use bus::InProcessEventBus;
pub use dispatcher::{DispatcherStats, InboundDispatcher, InboundHandler, SyncInboundHandler};

//! Domain types

pub mod events;
pub mod genomics;
pub mod sync;
pub mod tracking;

pub use events::*;
pub use genomics::*;
pub use sync::*;
pub use tracking::*;

//! Utility types

pub mod pool;
pub mod view;

pub use pool::{ScratchGuard, ScratchPool};
pub use view::{ByteView, OffsetEncoding, TableRef};

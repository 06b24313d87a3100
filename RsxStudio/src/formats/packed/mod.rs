//! Packed scalar codecs
//!
//! Fixed-point vectors and quaternions shared by the bone and animation
//! decoders. All math is single precision; `unpack` applies a type's scale
//! before any external fixup is added.

pub mod quaternion;
pub mod sparse;
pub mod vector;

pub use quaternion::{Quaternion48, Quaternion64};
pub use sparse::{SparsePos64, SparseQuat32};
pub use vector::{Half, Vector48, Vector64};

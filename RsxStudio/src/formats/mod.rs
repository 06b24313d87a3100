//! Binary format decoders

pub mod packed;
pub mod studio;

#![allow(non_snake_case)]
//! # RsxStudio
//!
//! A pure-Rust decoder for studio model assets across their revisions
//! (r1, r2 and v8 through v19.1).
//!
//! ## What gets decoded
//!
//! - **Header** - one normalized view over every revision's layout
//! - **Bones** - hierarchy, base pose, jigglebones, IK chains
//! - **Model tables** - attachments, hitboxes, textures, skins, body parts
//! - **Vertices** - legacy four-file sets and packed vertex groups, per LOD
//! - **Animation** - RLE, datapoint and legacy tracks, root motion, sequences
//!
//! ## Quick Start
//!
//! ```no_run
//! use rsxstudio::prelude::*;
//!
//! let options = DecodeOptions::default();
//! let pool = options.scratch_pool();
//! let sources = ModelSources::new("crate", std::fs::read("crate.rmdl")?)
//!     .with_hardware_data(std::fs::read("crate.hwdata")?);
//!
//! let mut model = StudioModel::parse(sources, StudioVersion::V16, &options, &pool, &Decompressors::new())?;
//! model.decode_animations(&ExternalBuffers::default(), &options);
//! println!("{} bones, {} sequences", model.bones.len(), model.sequences.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `rsxstudio` command-line binary

pub mod batch;
pub mod compression;
pub mod config;
pub mod error;
pub mod formats;
pub mod utils;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::batch::{BatchProgress, BatchResult, batch_decode, find_model_files, load_sources};
    pub use crate::compression::{BlockDecompressor, CompressedBlock, CompressionType, Decompressors};
    pub use crate::config::DecodeOptions;
    pub use crate::error::{Error, Result};
    pub use crate::formats::studio::{
        AnimationClip, Bone, DecodedBoneTrack, ExternalBuffers, LegacyVertexFiles, Lod, Mesh, ModelSources,
        ModelSummary, Sequence, StudioModel, StudioVersion,
    };
    pub use crate::utils::{ByteView, ScratchPool};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;

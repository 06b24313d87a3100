//! Decode options
//!
//! Options can be built in code with the `with_*` methods or loaded from a
//! TOML file; every field has a default so a file only lists what it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::ScratchPool;

fn default_scratch_slots() -> usize {
    4
}

fn default_scratch_slot_size() -> usize {
    32 * 1024 * 1024
}

fn default_max_lods() -> usize {
    8
}

fn default_true() -> bool {
    true
}

fn default_max_fps() -> f32 {
    1000.0
}

fn default_max_frames() -> usize {
    65535
}

/// Options controlling a decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Number of scratch buffers shared by concurrent mesh decodes.
    #[serde(default = "default_scratch_slots")]
    pub scratch_slots: usize,
    /// Size of each scratch buffer in bytes.
    #[serde(default = "default_scratch_slot_size")]
    pub scratch_slot_size: usize,
    /// Batch worker threads; 0 uses one per core.
    #[serde(default)]
    pub worker_threads: usize,
    #[serde(default = "default_max_lods")]
    pub max_lods: usize,
    #[serde(default = "default_true")]
    pub decode_animations: bool,
    /// Fold root motion into bone 0.
    #[serde(default = "default_true")]
    pub fold_root_motion: bool,
    /// Scale delta clips by the sequence weight list.
    #[serde(default = "default_true")]
    pub apply_delta_weights: bool,
    /// Clips above this frame rate are malformed.
    #[serde(default = "default_max_fps")]
    pub max_fps: f32,
    /// Clips above this frame count are malformed.
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            scratch_slots: default_scratch_slots(),
            scratch_slot_size: default_scratch_slot_size(),
            worker_threads: 0,
            max_lods: default_max_lods(),
            decode_animations: true,
            fold_root_motion: true,
            apply_delta_weights: true,
            max_fps: default_max_fps(),
            max_frames: default_max_frames(),
        }
    }
}

impl DecodeOptions {
    /// Parse options from TOML text.
    ///
    /// # Errors
    /// Returns [`Error::Config`] for invalid TOML or field types.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load options from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Build the scratch pool these options describe.
    #[must_use]
    pub fn scratch_pool(&self) -> ScratchPool {
        ScratchPool::new(self.scratch_slots, self.scratch_slot_size)
    }

    #[must_use]
    pub fn with_scratch(mut self, slots: usize, slot_size: usize) -> Self {
        self.scratch_slots = slots;
        self.scratch_slot_size = slot_size;
        self
    }

    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    #[must_use]
    pub fn with_max_lods(mut self, max_lods: usize) -> Self {
        self.max_lods = max_lods;
        self
    }

    /// Skip the animation pass.
    #[must_use]
    pub fn no_animations(mut self) -> Self {
        self.decode_animations = false;
        self
    }

    /// Keep root motion separate from bone 0.
    #[must_use]
    pub fn no_root_motion_fold(mut self) -> Self {
        self.fold_root_motion = false;
        self
    }

    #[must_use]
    pub fn with_delta_weights(mut self, apply: bool) -> Self {
        self.apply_delta_weights = apply;
        self
    }

    #[must_use]
    pub fn with_sanity_bounds(mut self, max_fps: f32, max_frames: usize) -> Self {
        self.max_fps = max_fps;
        self.max_frames = max_frames;
        self
    }
}

//! Block compression tags and the decompressor seam
//!
//! Vertex group blocks and hardware data are stored with a one-byte
//! compression tag. Only uncompressed blocks are handled in-crate; the
//! Oodle, pak-native and snowflake codecs are supplied by the host through
//! [`BlockDecompressor`].

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Compression applied to a stored block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CompressionType {
    None = 0,
    PakNative = 1,
    Snowflake = 2,
    Oodle = 3,
}

impl CompressionType {
    /// Parse the stored compression tag.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::PakNative),
            2 => Ok(CompressionType::Snowflake),
            3 => Ok(CompressionType::Oodle),
            _ => Err(Error::UnknownCompressionTag(value)),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionType::None => "none",
            CompressionType::PakNative => "pak-native",
            CompressionType::Snowflake => "snowflake",
            CompressionType::Oodle => "oodle",
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A host-provided block decoder for one compression scheme.
pub trait BlockDecompressor: Send + Sync {
    /// Decompress `input` into exactly `decompressed_size` bytes.
    fn decompress(&self, input: &[u8], decompressed_size: usize) -> Result<Vec<u8>>;
}

/// A stored block together with its size pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedBlock {
    pub data: Vec<u8>,
    pub compression: CompressionType,
    pub decompressed_size: usize,
}

impl CompressedBlock {
    /// An uncompressed block.
    #[must_use]
    pub fn raw(data: Vec<u8>) -> Self {
        let decompressed_size = data.len();
        Self {
            data,
            compression: CompressionType::None,
            decompressed_size,
        }
    }
}

/// Registered decompressors keyed by compression tag.
#[derive(Clone, Default)]
pub struct Decompressors {
    pak_native: Option<Arc<dyn BlockDecompressor>>,
    snowflake: Option<Arc<dyn BlockDecompressor>>,
    oodle: Option<Arc<dyn BlockDecompressor>>,
}

impl fmt::Debug for Decompressors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decompressors")
            .field("pak_native", &self.pak_native.is_some())
            .field("snowflake", &self.snowflake.is_some())
            .field("oodle", &self.oodle.is_some())
            .finish()
    }
}

impl Decompressors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decompressor for a tag. Registering for `None` is ignored.
    #[must_use]
    pub fn with(mut self, kind: CompressionType, decoder: Arc<dyn BlockDecompressor>) -> Self {
        match kind {
            CompressionType::None => {}
            CompressionType::PakNative => self.pak_native = Some(decoder),
            CompressionType::Snowflake => self.snowflake = Some(decoder),
            CompressionType::Oodle => self.oodle = Some(decoder),
        }
        self
    }

    #[must_use]
    pub fn supports(&self, kind: CompressionType) -> bool {
        kind == CompressionType::None || self.get(kind).is_some()
    }

    fn get(&self, kind: CompressionType) -> Option<&Arc<dyn BlockDecompressor>> {
        match kind {
            CompressionType::None => None,
            CompressionType::PakNative => self.pak_native.as_ref(),
            CompressionType::Snowflake => self.snowflake.as_ref(),
            CompressionType::Oodle => self.oodle.as_ref(),
        }
    }

    /// Decompress a block, verifying the output size.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedCompression`] if no decoder is registered
    /// for the tag, or [`Error::DecompressionFailed`] on a size mismatch.
    pub fn decompress(
        &self,
        kind: CompressionType,
        input: &[u8],
        decompressed_size: usize,
    ) -> Result<Vec<u8>> {
        let output = match kind {
            CompressionType::None => input.to_vec(),
            other => {
                let decoder = self.get(other).ok_or(Error::UnsupportedCompression(other))?;
                decoder.decompress(input, decompressed_size)?
            }
        };

        if output.len() != decompressed_size {
            return Err(Error::DecompressionFailed(format!(
                "{kind}: expected {decompressed_size} bytes, got {}",
                output.len()
            )));
        }
        tracing::debug!(
            "Decompressed {} block: {} -> {} bytes",
            kind,
            input.len(),
            output.len()
        );
        Ok(output)
    }

    /// Decompress a [`CompressedBlock`].
    pub fn decompress_block(&self, block: &CompressedBlock) -> Result<Vec<u8>> {
        self.decompress(block.compression, &block.data, block.decompressed_size)
    }
}

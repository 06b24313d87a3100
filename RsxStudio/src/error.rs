//! Error types for `RsxStudio`

use std::path::PathBuf;

use thiserror::Error;

use crate::compression::CompressionType;

/// The error type for `RsxStudio` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error reading a file at a specific path.
    #[error("failed to read {path}: {source}")]
    FileRead {
        /// The path that failed to read.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Directory traversal failed during batch discovery.
    #[error("directory walk error: {0}")]
    WalkDir(#[from] walkdir::Error),

    // ==================== Version Errors ====================
    /// The format version is not one this decoder knows.
    #[error("unsupported studio model version: {0}")]
    UnsupportedVersion(String),

    // ==================== Buffer Errors ====================
    /// A read ran past the end of the backing buffer.
    #[error("read of {len} bytes at offset {offset} exceeds buffer of {size} bytes")]
    OutOfBounds {
        /// Absolute offset of the read.
        offset: usize,
        /// Number of bytes requested.
        len: usize,
        /// Size of the buffer.
        size: usize,
    },

    /// An offset field resolved to a position that cannot exist.
    #[error("invalid offset {value} in field at {field}")]
    InvalidOffset {
        /// Absolute position of the offending field.
        field: usize,
        /// The raw stored value.
        value: i64,
    },

    /// A block did not start with the expected magic.
    #[error("invalid {format} magic: expected {expected:?}, found {found:?}")]
    InvalidMagic {
        /// Which block was being read.
        format: &'static str,
        /// The expected magic bytes.
        expected: [u8; 4],
        /// The bytes actually present.
        found: [u8; 4],
    },

    /// A decoded stream would not fit in its scratch allocation.
    #[error("buffer capacity exceeded: {requested} bytes requested, {capacity} available")]
    BufferCapacityExceeded {
        /// Total bytes the writer would hold after the append.
        requested: usize,
        /// Capacity of the backing slot.
        capacity: usize,
    },

    // ==================== Vertex Errors ====================
    /// The vertex flags select an encoding this decoder does not handle.
    #[error("unsupported vertex format: {0}")]
    UnsupportedVertexFormat(String),

    /// A vertex group block is internally inconsistent.
    #[error("invalid vertex group: {0}")]
    InvalidVertexGroup(String),

    /// The asset needs vertex data that was not supplied.
    #[error("missing vertex data: {0}")]
    MissingVertexData(&'static str),

    // ==================== Animation Errors ====================
    /// An animation description or track failed a sanity check.
    #[error("malformed animation '{name}': {reason}")]
    MalformedAnimation {
        /// Name of the animation.
        name: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A sequence description failed a sanity check.
    #[error("malformed sequence {index}: {reason}")]
    MalformedSequence {
        /// Index of the sequence in its table.
        index: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// Streamed or side-asset animation data has not been resolved.
    #[error("missing external animation data: {0}")]
    MissingExternalData(String),

    // ==================== Compression Errors ====================
    /// No decompressor is registered for the block's compression tag.
    #[error("unsupported compression: {0}")]
    UnsupportedCompression(CompressionType),

    /// Unknown compression tag value.
    #[error("unknown compression tag: {0}")]
    UnknownCompressionTag(u8),

    /// Decompression failed or produced the wrong size.
    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    // ==================== Config Errors ====================
    /// Decode options file could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Thread pool construction failed.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type alias for `RsxStudio` operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error should skip a single sequence rather than fail the asset.
    #[must_use]
    pub fn is_sequence_local(&self) -> bool {
        matches!(
            self,
            Error::MalformedAnimation { .. }
                | Error::MalformedSequence { .. }
                | Error::MissingExternalData(_)
        )
    }
}

//! Error types for the annotation canvas core.

use thiserror::Error;

/// Errors raised by public canvas operations.
///
/// Raster problems inside a redraw are logged and skipped instead; only bad
/// input to a public method ends up here.
#[derive(Error, Debug)]
pub enum CanvasError {
    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("ragged mask: row {row} has {len} cells, expected {expected}")]
    RaggedMask { row: usize, len: usize, expected: usize },

    #[error("mask data has {len} cells, expected {height}x{width}")]
    MaskLength { len: usize, height: u32, width: u32 },

    #[error("mask is {height}x{width}, image is {expected_height}x{expected_width}")]
    MaskShape {
        height: u32,
        width: u32,
        expected_height: u32,
        expected_width: u32,
    },

    #[error("RLE size [{rle_height}, {rle_width}] does not match {height}x{width} (runs cover {total} pixels)")]
    RleSize {
        rle_height: u32,
        rle_width: u32,
        height: u32,
        width: u32,
        total: u64,
    },

    #[error("malformed compressed RLE counts at byte {0}")]
    RleCounts(usize),

    #[error("ingestion error: {0}")]
    Ingest(String),

    #[error("unknown layer: {0}")]
    UnknownLayer(String),

    #[error("no prediction candidate at index {0}")]
    UnknownCandidate(usize),

    #[error("mask edit already in progress for layer {0}")]
    EditInProgress(String),

    #[error("no mask edit in progress")]
    NoEditSession,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, CanvasError>;

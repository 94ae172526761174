//! Custom error types for jpegrestore.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the jpegrestore library.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to load an image file.
    #[error("failed to load image from {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Failed to save an image file.
    #[error("failed to save image to {path}: {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// JPEG encode or decode failed during degradation.
    #[error("JPEG round-trip failed: {source}")]
    Jpeg {
        #[source]
        source: image::ImageError,
    },

    /// Image dimensions are not supported.
    #[error("unsupported image dimensions {width}x{height}: {reason}")]
    UnsupportedDimensions {
        width: usize,
        height: usize,
        reason: String,
    },

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Shape mismatch in array operations.
    #[error("array shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// No samples to work with.
    #[error("empty dataset: {reason}")]
    EmptyDataset { reason: String },

    /// Failed to read an image array file.
    #[error("failed to read image array from {path}: {source}")]
    ArrayRead {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },

    /// Failed to write an image array file.
    #[error("failed to write image array to {path}: {source}")]
    ArrayWrite {
        path: PathBuf,
        #[source]
        source: ndarray_npy::WriteNpyError,
    },

    /// Model file could not be encoded or decoded.
    #[error("invalid model file {path}: {source}")]
    ModelFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Model file could not be opened or created.
    #[error("failed to access model file {path}: {source}")]
    ModelAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Network weights inside a model file could not be recorded or restored.
    #[error("invalid model weights in {path}: {reason}")]
    ModelWeights { path: PathBuf, reason: String },

    /// Tensor data could not be moved between the backend and host arrays.
    #[error("tensor conversion failed: {0}")]
    Tensor(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for jpegrestore operations.
pub type Result<T> = std::result::Result<T, Error>;

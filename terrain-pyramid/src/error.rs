//! Error types for pyramid building.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::encode::EncodeError;

/// Result type for pyramid operations.
pub type PyramidResult<T> = Result<T, PyramidError>;

/// Errors that can occur while planning or building a tile pyramid.
#[derive(Debug, Error)]
pub enum PyramidError {
    /// Invalid configuration or geometry that makes the pyramid impossible.
    ///
    /// Always raised before any tile is written.
    #[error("configuration error: {0}")]
    Config(String),

    /// Source data is unusable (cannot be georeferenced, mismatched scales,
    /// no valid samples, incomplete output grid).
    #[error("data error: {0}")]
    Data(String),

    /// A source raster could not be decoded.
    #[error("failed to open raster {path}: {source}")]
    OpenRaster {
        path: PathBuf,
        source: image::ImageError,
    },

    /// Failed to read a file.
    #[error("failed to read {path}: {source}")]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file.
    #[error("failed to write {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create or remove a directory.
    #[error("failed to prepare directory {path}: {source}")]
    DirectoryFailed { path: PathBuf, source: io::Error },

    /// Tile encoding failed.
    #[error("tile encoding failed: {0}")]
    Encode(#[from] EncodeError),

    /// Manifest could not be serialized or parsed.
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// Logging could not be initialized.
    #[error("logging setup failed: {0}")]
    Logging(String),
}

impl PyramidError {
    /// Shorthand for a [`PyramidError::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        PyramidError::Config(msg.into())
    }

    /// Shorthand for a [`PyramidError::Data`].
    pub fn data(msg: impl Into<String>) -> Self {
        PyramidError::Data(msg.into())
    }

    /// Returns true for configuration errors.
    pub fn is_config_error(&self) -> bool {
        matches!(self, PyramidError::Config(_))
    }

    /// Returns true for data errors.
    pub fn is_data_error(&self) -> bool {
        matches!(self, PyramidError::Data(_) | PyramidError::OpenRaster { .. })
    }
}

//! Error types for tile encoding.

use thiserror::Error;

/// Errors that can occur while encoding a tile image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Image has a zero dimension.
    #[error("invalid dimensions {width}×{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// The encoder cannot store this pixel layout.
    #[error("unsupported pixel layout: {0}")]
    UnsupportedLayout(String),

    /// Invalid encoder settings.
    #[error("invalid encoder configuration: {0}")]
    InvalidConfig(String),

    /// The underlying codec failed.
    #[error("encoding failed: {0}")]
    EncodingFailed(String),
}

impl From<image::ImageError> for EncodeError {
    fn from(err: image::ImageError) -> Self {
        EncodeError::EncodingFailed(err.to_string())
    }
}

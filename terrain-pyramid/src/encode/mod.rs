//! Tile image encoding.
//!
//! The [`TileEncoder`] trait turns an in-memory tile image into file bytes.
//! The pipeline holds one encoder per channel as `Arc<dyn TileEncoder>` and
//! never depends on a concrete format.
//!
//! ```text
//! ┌──────────────────────┐
//! │    PyramidBuilder    │
//! │ Arc<dyn TileEncoder> │
//! └──────────┬───────────┘
//!            │
//!       ┌────┴─────┐
//!       ▼          ▼
//! ┌──────────┐ ┌──────────┐
//! │   PNG    │ │   JPEG   │
//! │ L16, RGB │ │   RGB    │
//! └──────────┘ └──────────┘
//! ```
//!
//! Elevation tiles are always 16-bit grayscale PNG. Color tiles use PNG or
//! JPEG depending on configuration.

mod error;
mod jpeg;
mod png;

pub use error::EncodeError;
pub use jpeg::{JpegTileEncoder, DEFAULT_JPEG_QUALITY};
pub use png::PngTileEncoder;

use image::DynamicImage;

/// Encodes tile images into a file format.
pub trait TileEncoder: Send + Sync {
    /// Encode `image` into file bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::UnsupportedLayout`] if the encoder cannot store
    /// the image's pixel layout.
    fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>, EncodeError>;

    /// File extension without the leading dot.
    fn extension(&self) -> &str;

    /// Human-readable encoder name for logs.
    fn name(&self) -> &str;
}

/// Short name of an image's pixel layout for error messages.
pub(crate) fn layout_name(image: &DynamicImage) -> String {
    format!("{:?}", image.color())
}

/// Reject images with a zero dimension.
pub(crate) fn check_dimensions(image: &DynamicImage) -> Result<(), EncodeError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(EncodeError::InvalidDimensions {
            width: image.width(),
            height: image.height(),
        });
    }
    Ok(())
}

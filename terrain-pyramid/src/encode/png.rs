//! PNG tile encoder.
//!
//! Stores 16-bit grayscale heightmaps and 8-bit RGB color tiles losslessly.

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::DynamicImage;

use super::{check_dimensions, layout_name, EncodeError, TileEncoder};

/// PNG encoder for heightmap and color tiles.
///
/// # Example
///
/// ```
/// use terrain_pyramid::encode::{PngTileEncoder, TileEncoder};
///
/// let encoder = PngTileEncoder::new();
/// assert_eq!(encoder.extension(), "png");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PngTileEncoder {
    compression: CompressionType,
}

impl PngTileEncoder {
    /// Encoder with default zlib compression.
    pub fn new() -> Self {
        Self {
            compression: CompressionType::Default,
        }
    }
}

impl Default for PngTileEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TileEncoder for PngTileEncoder {
    fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>, EncodeError> {
        check_dimensions(image)?;
        match image {
            DynamicImage::ImageLuma16(_) | DynamicImage::ImageRgb8(_) => {}
            other => return Err(EncodeError::UnsupportedLayout(layout_name(other))),
        }

        let mut bytes = Vec::new();
        let encoder =
            PngEncoder::new_with_quality(&mut bytes, self.compression, FilterType::Adaptive);
        image.write_with_encoder(encoder)?;
        Ok(bytes)
    }

    fn extension(&self) -> &str {
        "png"
    }

    fn name(&self) -> &str {
        "PNG"
    }
}

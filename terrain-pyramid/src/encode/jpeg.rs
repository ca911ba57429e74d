//! JPEG tile encoder for color tiles.

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use super::{check_dimensions, layout_name, EncodeError, TileEncoder};

/// Default JPEG quality.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Lossy JPEG encoder. Only RGB tiles are accepted.
#[derive(Debug, Clone, Copy)]
pub struct JpegTileEncoder {
    quality: u8,
}

impl JpegTileEncoder {
    /// Encoder with `quality` in 1..=100.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::InvalidConfig`] for a quality outside 1..=100.
    pub fn new(quality: u8) -> Result<Self, EncodeError> {
        if !(1..=100).contains(&quality) {
            return Err(EncodeError::InvalidConfig(format!(
                "JPEG quality must be 1-100, got {}",
                quality
            )));
        }
        Ok(Self { quality })
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegTileEncoder {
    fn default() -> Self {
        Self {
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl TileEncoder for JpegTileEncoder {
    fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>, EncodeError> {
        check_dimensions(image)?;
        if !matches!(image, DynamicImage::ImageRgb8(_)) {
            return Err(EncodeError::UnsupportedLayout(layout_name(image)));
        }

        let mut bytes = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut bytes, self.quality);
        image.write_with_encoder(encoder)?;
        Ok(bytes)
    }

    fn extension(&self) -> &str {
        "jpg"
    }

    fn name(&self) -> &str {
        "JPEG"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[test]
    fn test_quality_bounds() {
        assert!(JpegTileEncoder::new(0).is_err());
        assert!(JpegTileEncoder::new(101).is_err());
        assert_eq!(JpegTileEncoder::new(75).unwrap().quality(), 75);
        assert_eq!(JpegTileEncoder::default().quality(), DEFAULT_JPEG_QUALITY);
    }

    #[test]
    fn test_encode_rgb() {
        let img = ImageBuffer::from_pixel(16, 16, Rgb([120u8, 80, 40]));
        let bytes = JpegTileEncoder::default()
            .encode(&DynamicImage::ImageRgb8(img))
            .unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(image::load_from_memory(&bytes).unwrap().width(), 16);
    }

    #[test]
    fn test_heightmap_rejected() {
        let err = JpegTileEncoder::default()
            .encode(&DynamicImage::new_luma16(4, 4))
            .unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedLayout(_)));
    }
}

//! Global height normalization and 16-bit heightmap tiles.
//!
//! All elevation tiles share one [`ElevationRange`] computed over the whole
//! cropped surface before any tile is encoded. A height `h` is stored as
//! `round((h - min) / (max - min) × 65535)`, so relative elevation is
//! consistent across tiles regardless of each tile's local range.

use image::{DynamicImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PyramidError, PyramidResult};
use crate::raster::{height_stats, Grid, HeightStats};
use crate::tile::{Tile, TileSummary};

/// Largest stored heightmap value.
pub const HEIGHT_MAX_U16: f64 = u16::MAX as f64;

/// Global min/max height of the cropped elevation surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevationRange {
    pub min: f32,
    pub max: f32,
}

impl ElevationRange {
    /// # Errors
    ///
    /// Returns a data error if either bound is not finite or `min > max`.
    pub fn new(min: f32, max: f32) -> PyramidResult<Self> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(PyramidError::data(format!(
                "invalid elevation range {}..{}",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    pub fn span(&self) -> f64 {
        self.max as f64 - self.min as f64
    }

    /// Stored value for height `h`. No-data and flat surfaces map to 0.
    #[inline]
    pub fn normalize(&self, h: f32) -> u16 {
        let span = self.span();
        if h.is_nan() || span <= 0.0 {
            return 0;
        }
        let t = ((h as f64 - self.min as f64) / span).clamp(0.0, 1.0);
        (t * HEIGHT_MAX_U16).round() as u16
    }

    /// Height represented by a stored value.
    pub fn denormalize(&self, value: u16) -> f64 {
        self.min as f64 + self.span() * value as f64 / HEIGHT_MAX_U16
    }

    /// Encode a height grid as a 16-bit grayscale image.
    pub fn to_image(&self, heights: &Grid<f32>) -> DynamicImage {
        let width = heights.width();
        let buf: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_fn(width, heights.height(), |x, y| {
                Luma([self.normalize(heights.get(x, y))])
            });
        DynamicImage::ImageLuma16(buf)
    }
}

/// Compute tile statistics and replace tiles without valid samples.
///
/// A tile with no valid samples is filled uniformly with the global minimum
/// and reported with `valid: false` so the grid stays complete. Must run on
/// the extracted tile, before its borders are patched from neighbours.
pub fn finalize_tile(tile: &mut Tile<f32>, range: &ElevationRange) -> TileSummary {
    let stats: Option<HeightStats> = height_stats(tile.pixels.as_slice());
    if stats.is_none() {
        warn!(
            level = tile.key.level,
            x = tile.key.x,
            y = tile.key.y,
            "Tile has no valid elevation samples, writing placeholder"
        );
        tile.pixels = Grid::filled(tile.pixels.width(), tile.pixels.height(), range.min);
    }
    TileSummary {
        key: tile.key,
        bbox: tile.bbox(),
        valid: stats.is_some(),
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extent::{Extent, WorldPoint};
    use crate::tile::TileKey;

    #[test]
    fn test_range_validation() {
        assert!(ElevationRange::new(10.0, 5.0).is_err());
        assert!(ElevationRange::new(f32::NAN, 5.0).is_err());
        assert!(ElevationRange::new(3.0, 3.0).is_ok());
    }

    #[test]
    fn test_normalize_endpoints() {
        let range = ElevationRange::new(400.0, 4400.0).unwrap();
        assert_eq!(range.normalize(400.0), 0);
        assert_eq!(range.normalize(4400.0), 65535);
        assert_eq!(range.normalize(2400.0), 32768);
        assert_eq!(range.normalize(f32::NAN), 0);
    }

    #[test]
    fn test_flat_surface_maps_to_zero() {
        let range = ElevationRange::new(250.0, 250.0).unwrap();
        assert_eq!(range.normalize(250.0), 0);
    }

    #[test]
    fn test_denormalize_inverts_endpoints() {
        let range = ElevationRange::new(-50.0, 950.0).unwrap();
        assert_eq!(range.denormalize(0), -50.0);
        assert_eq!(range.denormalize(65535), 950.0);
    }

    #[test]
    fn test_tiles_with_different_local_ranges_stay_consistent() {
        let range = ElevationRange::new(0.0, 1000.0).unwrap();
        let low = Grid::from_vec(2, 1, vec![0.0, 500.0]).unwrap();
        let high = Grid::from_vec(2, 1, vec![500.0, 1000.0]).unwrap();
        let low_img = range.to_image(&low).to_luma16();
        let high_img = range.to_image(&high).to_luma16();
        assert_eq!(low_img.get_pixel(1, 0), high_img.get_pixel(0, 0));
        assert_eq!(high_img.get_pixel(1, 0).0[0], 65535);
    }

    #[test]
    fn test_finalize_placeholder() {
        let range = ElevationRange::new(100.0, 200.0).unwrap();
        let mut tile = Tile {
            key: TileKey::new(1, 0, 1),
            extent: Extent::from_origin(WorldPoint::new(0.0, 0.0), 2, 2, 1.0),
            pixels: Grid::<f32>::nodata(2, 2),
        };
        let summary = finalize_tile(&mut tile, &range);
        assert!(!summary.valid);
        assert!(summary.stats.is_none());
        assert!(tile.pixels.as_slice().iter().all(|v| *v == 100.0));
    }

    #[test]
    fn test_finalize_valid_tile() {
        let range = ElevationRange::new(0.0, 10.0).unwrap();
        let mut tile = Tile {
            key: TileKey::new(1, 0, 0),
            extent: Extent::from_origin(WorldPoint::new(0.0, 0.0), 2, 1, 1.0),
            pixels: Grid::from_vec(2, 1, vec![2.0, f32::NAN]).unwrap(),
        };
        let summary = finalize_tile(&mut tile, &range);
        assert!(summary.valid);
        assert_eq!(summary.stats.unwrap().mean, 2.0);
        assert!(tile.pixels.get(1, 0).is_nan());
    }
}

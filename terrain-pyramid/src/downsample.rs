//! Smooth resampling of color tiles to the canonical tile size.
//!
//! Only color tiles pass through here. Elevation tiles are reduced by
//! sampling in [`crate::level`] and are never interpolated.

use std::fmt;
use std::str::FromStr;

use image::imageops::{self, FilterType};

use crate::error::PyramidError;
use crate::raster::{Grid, Rgb};

/// Filter used when shrinking color tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleFilter {
    /// Bilinear.
    #[default]
    Triangle,
    /// Cubic (Catmull-Rom).
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl ResampleFilter {
    fn filter_type(&self) -> FilterType {
        match self {
            ResampleFilter::Triangle => FilterType::Triangle,
            ResampleFilter::CatmullRom => FilterType::CatmullRom,
            ResampleFilter::Gaussian => FilterType::Gaussian,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResampleFilter::Triangle => "triangle",
            ResampleFilter::CatmullRom => "catmull-rom",
            ResampleFilter::Gaussian => "gaussian",
            ResampleFilter::Lanczos3 => "lanczos3",
        }
    }
}

impl fmt::Display for ResampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResampleFilter {
    type Err = PyramidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "triangle" | "bilinear" | "linear" => Ok(ResampleFilter::Triangle),
            "catmull-rom" | "catmullrom" | "cubic" => Ok(ResampleFilter::CatmullRom),
            "gaussian" => Ok(ResampleFilter::Gaussian),
            "lanczos3" | "lanczos" => Ok(ResampleFilter::Lanczos3),
            other => Err(PyramidError::config(format!(
                "unknown resample filter '{}'",
                other
            ))),
        }
    }
}

/// Resize a color tile to `target_px × target_px`.
///
/// Returns the tile unchanged when it already has the target size.
pub fn resize_to_canonical(tile: Grid<Rgb>, target_px: u32, filter: ResampleFilter) -> Grid<Rgb> {
    if tile.width() == target_px && tile.height() == target_px {
        return tile;
    }
    if tile.width() == 0 || tile.height() == 0 {
        return Grid::nodata(target_px, target_px);
    }
    let image = tile.into_rgb_image();
    let resized = imageops::resize(&image, target_px, target_px, filter.filter_type());
    Grid::from_rgb_image(&resized)
}

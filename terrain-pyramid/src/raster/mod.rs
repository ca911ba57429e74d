//! Raster access for source datasets.
//!
//! This module provides the [`RasterSource`] abstraction the rest of the
//! pipeline reads through. A source reports its georeferencing up front via
//! [`RasterInfo`] and decodes its pixels on demand, so planning can run on
//! headers alone.
//!
//! # Implementations
//!
//! - [`ImageRaster`] - raster files decoded by the `image` crate and
//!   georeferenced by an ESRI world-file sidecar
//! - [`MemoryRaster`] - an in-memory buffer with an explicit extent
//!
//! Elevation sources yield `f32` heights (NaN = no-data); color sources yield
//! packed [`Rgb`] samples.

mod grid;
mod image_source;
mod stats;
mod world_file;

pub use grid::{Grid, PixelWindow, Rgb, Sample};
pub use image_source::{discover_sources, ElevationEncoding, ImageRaster};
pub use stats::{height_stats, par_grid_stats, window_stats, HeightStats};
pub use world_file::{find_world_file, sidecar_candidates, WorldFile};

use std::fmt;

use crate::error::{PyramidError, PyramidResult};
use crate::extent::{Extent, WorldPoint};

/// The two surfaces a pyramid is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    /// Digital elevation model.
    Elevation,
    /// Digital orthophoto (color imagery).
    Color,
}

impl Channel {
    /// Output directory name for this channel.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Channel::Elevation => "dem",
            Channel::Color => "dop",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Elevation => write!(f, "elevation"),
            Channel::Color => write!(f, "color"),
        }
    }
}

/// Georeferencing and dimensions of a raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterInfo {
    /// World-space extent.
    pub extent: Extent,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// World units per pixel (square pixels).
    pub pixel_size: f64,
}

impl RasterInfo {
    /// Raster anchored at `origin` with square pixels.
    pub fn new(origin: WorldPoint, width: u32, height: u32, pixel_size: f64) -> Self {
        Self {
            extent: Extent::from_origin(origin, width, height, pixel_size),
            width,
            height,
            pixel_size,
        }
    }
}

/// A georeferenced raster dataset.
///
/// Implementations must be `Send + Sync` so sources can be inspected from
/// worker threads.
pub trait RasterSource<T: Sample>: Send + Sync {
    /// Human-readable name used in logs (usually the file name).
    fn name(&self) -> &str;

    /// Georeferencing and dimensions, available without decoding pixels.
    fn info(&self) -> &RasterInfo;

    /// Decode all pixels.
    fn read(&self) -> PyramidResult<Grid<T>>;

    /// Decode a window of pixels.
    fn read_window(&self, window: PixelWindow) -> PyramidResult<Grid<T>> {
        let info = self.info();
        if window.right() > info.width || window.bottom() > info.height {
            return Err(PyramidError::data(format!(
                "window {}x{}+{}+{} outside {} ({}x{})",
                window.width,
                window.height,
                window.x,
                window.y,
                self.name(),
                info.width,
                info.height
            )));
        }
        Ok(self.read()?.window(window))
    }
}

/// Min/max/mean statistics of an elevation source over a window.
///
/// # Errors
///
/// Returns a data error when the window contains no valid samples.
pub fn source_statistics(
    source: &dyn RasterSource<f32>,
    window: PixelWindow,
) -> PyramidResult<HeightStats> {
    let grid = source.read_window(window)?;
    height_stats(grid.as_slice()).ok_or_else(|| {
        PyramidError::data(format!(
            "no valid samples in {} window {}x{}+{}+{}",
            source.name(),
            window.width,
            window.height,
            window.x,
            window.y
        ))
    })
}

/// In-memory raster with an explicit georeference.
#[derive(Debug, Clone)]
pub struct MemoryRaster<T> {
    name: String,
    info: RasterInfo,
    pixels: Grid<T>,
}

impl<T: Sample> MemoryRaster<T> {
    /// Wrap `pixels` anchored at `origin`.
    pub fn new(
        name: impl Into<String>,
        origin: WorldPoint,
        pixel_size: f64,
        pixels: Grid<T>,
    ) -> Self {
        Self {
            name: name.into(),
            info: RasterInfo::new(origin, pixels.width(), pixels.height(), pixel_size),
            pixels,
        }
    }
}

impl<T: Sample> RasterSource<T> for MemoryRaster<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> &RasterInfo {
        &self.info
    }

    fn read(&self) -> PyramidResult<Grid<T>> {
        Ok(self.pixels.clone())
    }

    fn read_window(&self, window: PixelWindow) -> PyramidResult<Grid<T>> {
        if window.right() > self.info.width || window.bottom() > self.info.height {
            return Err(PyramidError::data(format!(
                "window outside {} ({}x{})",
                self.name, self.info.width, self.info.height
            )));
        }
        Ok(self.pixels.window(window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_dir_names() {
        assert_eq!(Channel::Elevation.dir_name(), "dem");
        assert_eq!(Channel::Color.dir_name(), "dop");
        assert_eq!(Channel::Color.to_string(), "color");
    }

    #[test]
    fn test_memory_raster_info() {
        let raster = MemoryRaster::new(
            "a",
            WorldPoint::new(100.0, 50.0),
            0.5,
            Grid::<f32>::filled(4, 2, 1.0),
        );
        let info = raster.info();
        assert_eq!(info.extent.to_bbox(), [100.0, 49.0, 102.0, 50.0]);
        assert_eq!((info.width, info.height), (4, 2));
    }

    #[test]
    fn test_source_statistics_window() {
        let grid = Grid::from_vec(2, 2, vec![1.0, 2.0, f32::NAN, 10.0]).unwrap();
        let raster = MemoryRaster::new("s", WorldPoint::new(0.0, 0.0), 1.0, grid);
        let stats = source_statistics(&raster, PixelWindow::new(0, 0, 2, 2)).unwrap();
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 10.0);
    }

    #[test]
    fn test_source_statistics_all_nodata_is_data_error() {
        let raster = MemoryRaster::new(
            "empty",
            WorldPoint::new(0.0, 0.0),
            1.0,
            Grid::<f32>::nodata(2, 2),
        );
        let err = source_statistics(&raster, PixelWindow::new(0, 0, 1, 1)).unwrap_err();
        assert!(err.is_data_error());
    }

    #[test]
    fn test_read_window_out_of_bounds() {
        let raster = MemoryRaster::new(
            "small",
            WorldPoint::new(0.0, 0.0),
            1.0,
            Grid::<f32>::filled(2, 2, 0.0),
        );
        assert!(raster.read_window(PixelWindow::new(1, 1, 2, 2)).is_err());
    }
}

//! Slicing a cropped mosaic into one level's tile grid.
//!
//! Every level is cut directly from the cropped mosaic, never from a
//! previously reduced level. Cell `(x, y)` of an `n × n` level covers pixels
//! `[x·side/n, (x+1)·side/n)` of the mosaic on each axis, and its world bounds
//! come from a shared [`TileFrame`] so that every channel produces identical
//! bounding boxes for the same cell.
//!
//! Reduction to the canonical tile size is delegated to a [`TileSampler`]:
//! elevation uses [`HeightSampling`] (no interpolation), color uses
//! [`ColorSampler`] which resizes through the downsampler.

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use tracing::debug;

use crate::downsample::{resize_to_canonical, ResampleFilter};
use crate::error::{PyramidError, PyramidResult};
use crate::extent::{Extent, WorldPoint};
use crate::mosaic::Mosaic;
use crate::planner::LevelGeometry;
use crate::raster::{Grid, PixelWindow, Rgb, Sample};
use crate::tile::{Tile, TileKey};

/// World-space frame the tile grid is laid over.
///
/// Taken from the cropped elevation mosaic and reused for the color channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileFrame {
    pub origin: WorldPoint,
    pub pixel_size: f64,
    pub side_px: u32,
}

impl TileFrame {
    /// Frame of a cropped square mosaic.
    pub fn of<T: Sample>(mosaic: &Mosaic<T>) -> Self {
        Self {
            origin: mosaic.extent().origin,
            pixel_size: mosaic.pixel_size(),
            side_px: mosaic.width(),
        }
    }

    pub fn extent(&self) -> Extent {
        Extent::from_origin(self.origin, self.side_px, self.side_px, self.pixel_size)
    }

    /// World bounds of a cell.
    ///
    /// Both edges are computed as `origin + k × pixel_size` for integer `k`,
    /// so neighbouring cells share their edge coordinates exactly and the last
    /// cell ends on the frame's edge.
    pub fn cell_extent(&self, geometry: &LevelGeometry, x: u32, y: u32) -> Extent {
        let w = geometry.window_px as f64;
        let ps = self.pixel_size;
        let (x0, x1) = (x as f64 * w, (x + 1) as f64 * w);
        let (y0, y1) = (y as f64 * w, (y + 1) as f64 * w);
        Extent {
            origin: WorldPoint::new(self.origin.x + x0 * ps, self.origin.y - y0 * ps),
            opposite: WorldPoint::new(self.origin.x + x1 * ps, self.origin.y - y1 * ps),
        }
    }
}

/// Pixel window of cell `(x, y)` in a mosaic of `width × height` pixels split
/// into `n × n` cells.
pub fn cell_window(width: u32, height: u32, n: u32, x: u32, y: u32) -> PixelWindow {
    let edge = |side: u32, i: u32| ((side as u64 * i as u64) / n as u64) as u32;
    let (x0, x1) = (edge(width, x), edge(width, x + 1));
    let (y0, y1) = (edge(height, y), edge(height, y + 1));
    PixelWindow::new(x0, y0, x1 - x0, y1 - y0)
}

/// Reduces a mosaic window to a tile buffer.
pub trait TileSampler<T: Sample>: Send + Sync {
    /// Produce the tile for `window` of `source`.
    fn sample(&self, source: &Grid<T>, window: PixelWindow, tile_px: u32) -> Grid<T>;

    /// Output side for a window of `window_px` pixels.
    fn output_px(&self, _window_px: u32, tile_px: u32) -> u32 {
        tile_px
    }
}

/// How elevation windows larger than the tile are reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeightSampling {
    /// Take the top-left sample of each block.
    #[default]
    Decimate,
    /// Mean of the valid samples of each block.
    BoxAverage,
    /// Keep the full window; coarse tiles are larger than `tile_px`.
    Native,
}

impl HeightSampling {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeightSampling::Decimate => "decimate",
            HeightSampling::BoxAverage => "box-average",
            HeightSampling::Native => "native",
        }
    }
}

impl fmt::Display for HeightSampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HeightSampling {
    type Err = PyramidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "decimate" | "nearest" => Ok(HeightSampling::Decimate),
            "box-average" | "box" | "average" => Ok(HeightSampling::BoxAverage),
            "native" => Ok(HeightSampling::Native),
            other => Err(PyramidError::config(format!(
                "unknown height sampling '{}'",
                other
            ))),
        }
    }
}

/// Start of block `i` when `len` pixels are split into `parts` blocks.
#[inline]
fn block_start(len: u32, parts: u32, i: u32) -> u32 {
    ((len as u64 * i as u64) / parts as u64) as u32
}

impl TileSampler<f32> for HeightSampling {
    fn sample(&self, source: &Grid<f32>, window: PixelWindow, tile_px: u32) -> Grid<f32> {
        let out_px = self.output_px(window.width, tile_px);
        if *self == HeightSampling::Native || (window.width == out_px && window.height == out_px) {
            return source.window(window);
        }

        let mut out = Grid::nodata(out_px, out_px);
        for j in 0..out_px {
            let sy0 = window.y + block_start(window.height, out_px, j);
            let sy1 = (window.y + block_start(window.height, out_px, j + 1)).max(sy0 + 1);
            for i in 0..out_px {
                let sx0 = window.x + block_start(window.width, out_px, i);
                let value = match self {
                    HeightSampling::BoxAverage => {
                        let sx1 =
                            (window.x + block_start(window.width, out_px, i + 1)).max(sx0 + 1);
                        block_mean(source, sx0, sx1, sy0, sy1)
                    }
                    _ => source.get(sx0, sy0),
                };
                out.set(i, j, value);
            }
        }
        out
    }

    fn output_px(&self, window_px: u32, tile_px: u32) -> u32 {
        match self {
            HeightSampling::Native => window_px,
            _ => tile_px,
        }
    }
}

fn block_mean(source: &Grid<f32>, x0: u32, x1: u32, y0: u32, y1: u32) -> f32 {
    let mut sum = 0.0f64;
    let mut count = 0u32;
    for y in y0..y1 {
        for &v in &source.row(y)[x0 as usize..x1 as usize] {
            if !v.is_nodata() {
                sum += v as f64;
                count += 1;
            }
        }
    }
    if count == 0 {
        f32::NAN
    } else {
        (sum / count as f64) as f32
    }
}

/// Color sampler: extract the window and resize it with a smooth filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorSampler {
    pub filter: ResampleFilter,
}

impl ColorSampler {
    pub fn new(filter: ResampleFilter) -> Self {
        Self { filter }
    }
}

impl TileSampler<Rgb> for ColorSampler {
    fn sample(&self, source: &Grid<Rgb>, window: PixelWindow, tile_px: u32) -> Grid<Rgb> {
        resize_to_canonical(source.window(window), tile_px, self.filter)
    }
}

/// Builds the tiles of one level from a cropped mosaic.
pub struct LevelBuilder<'a, T> {
    mosaic: &'a Mosaic<T>,
    frame: TileFrame,
    tile_px: u32,
}

impl<'a, T: Sample> LevelBuilder<'a, T> {
    /// Builder over `mosaic`, laying tiles out on `frame`.
    ///
    /// # Errors
    ///
    /// Returns a data error if the mosaic is empty.
    pub fn new(mosaic: &'a Mosaic<T>, frame: TileFrame, tile_px: u32) -> PyramidResult<Self> {
        if mosaic.width() == 0 || mosaic.height() == 0 {
            return Err(PyramidError::data(format!(
                "{} mosaic is empty",
                mosaic.channel()
            )));
        }
        Ok(Self {
            mosaic,
            frame,
            tile_px,
        })
    }

    /// Extract every tile of `geometry` in parallel.
    ///
    /// Tiles are returned in row-major order.
    ///
    /// # Errors
    ///
    /// Returns a data error if the mosaic has fewer pixels per axis than the
    /// level has tiles, which would leave cells empty.
    pub fn build_level<S>(
        &self,
        geometry: &LevelGeometry,
        sampler: &S,
    ) -> PyramidResult<Vec<Tile<T>>>
    where
        S: TileSampler<T>,
    {
        let n = geometry.tiles_per_axis;
        if self.mosaic.width() < n || self.mosaic.height() < n {
            return Err(PyramidError::data(format!(
                "{} mosaic {}x{} px is too small for {} tiles per axis at level {}",
                self.mosaic.channel(),
                self.mosaic.width(),
                self.mosaic.height(),
                n,
                geometry.level
            )));
        }

        debug!(
            channel = %self.mosaic.channel(),
            level = geometry.level,
            tiles_per_axis = n,
            window_px = geometry.window_px,
            "Extracting level"
        );

        let cells: Vec<(u32, u32)> = geometry.cells().collect();
        let pixels = self.mosaic.pixels();
        let tiles = cells
            .par_iter()
            .map(|&(x, y)| {
                let window = cell_window(pixels.width(), pixels.height(), n, x, y);
                Tile {
                    key: TileKey::new(geometry.level, x, y),
                    extent: self.frame.cell_extent(geometry, x, y),
                    pixels: sampler.sample(pixels, window, self.tile_px),
                }
            })
            .collect();
        Ok(tiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::PyramidPlan;
    use crate::raster::Channel;

    fn ramp_mosaic(side: u32) -> Mosaic<f32> {
        let data = (0..side * side).map(|v| v as f32).collect();
        Mosaic::new(
            Channel::Elevation,
            WorldPoint::new(1000.0, 2000.0),
            2.0,
            Grid::from_vec(side, side, data).unwrap(),
        )
    }

    #[test]
    fn test_cell_window_even_split() {
        assert_eq!(cell_window(8, 8, 2, 1, 1), PixelWindow::new(4, 4, 4, 4));
    }

    #[test]
    fn test_cell_window_uneven_split_covers_everything() {
        let widths: u32 = (0..3).map(|x| cell_window(10, 10, 3, x, 0).width).sum();
        assert_eq!(widths, 10);
        assert_eq!(cell_window(10, 10, 3, 2, 0).right(), 10);
    }

    #[test]
    fn test_frame_cell_extents_tile_the_frame() {
        let mosaic = ramp_mosaic(8);
        let frame = TileFrame::of(&mosaic);
        let plan = PyramidPlan::new(8, 8, 2, None).unwrap();
        let geom = plan.level(2);

        let first = frame.cell_extent(&geom, 0, 0);
        let east = frame.cell_extent(&geom, 1, 0);
        let last = frame.cell_extent(&geom, 3, 3);
        assert_eq!(first.to_bbox(), [1000.0, 1996.0, 1004.0, 2000.0]);
        assert_eq!(first.max_x(), east.min_x());
        assert_eq!(last.max_x(), frame.extent().max_x());
        assert_eq!(last.min_y(), frame.extent().min_y());
    }

    #[test]
    fn test_build_level_row_major_and_decimated() {
        let mosaic = ramp_mosaic(8);
        let frame = TileFrame::of(&mosaic);
        let plan = PyramidPlan::new(8, 8, 2, None).unwrap();
        let builder = LevelBuilder::new(&mosaic, frame, 2).unwrap();

        let tiles = builder.build_level(&plan.level(1), &HeightSampling::Decimate).unwrap();
        assert_eq!(tiles.len(), 4);
        assert_eq!(tiles[1].key, TileKey::new(1, 1, 0));
        // Window 4x4 at (4, 0), stride 2.
        assert_eq!(tiles[1].pixels.as_slice(), &[4.0, 6.0, 20.0, 22.0]);
    }

    #[test]
    fn test_box_average_ignores_nodata() {
        let grid = Grid::from_vec(2, 2, vec![1.0, f32::NAN, 3.0, 5.0]).unwrap();
        let out = HeightSampling::BoxAverage.sample(&grid, grid.bounds(), 1);
        assert_eq!(out.as_slice(), &[3.0]);

        let empty = Grid::<f32>::nodata(2, 2);
        let out = HeightSampling::BoxAverage.sample(&empty, empty.bounds(), 1);
        assert!(out.get(0, 0).is_nan());
    }

    #[test]
    fn test_native_keeps_window() {
        let mosaic = ramp_mosaic(8);
        let frame = TileFrame::of(&mosaic);
        let plan = PyramidPlan::new(8, 8, 2, None).unwrap();
        let builder = LevelBuilder::new(&mosaic, frame, 2).unwrap();
        let tiles = builder.build_level(&plan.level(1), &HeightSampling::Native).unwrap();
        assert_eq!(tiles[0].pixels.width(), 4);
    }

    #[test]
    fn test_finest_level_is_exact_copy() {
        let mosaic = ramp_mosaic(4);
        let frame = TileFrame::of(&mosaic);
        let plan = PyramidPlan::new(4, 4, 2, None).unwrap();
        let builder = LevelBuilder::new(&mosaic, frame, 2).unwrap();
        let tiles = builder.build_level(&plan.level(1), &HeightSampling::BoxAverage).unwrap();
        assert_eq!(tiles[3].pixels.as_slice(), &[10.0, 11.0, 14.0, 15.0]);
    }

    #[test]
    fn test_color_tiles_share_elevation_bbox() {
        let elevation = ramp_mosaic(8);
        let frame = TileFrame::of(&elevation);
        let color = Mosaic::new(
            Channel::Color,
            WorldPoint::new(1000.0, 2000.0),
            1.0,
            Grid::filled(16, 16, [5u8, 5, 5]),
        );
        let plan = PyramidPlan::new(8, 8, 2, None).unwrap();
        let geom = plan.level(1);

        let dem = LevelBuilder::new(&elevation, frame, 2)
            .unwrap()
            .build_level(&geom, &HeightSampling::Decimate)
            .unwrap();
        let dop = LevelBuilder::new(&color, frame, 2)
            .unwrap()
            .build_level(&geom, &ColorSampler::default())
            .unwrap();

        for (a, b) in dem.iter().zip(dop.iter()) {
            assert_eq!(a.bbox(), b.bbox());
            assert_eq!(a.id(), b.id());
        }
        assert_eq!(dop[0].pixels.width(), 2);
    }

    #[test]
    fn test_mosaic_smaller_than_grid_rejected() {
        let color = Mosaic::new(
            Channel::Color,
            WorldPoint::new(0.0, 0.0),
            1.0,
            Grid::filled(1, 1, [0u8, 0, 0]),
        );
        let frame = TileFrame::of(&color);
        let geom = LevelGeometry {
            level: 1,
            tiles_per_axis: 2,
            window_px: 1,
        };
        let builder = LevelBuilder::new(&color, frame, 2).unwrap();
        assert!(builder
            .build_level(&geom, &ColorSampler::default())
            .unwrap_err()
            .is_data_error());
    }

    #[test]
    fn test_height_sampling_from_str() {
        assert_eq!("box".parse::<HeightSampling>().unwrap(), HeightSampling::BoxAverage);
        assert!("bicubic".parse::<HeightSampling>().is_err());
    }
}

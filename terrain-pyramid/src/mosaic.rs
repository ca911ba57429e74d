//! Combining source rasters into one logical surface per channel.
//!
//! # Overlaps
//!
//! Sources are copied in the order they are given and later sources overwrite
//! earlier ones where they overlap. Callers choose that order explicitly with
//! [`MergeOrder`]; directory listing order is never relied on.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::error::{PyramidError, PyramidResult};
use crate::extent::{Extent, WorldPoint};
use crate::raster::{Channel, Grid, PixelWindow, RasterInfo, RasterSource, Sample};

/// Relative tolerance when comparing pixel sizes of different sources.
const PIXEL_SIZE_TOLERANCE: f64 = 1e-9;

/// Order in which overlapping sources are layered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeOrder {
    /// Sort by file name ascending; the last name wins overlaps.
    #[default]
    NameAscending,
    /// Sort by file name descending; the first name wins overlaps.
    NameDescending,
}

impl MergeOrder {
    /// Arrange source paths in merge order.
    pub fn arrange(&self, paths: &mut [PathBuf]) {
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        if *self == MergeOrder::NameDescending {
            paths.reverse();
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MergeOrder::NameAscending => "name-ascending",
            MergeOrder::NameDescending => "name-descending",
        }
    }
}

impl FromStr for MergeOrder {
    type Err = PyramidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "name-ascending" | "ascending" | "asc" => Ok(MergeOrder::NameAscending),
            "name-descending" | "descending" | "desc" => Ok(MergeOrder::NameDescending),
            other => Err(PyramidError::config(format!("unknown merge order '{}'", other))),
        }
    }
}

/// A single logical raster surface for one channel.
#[derive(Debug, Clone)]
pub struct Mosaic<T> {
    channel: Channel,
    extent: Extent,
    pixel_size: f64,
    pixels: Grid<T>,
}

impl<T: Sample> Mosaic<T> {
    /// Wrap a pixel buffer anchored at `origin`.
    pub fn new(channel: Channel, origin: WorldPoint, pixel_size: f64, pixels: Grid<T>) -> Self {
        Self {
            channel,
            extent: Extent::from_origin(origin, pixels.width(), pixels.height(), pixel_size),
            pixel_size,
            pixels,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    /// World units per pixel.
    pub fn pixel_size(&self) -> f64 {
        self.pixel_size
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &Grid<T> {
        &self.pixels
    }
}

fn same_pixel_size(a: f64, b: f64) -> bool {
    (a - b).abs() <= a.abs().max(b.abs()) * PIXEL_SIZE_TOLERANCE
}

/// Union extent and shared pixel size of a set of sources.
///
/// Reads headers only, so planning can run without decoding pixels.
///
/// # Errors
///
/// Returns a data error if there are no sources or their pixel sizes differ.
pub fn union_extent(infos: &[RasterInfo]) -> PyramidResult<(Extent, f64)> {
    let first = infos
        .first()
        .ok_or_else(|| PyramidError::data("no source rasters to combine"))?;
    let pixel_size = first.pixel_size;

    let mut extent = first.extent;
    for info in &infos[1..] {
        if !same_pixel_size(info.pixel_size, pixel_size) {
            return Err(PyramidError::data(format!(
                "source pixel size {} differs from {}; sources must share one scale",
                info.pixel_size, pixel_size
            )));
        }
        extent = extent.union(&info.extent);
    }
    Ok((extent, pixel_size))
}

/// Pixel dimensions of `extent` at `pixel_size`.
pub fn pixel_dimensions(extent: &Extent, pixel_size: f64) -> (u32, u32) {
    (
        (extent.width() / pixel_size).round() as u32,
        (extent.height() / pixel_size).round() as u32,
    )
}

/// Merge `sources` into one mosaic.
///
/// The union extent spans every source; each source is copied at the pixel
/// offset of its top-left corner relative to the union's. Later sources
/// overwrite earlier ones where they overlap. Pixels covered by no source
/// hold the channel's no-data value.
pub fn combine<T, S>(sources: &[S], channel: Channel) -> PyramidResult<Mosaic<T>>
where
    T: Sample,
    S: RasterSource<T>,
{
    let infos: Vec<RasterInfo> = sources.iter().map(|s| *s.info()).collect();
    let (extent, pixel_size) = union_extent(&infos)?;
    let (width, height) = pixel_dimensions(&extent, pixel_size);

    info!(
        channel = %channel,
        sources = sources.len(),
        width,
        height,
        pixel_size,
        "Combining sources into mosaic"
    );

    let mut pixels = Grid::<T>::nodata(width, height);
    for source in sources {
        let info = source.info();
        let dx = ((info.extent.min_x() - extent.min_x()) / pixel_size).round() as i64;
        let dy = ((extent.max_y() - info.extent.max_y()) / pixel_size).round() as i64;
        debug!(source = source.name(), dx, dy, "Copying source into mosaic");
        pixels.blit(&source.read()?, dx, dy);
    }

    Ok(Mosaic {
        channel,
        extent: Extent::from_origin(extent.origin, width, height, pixel_size),
        pixel_size,
        pixels,
    })
}

/// Top-left `side_px × side_px` sub-window of `mosaic`.
///
/// # Errors
///
/// Returns a data error if `side_px` exceeds either dimension.
pub fn crop<T: Sample>(mosaic: &Mosaic<T>, side_px: u32) -> PyramidResult<Mosaic<T>> {
    if side_px > mosaic.width() || side_px > mosaic.height() {
        return Err(PyramidError::data(format!(
            "crop side {} px exceeds {} mosaic {}x{}",
            side_px,
            mosaic.channel,
            mosaic.width(),
            mosaic.height()
        )));
    }
    let pixels = mosaic.pixels.window(PixelWindow::square(0, 0, side_px));
    Ok(Mosaic::new(
        mosaic.channel,
        mosaic.extent.origin,
        mosaic.pixel_size,
        pixels,
    ))
}

/// Resample-free registration of `mosaic` onto `target`.
///
/// The result covers exactly `target` at the mosaic's own pixel size, taking
/// each pixel from the source pixel at the same world position (offsets are
/// rounded to whole pixels). Parts of `target` the mosaic does not cover are
/// filled with no-data.
pub fn crop_to_extent<T: Sample>(mosaic: &Mosaic<T>, target: &Extent) -> PyramidResult<Mosaic<T>> {
    let pixel_size = mosaic.pixel_size;
    let (width, height) = pixel_dimensions(target, pixel_size);
    if width == 0 || height == 0 {
        return Err(PyramidError::data(format!(
            "target extent is smaller than one {} pixel",
            mosaic.channel
        )));
    }

    let dx = ((mosaic.extent.min_x() - target.min_x()) / pixel_size).round() as i64;
    let dy = ((target.max_y() - mosaic.extent.max_y()) / pixel_size).round() as i64;

    let covered = dx <= 0
        && dy <= 0
        && dx + mosaic.width() as i64 >= width as i64
        && dy + mosaic.height() as i64 >= height as i64;
    if !covered {
        warn!(
            channel = %mosaic.channel,
            "Mosaic does not fully cover the target extent; uncovered pixels are no-data"
        );
    }

    let mut pixels = Grid::<T>::nodata(width, height);
    pixels.blit(&mosaic.pixels, dx, dy);

    Ok(Mosaic {
        channel: mosaic.channel,
        extent: *target,
        pixel_size,
        pixels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::MemoryRaster;

    fn source(name: &str, x: f64, y: f64, w: u32, h: u32, value: f32) -> MemoryRaster<f32> {
        MemoryRaster::new(name, WorldPoint::new(x, y), 1.0, Grid::filled(w, h, value))
    }

    #[test]
    fn test_combine_places_sources_by_world_offset() {
        // Two 2x2 sources side by side, the second one row lower.
        let a = source("a", 0.0, 10.0, 2, 2, 1.0);
        let b = source("b", 2.0, 9.0, 2, 2, 2.0);
        let mosaic = combine(&[a, b], Channel::Elevation).unwrap();

        assert_eq!((mosaic.width(), mosaic.height()), (4, 3));
        assert_eq!(mosaic.extent().to_bbox(), [0.0, 7.0, 4.0, 10.0]);
        let px = mosaic.pixels();
        assert_eq!(px.get(0, 0), 1.0);
        assert!(px.get(2, 0).is_nan());
        assert_eq!(px.get(2, 1), 2.0);
        assert!(px.get(0, 2).is_nan());
        assert_eq!(px.get(3, 2), 2.0);
    }

    #[test]
    fn test_combine_last_writer_wins() {
        let a = source("a", 0.0, 2.0, 2, 2, 1.0);
        let b = source("b", 1.0, 2.0, 2, 2, 5.0);
        let mosaic = combine(&[a.clone(), b.clone()], Channel::Elevation).unwrap();
        assert_eq!(mosaic.pixels().get(1, 0), 5.0);

        let mosaic = combine(&[b, a], Channel::Elevation).unwrap();
        assert_eq!(mosaic.pixels().get(1, 0), 1.0);
    }

    #[test]
    fn test_combine_rejects_mixed_pixel_sizes() {
        let a = source("a", 0.0, 2.0, 2, 2, 1.0);
        let b = MemoryRaster::new("b", WorldPoint::new(2.0, 2.0), 0.5, Grid::filled(2, 2, 1.0));
        let err = combine(&[a, b], Channel::Elevation).unwrap_err();
        assert!(err.is_data_error());
    }

    #[test]
    fn test_combine_empty() {
        let sources: Vec<MemoryRaster<f32>> = Vec::new();
        assert!(combine(&sources, Channel::Elevation).is_err());
    }

    #[test]
    fn test_crop_shrinks_extent() {
        let a = MemoryRaster::new(
            "a",
            WorldPoint::new(100.0, 100.0),
            2.0,
            Grid::filled(5, 4, 3.0f32),
        );
        let mosaic = combine(&[a], Channel::Elevation).unwrap();
        let cropped = crop(&mosaic, 3).unwrap();
        assert_eq!((cropped.width(), cropped.height()), (3, 3));
        assert_eq!(cropped.extent().to_bbox(), [100.0, 94.0, 106.0, 100.0]);
        assert_eq!(cropped.pixel_size(), 2.0);
    }

    #[test]
    fn test_crop_too_large() {
        let a = source("a", 0.0, 0.0, 4, 2, 0.0);
        let mosaic = combine(&[a], Channel::Elevation).unwrap();
        assert!(crop(&mosaic, 3).unwrap_err().is_data_error());
    }

    #[test]
    fn test_crop_to_extent_finer_channel() {
        // Color at half the pixel size, covering more than the target.
        let grid = Grid::from_vec(6, 6, (0..36u8).map(|v| [v, 0, 0]).collect()).unwrap();
        let color = Mosaic::new(Channel::Color, WorldPoint::new(-1.0, 11.0), 0.5, grid);
        let target = Extent::from_bounds(0.0, 9.0, 2.0, 11.0).unwrap();

        let registered = crop_to_extent(&color, &target).unwrap();
        assert_eq!((registered.width(), registered.height()), (4, 4));
        assert_eq!(registered.extent(), &target);
        // Target min_x = 0.0 is two color pixels right of the mosaic origin.
        assert_eq!(registered.pixels().get(0, 0), [2, 0, 0]);
        assert_eq!(registered.pixels().get(3, 3), [23, 0, 0]);
    }

    #[test]
    fn test_crop_to_extent_fills_uncovered() {
        let a = source("a", 0.0, 2.0, 2, 2, 4.0);
        let mosaic = combine(&[a], Channel::Elevation).unwrap();
        let target = Extent::from_bounds(0.0, -1.0, 3.0, 2.0).unwrap();
        let registered = crop_to_extent(&mosaic, &target).unwrap();
        assert_eq!(registered.pixels().get(1, 1), 4.0);
        assert!(registered.pixels().get(2, 0).is_nan());
        assert!(registered.pixels().get(0, 2).is_nan());
    }

    #[test]
    fn test_merge_order_arrange() {
        let mut paths = vec![
            PathBuf::from("/d/b.tif"),
            PathBuf::from("/d/a.tif"),
            PathBuf::from("/d/c.tif"),
        ];
        MergeOrder::NameAscending.arrange(&mut paths);
        assert_eq!(paths[0], PathBuf::from("/d/a.tif"));
        MergeOrder::NameDescending.arrange(&mut paths);
        assert_eq!(paths[0], PathBuf::from("/d/c.tif"));
    }

    #[test]
    fn test_merge_order_from_str() {
        assert_eq!("desc".parse::<MergeOrder>().unwrap(), MergeOrder::NameDescending);
        assert_eq!(
            "name-ascending".parse::<MergeOrder>().unwrap(),
            MergeOrder::NameAscending
        );
        assert!("random".parse::<MergeOrder>().is_err());
    }
}

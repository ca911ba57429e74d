//! File-backed rasters decoded with the `image` crate.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use tracing::debug;

use super::grid::{Grid, Rgb};
use super::world_file::find_world_file;
use super::{RasterInfo, RasterSource};
use crate::error::{PyramidError, PyramidResult};

/// Linear mapping from stored elevation samples to world heights.
///
/// `height = offset + scale × sample`. Samples equal to `nodata` (before
/// scaling) and fully transparent pixels become no-data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationEncoding {
    pub scale: f64,
    pub offset: f64,
    pub nodata: Option<f64>,
}

impl Default for ElevationEncoding {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
            nodata: None,
        }
    }
}

impl ElevationEncoding {
    /// Convert a raw sample to a height.
    #[inline]
    pub fn decode(&self, raw: f32) -> f32 {
        if raw.is_nan() || self.nodata.is_some_and(|nd| raw as f64 == nd) {
            return f32::NAN;
        }
        (self.offset + self.scale * raw as f64) as f32
    }
}

/// A raster file with a world-file sidecar.
///
/// Opening only reads the image header and the sidecar; pixels are decoded by
/// [`RasterSource::read`]. The same file can be read as elevation (`f32`) or
/// color ([`Rgb`]).
#[derive(Debug, Clone)]
pub struct ImageRaster {
    path: PathBuf,
    name: String,
    info: RasterInfo,
    encoding: ElevationEncoding,
}

impl ImageRaster {
    /// Open a raster with the default elevation encoding.
    pub fn open(path: impl Into<PathBuf>) -> PyramidResult<Self> {
        Self::open_with_encoding(path, ElevationEncoding::default())
    }

    /// Open a raster whose elevation samples use `encoding`.
    pub fn open_with_encoding(
        path: impl Into<PathBuf>,
        encoding: ElevationEncoding,
    ) -> PyramidResult<Self> {
        let path = path.into();
        let (width, height) =
            image::image_dimensions(&path).map_err(|source| PyramidError::OpenRaster {
                path: path.clone(),
                source,
            })?;
        let world = find_world_file(&path)?;
        let pixel_size = world.pixel_size().map_err(|e| {
            PyramidError::data(format!("{}: {}", path.display(), e))
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        debug!(
            raster = %name,
            width,
            height,
            pixel_size,
            origin_x = world.origin().x,
            origin_y = world.origin().y,
            "Opened raster"
        );

        Ok(Self {
            info: RasterInfo::new(world.origin(), width, height, pixel_size),
            path,
            name,
            encoding,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Georeferencing from the header and sidecar, without decoding pixels.
    pub fn info(&self) -> &RasterInfo {
        &self.info
    }

    fn decode(&self) -> PyramidResult<DynamicImage> {
        let image = image::open(&self.path).map_err(|source| PyramidError::OpenRaster {
            path: self.path.clone(),
            source,
        })?;
        if image.width() != self.info.width || image.height() != self.info.height {
            return Err(PyramidError::data(format!(
                "{} changed size since it was opened",
                self.path.display()
            )));
        }
        Ok(image)
    }
}

/// Raw single-band samples of a decoded image, NaN where alpha is zero.
fn raw_heights(image: DynamicImage) -> Vec<f32> {
    match image {
        DynamicImage::ImageLuma8(buf) => buf.into_raw().into_iter().map(f32::from).collect(),
        DynamicImage::ImageLuma16(buf) => buf.into_raw().into_iter().map(f32::from).collect(),
        DynamicImage::ImageLumaA8(buf) => buf
            .pixels()
            .map(|p| if p.0[1] == 0 { f32::NAN } else { f32::from(p.0[0]) })
            .collect(),
        DynamicImage::ImageLumaA16(buf) => buf
            .pixels()
            .map(|p| if p.0[1] == 0 { f32::NAN } else { f32::from(p.0[0]) })
            .collect(),
        DynamicImage::ImageRgb32F(buf) => buf.pixels().map(|p| p.0[0]).collect(),
        DynamicImage::ImageRgba32F(buf) => buf
            .pixels()
            .map(|p| if p.0[3] == 0.0 { f32::NAN } else { p.0[0] })
            .collect(),
        other => other.to_luma16().into_raw().into_iter().map(f32::from).collect(),
    }
}

impl RasterSource<f32> for ImageRaster {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> &RasterInfo {
        &self.info
    }

    fn read(&self) -> PyramidResult<Grid<f32>> {
        let heights: Vec<f32> = raw_heights(self.decode()?)
            .into_iter()
            .map(|raw| self.encoding.decode(raw))
            .collect();
        Grid::from_vec(self.info.width, self.info.height, heights).ok_or_else(|| {
            PyramidError::data(format!("unexpected sample count in {}", self.name))
        })
    }
}

impl RasterSource<Rgb> for ImageRaster {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> &RasterInfo {
        &self.info
    }

    fn read(&self) -> PyramidResult<Grid<Rgb>> {
        Ok(Grid::from_rgb_image(&self.decode()?.to_rgb8()))
    }
}

/// Find raster files in `dir` with one of `extensions`, sorted by file name.
///
/// # Errors
///
/// Returns a data error if the directory holds no matching rasters.
pub fn discover_sources(dir: &Path, extensions: &[String]) -> PyramidResult<Vec<PathBuf>> {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let mut files = Vec::new();

    for ext in extensions {
        let pattern = format!("{}/*.{}", escaped, ext.trim_start_matches('.'));
        let paths = glob::glob(&pattern).map_err(|e| {
            PyramidError::config(format!("invalid source pattern '{}': {}", pattern, e))
        })?;
        files.extend(paths.filter_map(Result::ok).filter(|p| p.is_file()));
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    files.dedup();

    if files.is_empty() {
        return Err(PyramidError::data(format!(
            "no rasters matching {:?} found in {}",
            extensions,
            dir.display()
        )));
    }

    debug!(dir = %dir.display(), count = files.len(), "Discovered source rasters");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, LumaA, Rgb as RgbPixel};

    fn write_world_file(path: &Path, pixel: f64, x: f64, y: f64) {
        let text = format!(
            "{}\n0.0\n0.0\n{}\n{}\n{}\n",
            pixel,
            -pixel,
            x + pixel / 2.0,
            y - pixel / 2.0
        );
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn test_encoding_decode() {
        let enc = ElevationEncoding {
            scale: 0.1,
            offset: -100.0,
            nodata: Some(0.0),
        };
        assert!((enc.decode(1500.0) - 50.0).abs() < 1e-4);
        assert!(enc.decode(0.0).is_nan());
        assert!(enc.decode(f32::NAN).is_nan());
    }

    #[test]
    fn test_open_and_read_luma16_elevation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dem.png");
        let img = ImageBuffer::from_fn(4, 2, |x, y| Luma([(x + 10 * y) as u16 * 100]));
        img.save(&path).unwrap();
        write_world_file(&dir.path().join("dem.pgw"), 2.0, 1000.0, 500.0);

        let raster = ImageRaster::open(&path).unwrap();
        let info = *raster.info();
        assert_eq!(info.extent.to_bbox(), [1000.0, 496.0, 1008.0, 500.0]);
        assert_eq!(info.pixel_size, 2.0);

        let grid: Grid<f32> = raster.read().unwrap();
        assert_eq!(grid.get(3, 0), 300.0);
        assert_eq!(grid.get(1, 1), 1100.0);
    }

    #[test]
    fn test_transparent_elevation_is_nodata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holes.png");
        let img = ImageBuffer::from_fn(2, 1, |x, _| LumaA([50u8, if x == 0 { 0 } else { 255 }]));
        img.save(&path).unwrap();
        write_world_file(&dir.path().join("holes.pgw"), 1.0, 0.0, 0.0);

        let raster = ImageRaster::open(&path).unwrap();
        let grid: Grid<f32> = raster.read().unwrap();
        assert!(grid.get(0, 0).is_nan());
        assert_eq!(grid.get(1, 0), 50.0);
    }

    #[test]
    fn test_read_color() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ortho.png");
        let img = ImageBuffer::from_pixel(3, 3, RgbPixel([10u8, 20, 30]));
        img.save(&path).unwrap();
        write_world_file(&dir.path().join("ortho.wld"), 0.5, 0.0, 10.0);

        let raster = ImageRaster::open(&path).unwrap();
        let grid: Grid<Rgb> = raster.read().unwrap();
        assert_eq!(grid.get(2, 2), [10, 20, 30]);
    }

    #[test]
    fn test_open_without_world_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.png");
        ImageBuffer::from_pixel(1, 1, Luma([0u8])).save(&path).unwrap();
        assert!(ImageRaster::open(&path).unwrap_err().is_data_error());
    }

    #[test]
    fn test_open_missing_file_fails() {
        let err = ImageRaster::open("/nonexistent/nothing.png").unwrap_err();
        assert!(matches!(err, PyramidError::OpenRaster { .. }));
    }

    #[test]
    fn test_discover_sources_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.png", "c.tif", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let exts = vec!["png".to_string(), "tif".to_string()];
        let files = discover_sources(dir.path(), &exts).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.tif"]);
    }

    #[test]
    fn test_discover_sources_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_sources(dir.path(), &["tif".to_string()]).unwrap_err();
        assert!(err.is_data_error());
    }
}

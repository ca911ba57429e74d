//! Build configuration.
//!
//! [`PyramidConfig`] holds everything one build needs. It can be assembled in
//! code with the `with_*` builder methods or loaded from an INI file through
//! [`ConfigFile`].

mod file;

pub use file::{default_config_path, ConfigFile, LoggingSettings};

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::downsample::ResampleFilter;
use crate::encode::{JpegTileEncoder, PngTileEncoder, TileEncoder, DEFAULT_JPEG_QUALITY};
use crate::error::{PyramidError, PyramidResult};
use crate::level::HeightSampling;
use crate::mosaic::MergeOrder;
use crate::planner::MAX_LEVELS;
use crate::raster::ElevationEncoding;

/// Default canonical tile size in pixels.
pub const DEFAULT_TILE_PX: u32 = 512;

/// Default number of columns/rows shared between neighbouring tiles.
pub const DEFAULT_SEAM_OVERLAP_PX: u32 = 1;

/// Default source file extensions.
pub const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &["tif", "tiff", "png", "jpg", "jpeg"];

/// File format of color tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorFormat {
    #[default]
    Png,
    Jpeg {
        quality: u8,
    },
}

impl ColorFormat {
    /// Encoder for this format.
    pub fn encoder(&self) -> PyramidResult<Arc<dyn TileEncoder>> {
        let encoder: Arc<dyn TileEncoder> = match self {
            ColorFormat::Png => Arc::new(PngTileEncoder::new()),
            ColorFormat::Jpeg { quality } => Arc::new(JpegTileEncoder::new(*quality)?),
        };
        Ok(encoder)
    }
}

impl fmt::Display for ColorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorFormat::Png => write!(f, "png"),
            ColorFormat::Jpeg { .. } => write!(f, "jpeg"),
        }
    }
}

impl FromStr for ColorFormat {
    type Err = PyramidError;

    /// Parses `png`, `jpeg`/`jpg`, or `jpeg:<quality>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let (name, quality) = match lower.split_once(':') {
            Some((name, q)) => {
                let quality = q.trim().parse::<u8>().map_err(|_| {
                    PyramidError::config(format!("invalid JPEG quality '{}'", q))
                })?;
                (name.to_string(), Some(quality))
            }
            None => (lower, None),
        };
        match name.as_str() {
            "png" if quality.is_none() => Ok(ColorFormat::Png),
            "jpeg" | "jpg" => Ok(ColorFormat::Jpeg {
                quality: quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            }),
            _ => Err(PyramidError::config(format!("unknown color format '{}'", s))),
        }
    }
}

/// Configuration for one pyramid build.
#[derive(Debug, Clone, PartialEq)]
pub struct PyramidConfig {
    /// Directory of elevation source rasters.
    pub elevation_dir: PathBuf,

    /// Directory of color source rasters. Without it only elevation tiles
    /// are produced.
    pub color_dir: Option<PathBuf>,

    /// Output root.
    pub output_dir: PathBuf,

    /// Canonical tile size in pixels.
    pub tile_px: u32,

    /// Replaces the computed pyramid depth when set.
    pub max_levels: Option<u32>,

    /// Columns/rows copied across each elevation seam.
    pub seam_overlap_px: u32,

    pub height_sampling: HeightSampling,

    pub color_filter: ResampleFilter,

    pub color_format: ColorFormat,

    /// Conversion of stored elevation samples to heights.
    pub elevation_encoding: ElevationEncoding,

    /// Layering of overlapping sources.
    pub merge_order: MergeOrder,

    /// Source file extensions, without dots.
    pub source_extensions: Vec<String>,

    /// Worker threads; the global rayon pool when unset.
    pub threads: Option<usize>,

    /// CRS label copied into the manifest.
    pub srs: Option<String>,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            elevation_dir: PathBuf::from("data/dem"),
            color_dir: None,
            output_dir: PathBuf::from("output"),
            tile_px: DEFAULT_TILE_PX,
            max_levels: None,
            seam_overlap_px: DEFAULT_SEAM_OVERLAP_PX,
            height_sampling: HeightSampling::default(),
            color_filter: ResampleFilter::default(),
            color_format: ColorFormat::default(),
            elevation_encoding: ElevationEncoding::default(),
            merge_order: MergeOrder::default(),
            source_extensions: DEFAULT_SOURCE_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            threads: None,
            srs: None,
        }
    }
}

impl PyramidConfig {
    /// Configuration reading elevation from `elevation_dir` and writing to
    /// `output_dir`.
    pub fn new(elevation_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            elevation_dir: elevation_dir.into(),
            output_dir: output_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_color_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.color_dir = Some(dir.into());
        self
    }

    pub fn with_tile_px(mut self, tile_px: u32) -> Self {
        self.tile_px = tile_px;
        self
    }

    pub fn with_max_levels(mut self, levels: u32) -> Self {
        self.max_levels = Some(levels);
        self
    }

    pub fn with_seam_overlap_px(mut self, overlap: u32) -> Self {
        self.seam_overlap_px = overlap;
        self
    }

    pub fn with_height_sampling(mut self, sampling: HeightSampling) -> Self {
        self.height_sampling = sampling;
        self
    }

    pub fn with_color_filter(mut self, filter: ResampleFilter) -> Self {
        self.color_filter = filter;
        self
    }

    pub fn with_color_format(mut self, format: ColorFormat) -> Self {
        self.color_format = format;
        self
    }

    pub fn with_elevation_encoding(mut self, encoding: ElevationEncoding) -> Self {
        self.elevation_encoding = encoding;
        self
    }

    pub fn with_merge_order(mut self, order: MergeOrder) -> Self {
        self.merge_order = order;
        self
    }

    pub fn with_source_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_srs(mut self, srs: impl Into<String>) -> Self {
        self.srs = Some(srs.into());
        self
    }

    /// Check values that would make a build impossible.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first invalid value.
    pub fn validate(&self) -> PyramidResult<()> {
        if self.tile_px == 0 {
            return Err(PyramidError::config("tile_px must be greater than zero"));
        }
        if let Some(levels) = self.max_levels {
            if levels == 0 || levels > MAX_LEVELS {
                return Err(PyramidError::config(format!(
                    "max_levels must be between 1 and {}, got {}",
                    MAX_LEVELS, levels
                )));
            }
        }
        if self.seam_overlap_px > self.tile_px / 2 {
            return Err(PyramidError::config(format!(
                "seam_overlap_px {} must not exceed half the tile size ({})",
                self.seam_overlap_px,
                self.tile_px / 2
            )));
        }
        if let ColorFormat::Jpeg { quality } = self.color_format {
            if !(1..=100).contains(&quality) {
                return Err(PyramidError::config(format!(
                    "JPEG quality must be 1-100, got {}",
                    quality
                )));
            }
        }
        let enc = &self.elevation_encoding;
        if !enc.scale.is_finite() || enc.scale == 0.0 || !enc.offset.is_finite() {
            return Err(PyramidError::config(format!(
                "invalid elevation encoding scale {} offset {}",
                enc.scale, enc.offset
            )));
        }
        if self.source_extensions.iter().all(|e| e.trim().is_empty()) {
            return Err(PyramidError::config("no source file extensions configured"));
        }
        if self.threads == Some(0) {
            return Err(PyramidError::config("threads must be greater than zero"));
        }
        if self.color_dir.as_ref() == Some(&self.elevation_dir) {
            return Err(PyramidError::config(
                "elevation and color sources must be in different directories",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PyramidConfig::default();
        assert_eq!(config.tile_px, 512);
        assert_eq!(config.seam_overlap_px, 1);
        assert!(config.color_dir.is_none());
        assert_eq!(config.source_extensions.len(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = PyramidConfig::new("/data/dem", "/out")
            .with_color_dir("/data/dop")
            .with_tile_px(256)
            .with_max_levels(3)
            .with_color_format(ColorFormat::Jpeg { quality: 80 })
            .with_merge_order(MergeOrder::NameDescending)
            .with_source_extensions(["png"])
            .with_threads(4)
            .with_srs("EPSG:2056");

        assert_eq!(config.elevation_dir, PathBuf::from("/data/dem"));
        assert_eq!(config.color_dir, Some(PathBuf::from("/data/dop")));
        assert_eq!(config.max_levels, Some(3));
        assert_eq!(config.source_extensions, vec!["png".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let base = PyramidConfig::default();
        assert!(base.clone().with_tile_px(0).validate().unwrap_err().is_config_error());
        assert!(base.clone().with_max_levels(0).validate().is_err());
        assert!(base.clone().with_max_levels(40).validate().is_err());
        assert!(base.clone().with_seam_overlap_px(300).validate().is_err());
        assert!(base.clone().with_threads(0).validate().is_err());
        assert!(base
            .clone()
            .with_color_format(ColorFormat::Jpeg { quality: 0 })
            .validate()
            .is_err());
        assert!(base
            .clone()
            .with_elevation_encoding(ElevationEncoding {
                scale: 0.0,
                ..Default::default()
            })
            .validate()
            .is_err());
        assert!(base.clone().with_source_extensions([""]).validate().is_err());
        let same_dirs = base.clone().with_color_dir(base.elevation_dir.clone());
        assert!(same_dirs.validate().is_err());
    }

    #[test]
    fn test_color_format_parsing() {
        assert_eq!("png".parse::<ColorFormat>().unwrap(), ColorFormat::Png);
        assert_eq!(
            "JPG".parse::<ColorFormat>().unwrap(),
            ColorFormat::Jpeg {
                quality: DEFAULT_JPEG_QUALITY
            }
        );
        assert_eq!(
            "jpeg:75".parse::<ColorFormat>().unwrap(),
            ColorFormat::Jpeg { quality: 75 }
        );
        assert!("png:5".parse::<ColorFormat>().is_err());
        assert!("webp".parse::<ColorFormat>().is_err());
    }

    #[test]
    fn test_color_format_encoder() {
        assert_eq!(ColorFormat::Png.encoder().unwrap().extension(), "png");
        assert_eq!(
            ColorFormat::Jpeg { quality: 60 }.encoder().unwrap().extension(),
            "jpg"
        );
        assert!(ColorFormat::Jpeg { quality: 0 }.encoder().is_err());
    }
}

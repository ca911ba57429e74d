//! End-to-end pyramid build.
//!
//! [`PyramidBuilder`] runs the phases in order:
//!
//! ```text
//! discover + open sources ─► combine (per channel) ─► plan ─► crop
//!        ─► global elevation range ─► prepare output
//!        ─► for each level: extract ─► stats + placeholders ─► patch seams
//!                           ─► encode + write
//!        ─► emit manifest
//! ```
//!
//! Everything that can fail for configuration or data reasons (planning,
//! cropping, global statistics, color coverage) is checked before the output
//! directory is touched. Tile statistics see only the tile's own window, so a
//! tile without samples stays a placeholder even after its edges are patched.
//! Extraction, statistics and writing run on the rayon pool; seam patching
//! runs serially between them.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::PyramidConfig;
use crate::encode::{PngTileEncoder, TileEncoder};
use crate::error::{PyramidError, PyramidResult};
use crate::extent::Extent;
use crate::heightmap::{finalize_tile, ElevationRange};
use crate::level::{ColorSampler, LevelBuilder, TileFrame};
use crate::manifest::{
    compute_global_elevation_range, ColorChannelInfo, Manifest, ManifestContext, MetadataEmitter,
};
use crate::mosaic::{combine, crop, crop_to_extent, Mosaic};
use crate::output::OutputLayout;
use crate::planner::PyramidPlan;
use crate::raster::{discover_sources, Channel, ElevationEncoding, ImageRaster, Rgb};
use crate::seam::patch_borders;
use crate::tile::{Tile, TileSummary};

/// Summary of a finished build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Pyramid depth including the root.
    pub levels: u32,
    /// Side of the cropped square in elevation pixels.
    pub side_px: u32,
    pub crop_extent: Extent,
    pub range: ElevationRange,
    pub elevation_tiles: usize,
    pub color_tiles: usize,
    /// Elevation tiles written as placeholders.
    pub placeholders: usize,
    pub manifest_path: PathBuf,
    pub elapsed: Duration,
}

/// Builds a tile pyramid from the configured sources.
pub struct PyramidBuilder {
    config: PyramidConfig,
    layout: OutputLayout,
    heightmap_encoder: Arc<dyn TileEncoder>,
    color_encoder: Arc<dyn TileEncoder>,
}

impl fmt::Debug for PyramidBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PyramidBuilder")
            .field("config", &self.config)
            .field("layout", &self.layout)
            .field("heightmap_encoder", &self.heightmap_encoder.name())
            .field("color_encoder", &self.color_encoder.name())
            .finish()
    }
}

impl PyramidBuilder {
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate.
    pub fn new(config: PyramidConfig) -> PyramidResult<Self> {
        config.validate()?;
        let color_encoder = config.color_format.encoder()?;
        Ok(Self {
            layout: OutputLayout::new(&config.output_dir),
            heightmap_encoder: Arc::new(PngTileEncoder::new()),
            color_encoder,
            config,
        })
    }

    pub fn config(&self) -> &PyramidConfig {
        &self.config
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Read the source directories and build the pyramid.
    pub fn run(&self) -> PyramidResult<BuildReport> {
        let elevation_sources = self.open_sources(&self.config.elevation_dir, Channel::Elevation)?;
        let elevation = combine::<f32, _>(&elevation_sources, Channel::Elevation)?;
        drop(elevation_sources);

        let color = match &self.config.color_dir {
            Some(dir) => {
                let sources = self.open_sources(dir, Channel::Color)?;
                Some(combine::<Rgb, _>(&sources, Channel::Color)?)
            }
            None => None,
        };

        self.build_from_mosaics(elevation, color)
    }

    /// Discover and open the rasters of one channel in merge order.
    fn open_sources(&self, dir: &Path, channel: Channel) -> PyramidResult<Vec<ImageRaster>> {
        let mut paths = discover_sources(dir, &self.config.source_extensions)?;
        self.config.merge_order.arrange(&mut paths);
        info!(
            channel = %channel,
            dir = %dir.display(),
            count = paths.len(),
            order = self.config.merge_order.as_str(),
            "Opening source rasters"
        );

        let encoding = match channel {
            Channel::Elevation => self.config.elevation_encoding,
            Channel::Color => ElevationEncoding::default(),
        };
        paths
            .into_iter()
            .map(|path| ImageRaster::open_with_encoding(path, encoding))
            .collect()
    }

    /// Build the pyramid from already combined mosaics.
    ///
    /// Runs on a dedicated pool when a thread count is configured.
    pub fn build_from_mosaics(
        &self,
        elevation: Mosaic<f32>,
        color: Option<Mosaic<Rgb>>,
    ) -> PyramidResult<BuildReport> {
        match self.config.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| {
                        PyramidError::config(format!("cannot create thread pool: {}", e))
                    })?;
                pool.install(|| self.build(elevation, color))
            }
            None => self.build(elevation, color),
        }
    }

    fn build(
        &self,
        elevation: Mosaic<f32>,
        color: Option<Mosaic<Rgb>>,
    ) -> PyramidResult<BuildReport> {
        let started = Instant::now();
        let config = &self.config;

        let plan = PyramidPlan::new(
            elevation.width(),
            elevation.height(),
            config.tile_px,
            config.max_levels,
        )?;
        info!(
            levels = plan.levels,
            side_px = plan.side_px,
            tile_px = plan.tile_px,
            "Planned pyramid"
        );

        let elevation = crop(&elevation, plan.side_px)?;
        let frame = TileFrame::of(&elevation);
        let crop_extent = frame.extent();
        let color = color
            .map(|c| crop_to_extent(&c, &crop_extent))
            .transpose()?;
        if let Some(color) = &color {
            check_color_resolution(color, &plan)?;
        }

        let range = compute_global_elevation_range(&elevation)?;
        info!(min = range.min, max = range.max, "Global elevation range");

        if plan.materialized_levels().is_empty() {
            warn!("Pyramid has only the root level; no tiles will be written");
        }

        self.layout.prepare()?;

        let dem_builder = LevelBuilder::new(&elevation, frame, plan.tile_px)?;
        let color_builder = color
            .as_ref()
            .map(|c| LevelBuilder::new(c, frame, plan.tile_px))
            .transpose()?;
        let color_sampler = ColorSampler::new(config.color_filter);

        let mut summaries: Vec<TileSummary> = Vec::new();
        let mut color_tiles = 0;

        for level in plan.materialized_levels() {
            let geometry = plan.level(level);

            let mut tiles = dem_builder.build_level(&geometry, &config.height_sampling)?;
            let level_summaries: Vec<TileSummary> = tiles
                .par_iter_mut()
                .map(|tile| finalize_tile(tile, &range))
                .collect();
            patch_borders(&mut tiles, config.seam_overlap_px);
            self.write_elevation_level(level, &tiles, &range)?;
            summaries.extend(level_summaries);

            if let Some(builder) = &color_builder {
                let tiles = builder.build_level(&geometry, &color_sampler)?;
                color_tiles += self.write_color_level(level, &tiles)?;
            }

            info!(
                level,
                tiles = geometry.tile_count(),
                window_px = geometry.window_px,
                "Level complete"
            );
        }

        let ctx = ManifestContext {
            plan,
            range,
            crop_extent,
            elevation_pixel_size: elevation.pixel_size(),
            color: color.as_ref().map(|c| ColorChannelInfo {
                extent: *c.extent(),
                pixel_size: c.pixel_size(),
            }),
            srs: config.srs.clone(),
        };
        let manifest: Manifest = MetadataEmitter::new(&self.layout).emit(&ctx, &summaries)?;
        let manifest_path = self.layout.manifest_path();
        manifest.save(&manifest_path)?;

        let report = BuildReport {
            levels: plan.levels,
            side_px: plan.side_px,
            crop_extent,
            range,
            elevation_tiles: summaries.len(),
            color_tiles,
            placeholders: summaries.iter().filter(|s| !s.valid).count(),
            manifest_path,
            elapsed: started.elapsed(),
        };
        info!(
            elevation_tiles = report.elevation_tiles,
            color_tiles = report.color_tiles,
            placeholders = report.placeholders,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Pyramid build complete"
        );
        Ok(report)
    }

    fn write_elevation_level(
        &self,
        level: u32,
        tiles: &[Tile<f32>],
        range: &ElevationRange,
    ) -> PyramidResult<()> {
        self.layout.create_level_dir(Channel::Elevation, level)?;
        let encoder = &self.heightmap_encoder;
        tiles.par_iter().try_for_each(|tile| -> PyramidResult<()> {
            let bytes = encoder.encode(&range.to_image(&tile.pixels))?;
            let path = self
                .layout
                .tile_path(Channel::Elevation, level, &tile.id(), encoder.extension());
            self.layout.write_tile(&path, &bytes)
        })
    }

    fn write_color_level(&self, level: u32, tiles: &[Tile<Rgb>]) -> PyramidResult<usize> {
        self.layout.create_level_dir(Channel::Color, level)?;
        let encoder = &self.color_encoder;
        tiles.par_iter().try_for_each(|tile| -> PyramidResult<()> {
            let image = image::DynamicImage::ImageRgb8(tile.pixels.clone().into_rgb_image());
            let bytes = encoder.encode(&image)?;
            let path = self
                .layout
                .tile_path(Channel::Color, level, &tile.id(), encoder.extension());
            self.layout.write_tile(&path, &bytes)
        })?;
        debug!(level, tiles = tiles.len(), encoder = encoder.name(), "Wrote color tiles");
        Ok(tiles.len())
    }
}

/// The color mosaic needs at least one pixel per finest-level tile.
fn check_color_resolution(color: &Mosaic<Rgb>, plan: &PyramidPlan) -> PyramidResult<()> {
    let Some(finest) = plan.materialized_levels().last() else {
        return Ok(());
    };
    let n = plan.level(finest).tiles_per_axis;
    if color.width() < n || color.height() < n {
        return Err(PyramidError::data(format!(
            "color mosaic {}x{} px cannot cover {} tiles per axis",
            color.width(),
            color.height(),
            n
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extent::WorldPoint;
    use crate::raster::Grid;

    fn elevation(side: u32) -> Mosaic<f32> {
        let data = (0..side * side).map(|v| (v % 97) as f32).collect();
        Mosaic::new(
            Channel::Elevation,
            WorldPoint::new(0.0, side as f64),
            1.0,
            Grid::from_vec(side, side, data).unwrap(),
        )
    }

    #[test]
    fn test_build_without_color() {
        let dir = tempfile::tempdir().unwrap();
        let config = PyramidConfig::new(dir.path().join("unused"), dir.path().join("out"))
            .with_tile_px(8);
        let builder = PyramidBuilder::new(config).unwrap();

        let report = builder.build_from_mosaics(elevation(32), None).unwrap();
        assert_eq!(report.levels, 3);
        assert_eq!(report.elevation_tiles, 4 + 16);
        assert_eq!(report.color_tiles, 0);
        assert!(report.manifest_path.is_file());
    }

    #[test]
    fn test_empty_tile_next_to_data_is_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let config = PyramidConfig::new(dir.path().join("unused"), dir.path().join("out"))
            .with_tile_px(8);
        let builder = PyramidBuilder::new(config).unwrap();

        // Only the south-east tile of the finest level lacks samples.
        let mut grid = elevation(32).pixels().clone();
        grid.blit(&Grid::nodata(8, 8), 24, 24);
        let mosaic = Mosaic::new(Channel::Elevation, WorldPoint::new(0.0, 32.0), 1.0, grid);

        let report = builder.build_from_mosaics(mosaic, None).unwrap();
        assert_eq!(report.placeholders, 1);
        assert_eq!(report.elevation_tiles, 4 + 16);
    }

    #[test]
    fn test_debug_names_encoders() {
        let builder = PyramidBuilder::new(PyramidConfig::default()).unwrap();
        let debug = format!("{:?}", builder);
        assert!(debug.contains("heightmap_encoder: \"PNG\""));
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let config = PyramidConfig::default().with_tile_px(0);
        assert!(PyramidBuilder::new(config).unwrap_err().is_config_error());
    }

    #[test]
    fn test_tile_larger_than_mosaic_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let config = PyramidConfig::new(dir.path().join("unused"), &out).with_tile_px(64);
        let builder = PyramidBuilder::new(config).unwrap();

        let err = builder.build_from_mosaics(elevation(32), None).unwrap_err();
        assert!(err.is_config_error());
        assert!(!out.exists());
    }

    #[test]
    fn test_color_too_coarse_is_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = PyramidConfig::new(dir.path().join("unused"), dir.path().join("out"))
            .with_tile_px(8);
        let builder = PyramidBuilder::new(config).unwrap();
        let color = Mosaic::new(
            Channel::Color,
            WorldPoint::new(0.0, 32.0),
            16.0,
            Grid::filled(2, 2, [1u8, 2, 3]),
        );
        let err = builder.build_from_mosaics(elevation(32), Some(color)).unwrap_err();
        assert!(err.is_data_error());
    }

    #[test]
    fn test_dedicated_thread_pool() {
        let dir = tempfile::tempdir().unwrap();
        let config = PyramidConfig::new(dir.path().join("unused"), dir.path().join("out"))
            .with_tile_px(16)
            .with_threads(2);
        let report = PyramidBuilder::new(config)
            .unwrap()
            .build_from_mosaics(elevation(32), None)
            .unwrap();
        assert_eq!(report.elevation_tiles, 4);
    }
}

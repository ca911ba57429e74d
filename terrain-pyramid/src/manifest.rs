//! Tile manifest emission.
//!
//! The manifest is the renderer's index of the pyramid. It is built in a
//! final pass after every tile of every level has been written:
//!
//! 1. Scan each channel's level directories and parse tile ids back into
//!    bounding boxes
//! 2. Join the files with the builder's per-tile summaries
//! 3. Verify every grid position of every materialized level has a file in
//!    every channel
//! 4. Save `manifest.json` atomically
//!
//! The document carries no timestamps, so identical inputs yield a
//! byte-identical manifest.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PyramidError, PyramidResult};
use crate::extent::{BBox, Extent};
use crate::heightmap::ElevationRange;
use crate::mosaic::Mosaic;
use crate::output::{OutputLayout, TileFile};
use crate::planner::PyramidPlan;
use crate::raster::{par_grid_stats, Channel};
use crate::tile::{same_tile, tile_id, TileKey, TileSummary};

/// Value of the `generator` field.
pub const GENERATOR: &str = concat!("terrain-pyramid ", env!("CARGO_PKG_VERSION"));

/// How heights are stored in elevation tiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightEncoding {
    pub format: String,
    pub min: f32,
    pub max: f32,
}

/// Elevation channel summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationSummary {
    pub global_min_height: f32,
    pub global_max_height: f32,
    pub bbox: BBox,
    pub bbox_center: [f64; 2],
    /// World units per elevation pixel.
    pub meters_to_px: f64,
    /// Pyramid depth including the unmaterialized root.
    pub lod_levels: u32,
}

/// Color channel summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorSummary {
    pub bbox: BBox,
    pub bbox_center: [f64; 2],
    /// World units per color pixel.
    pub meters_to_px: f64,
}

/// Per-level summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LodSummary {
    pub level: u32,
    pub tiles_per_axis: u32,
    /// Window side in cropped elevation pixels.
    pub window_px: u32,
    /// Tile side in world units.
    pub tile_world_size: f64,
}

/// One tile record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    pub level: u32,
    pub x: u32,
    pub y: u32,
    pub dem_image_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dop_image_path: Option<String>,
    /// Absolute bounds in the source CRS.
    pub bbox: BBox,
    /// Bounds recentred on the crop center, the renderer's local frame.
    pub bbox_world_space: BBox,
    pub min_height: Option<f32>,
    pub max_height: Option<f32>,
    pub mean_height: Option<f32>,
    pub valid: bool,
}

/// The manifest document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub generator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srs: Option<String>,
    pub tile_px: u32,
    pub height_encoding: HeightEncoding,
    pub dem: ElevationSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dop: Option<ColorSummary>,
    pub lods: Vec<LodSummary>,
    pub levels: Vec<TileRecord>,
}

impl Manifest {
    /// Load a manifest.
    pub fn load(path: &Path) -> PyramidResult<Self> {
        let file = File::open(path).map_err(|source| PyramidError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Save the manifest, writing a temporary file and renaming it into place.
    pub fn save(&self, path: &Path) -> PyramidResult<()> {
        let temp_path = path.with_extension("json.tmp");
        let write_failed = |source| PyramidError::WriteFailed {
            path: temp_path.clone(),
            source,
        };

        let file = File::create(&temp_path).map_err(write_failed)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n").map_err(write_failed)?;
        writer.flush().map_err(write_failed)?;
        drop(writer);

        std::fs::rename(&temp_path, path).map_err(|source| PyramidError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })?;

        info!(
            path = %path.display(),
            tiles = self.levels.len(),
            "Wrote manifest"
        );
        Ok(())
    }

    /// Records of one level.
    pub fn level_records(&self, level: u32) -> impl Iterator<Item = &TileRecord> {
        self.levels.iter().filter(move |r| r.level == level)
    }
}

/// Global height range of the cropped elevation surface, ignoring no-data.
///
/// # Errors
///
/// Returns a data error if the surface has no valid samples.
pub fn compute_global_elevation_range(mosaic: &Mosaic<f32>) -> PyramidResult<ElevationRange> {
    let stats = par_grid_stats(mosaic.pixels())
        .ok_or_else(|| PyramidError::data("elevation surface has no valid samples"))?;
    debug!(
        min = stats.min,
        max = stats.max,
        valid = stats.valid_count,
        "Computed global elevation range"
    );
    ElevationRange::new(stats.min, stats.max)
}

/// Color channel facts needed for the manifest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorChannelInfo {
    pub extent: Extent,
    pub pixel_size: f64,
}

/// Everything the emitter needs besides the tile files.
#[derive(Debug, Clone)]
pub struct ManifestContext {
    pub plan: PyramidPlan,
    pub range: ElevationRange,
    /// Cropped elevation extent.
    pub crop_extent: Extent,
    pub elevation_pixel_size: f64,
    pub color: Option<ColorChannelInfo>,
    pub srs: Option<String>,
}

/// Walks the written tiles and produces the manifest.
pub struct MetadataEmitter<'a> {
    layout: &'a OutputLayout,
}

impl<'a> MetadataEmitter<'a> {
    pub fn new(layout: &'a OutputLayout) -> Self {
        Self { layout }
    }

    /// Build the manifest from the tiles on disk and the builder's summaries.
    ///
    /// # Errors
    ///
    /// Returns a data error if any grid position of a materialized level lacks
    /// a summary or a file in any channel.
    pub fn emit(
        &self,
        ctx: &ManifestContext,
        summaries: &[TileSummary],
    ) -> PyramidResult<Manifest> {
        let by_key: HashMap<TileKey, &TileSummary> =
            summaries.iter().map(|s| (s.key, s)).collect();
        let center = ctx.crop_extent.center();

        let mut lods = Vec::new();
        let mut records = Vec::new();

        for level in ctx.plan.materialized_levels() {
            let geometry = ctx.plan.level(level);
            lods.push(LodSummary {
                level,
                tiles_per_axis: geometry.tiles_per_axis,
                window_px: geometry.window_px,
                tile_world_size: geometry.window_px as f64 * ctx.elevation_pixel_size,
            });

            let dem_files = self.files_by_id(Channel::Elevation, level, geometry.tile_count())?;
            let dop_files = match ctx.color {
                Some(_) => Some(self.files_by_id(Channel::Color, level, geometry.tile_count())?),
                None => None,
            };

            for (x, y) in geometry.cells() {
                let key = TileKey::new(level, x, y);
                let summary = by_key.get(&key).ok_or_else(|| {
                    PyramidError::data(format!(
                        "no tile summary for level {} ({}, {})",
                        level, x, y
                    ))
                })?;
                let id = tile_id(&summary.bbox);

                let dem = lookup(&dem_files, &id, summary, Channel::Elevation)?;
                let dop = match &dop_files {
                    Some(files) => Some(
                        lookup(files, &id, summary, Channel::Color)?
                            .relative_path
                            .clone(),
                    ),
                    None => None,
                };

                let world = summary.bbox;
                records.push(TileRecord {
                    level,
                    x,
                    y,
                    dem_image_path: dem.relative_path.clone(),
                    dop_image_path: dop,
                    bbox: world,
                    bbox_world_space: [
                        world[0] - center.x,
                        world[1] - center.y,
                        world[2] - center.x,
                        world[3] - center.y,
                    ],
                    min_height: summary.stats.map(|s| s.min),
                    max_height: summary.stats.map(|s| s.max),
                    mean_height: summary.stats.map(|s| s.mean),
                    valid: summary.valid,
                });
            }

            debug!(level, tiles = geometry.tile_count(), "Indexed level");
        }

        let center_pair = [center.x, center.y];
        Ok(Manifest {
            generator: GENERATOR.to_string(),
            srs: ctx.srs.clone(),
            tile_px: ctx.plan.tile_px,
            height_encoding: HeightEncoding {
                format: "u16".to_string(),
                min: ctx.range.min,
                max: ctx.range.max,
            },
            dem: ElevationSummary {
                global_min_height: ctx.range.min,
                global_max_height: ctx.range.max,
                bbox: ctx.crop_extent.to_bbox(),
                bbox_center: center_pair,
                meters_to_px: ctx.elevation_pixel_size,
                lod_levels: ctx.plan.levels,
            },
            dop: ctx.color.map(|color| ColorSummary {
                bbox: color.extent.to_bbox(),
                bbox_center: [color.extent.center().x, color.extent.center().y],
                meters_to_px: color.pixel_size,
            }),
            lods,
            levels: records,
        })
    }

    fn files_by_id(
        &self,
        channel: Channel,
        level: u32,
        expected: u64,
    ) -> PyramidResult<HashMap<String, TileFile>> {
        let files = self.layout.scan_level(channel, level)?;
        if files.len() as u64 != expected {
            return Err(PyramidError::data(format!(
                "{} level {} has {} tile files, expected {}",
                channel,
                level,
                files.len(),
                expected
            )));
        }
        Ok(files.into_iter().map(|f| (f.id.clone(), f)).collect())
    }
}

fn lookup<'f>(
    files: &'f HashMap<String, TileFile>,
    id: &str,
    summary: &TileSummary,
    channel: Channel,
) -> PyramidResult<&'f TileFile> {
    files
        .get(id)
        .filter(|file| same_tile(&file.bbox, &summary.bbox))
        .ok_or_else(|| {
            PyramidError::data(format!(
                "missing {} tile {} for level {} ({}, {})",
                channel, id, summary.key.level, summary.key.x, summary.key.y
            ))
        })
}

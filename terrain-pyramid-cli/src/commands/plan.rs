//! Plan command - show the pyramid a build would produce.
//!
//! Reads source headers and world files only; nothing is decoded or written.

use std::path::PathBuf;

use clap::Args;
use terrain_pyramid::mosaic::{pixel_dimensions, union_extent};
use terrain_pyramid::raster::{discover_sources, ImageRaster, RasterInfo};
use terrain_pyramid::{PyramidConfig, PyramidPlan};

use crate::error::CliError;

/// Arguments for `plan`.
#[derive(Debug, Clone, Default, Args)]
pub struct PlanArgs {
    /// Directory of elevation rasters
    #[arg(long, short = 'e')]
    pub elevation: Option<PathBuf>,

    /// Tile size in pixels
    #[arg(long)]
    pub tile_px: Option<u32>,

    /// Override the computed number of pyramid levels
    #[arg(long)]
    pub max_levels: Option<u32>,
}

/// Run the plan command.
pub fn run(args: &PlanArgs, config: PyramidConfig) -> Result<(), CliError> {
    let dir = args.elevation.clone().unwrap_or(config.elevation_dir);
    let tile_px = args.tile_px.unwrap_or(config.tile_px);
    let max_levels = args.max_levels.or(config.max_levels);

    let paths = discover_sources(&dir, &config.source_extensions)?;
    let infos = paths
        .into_iter()
        .map(|path| ImageRaster::open(path).map(|raster| *raster.info()))
        .collect::<Result<Vec<RasterInfo>, _>>()?;
    let (extent, pixel_size) = union_extent(&infos)?;
    let (width, height) = pixel_dimensions(&extent, pixel_size);
    let plan = PyramidPlan::new(width, height, tile_px, max_levels)?;

    println!("Sources:      {} in {}", infos.len(), dir.display());
    println!("Mosaic:       {} x {} px at {} units/px", width, height, pixel_size);
    println!(
        "Extent:       [{:.3}, {:.3}, {:.3}, {:.3}]",
        extent.min_x(),
        extent.min_y(),
        extent.max_x(),
        extent.max_y()
    );
    println!("Levels:       {}", plan.levels);
    println!("Crop side:    {} px", plan.side_px);
    println!();
    println!("  {:>5}  {:>9}  {:>7}  {:>10}", "level", "grid", "tiles", "window px");
    for level in plan.materialized_levels() {
        let geom = plan.level(level);
        println!(
            "  {:>5}  {:>9}  {:>7}  {:>10}",
            level,
            format!("{0}x{0}", geom.tiles_per_axis),
            geom.tile_count(),
            geom.window_px
        );
    }
    Ok(())
}

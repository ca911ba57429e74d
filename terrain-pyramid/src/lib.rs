//! terrain-pyramid - Multi-resolution terrain tile pyramids
//!
//! This library turns a directory of georeferenced elevation rasters, and
//! optionally a directory of color orthophotos covering the same area, into a
//! quadtree of fixed-size tiles plus a JSON manifest for real-time terrain
//! renderers.
//!
//! # Example
//!
//! ```no_run
//! use terrain_pyramid::{PyramidBuilder, PyramidConfig};
//!
//! let config = PyramidConfig::new("data/dem", "data/pyramid")
//!     .with_color_dir("data/dop")
//!     .with_tile_px(512);
//! let report = PyramidBuilder::new(config)?.run()?;
//! println!("{} levels, {} tiles", report.levels, report.elevation_tiles);
//! # Ok::<(), terrain_pyramid::PyramidError>(())
//! ```

pub mod config;
pub mod downsample;
pub mod encode;
pub mod error;
pub mod extent;
pub mod heightmap;
pub mod level;
pub mod logging;
pub mod manifest;
pub mod mosaic;
pub mod output;
pub mod pipeline;
pub mod planner;
pub mod raster;
pub mod seam;
pub mod tile;

pub use config::{ColorFormat, ConfigFile, PyramidConfig};
pub use error::{PyramidError, PyramidResult};
pub use manifest::Manifest;
pub use pipeline::{BuildReport, PyramidBuilder};
pub use planner::PyramidPlan;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

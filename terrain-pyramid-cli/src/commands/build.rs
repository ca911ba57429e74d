//! Build command - run the full pyramid pipeline.

use std::path::PathBuf;

use clap::Args;
use terrain_pyramid::config::ColorFormat;
use terrain_pyramid::encode::DEFAULT_JPEG_QUALITY;
use terrain_pyramid::{PyramidBuilder, PyramidConfig};

use super::common::{FilterArg, FormatArg, MergeOrderArg, SamplingArg};
use crate::error::CliError;

/// Arguments for `build`. Every flag overrides the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct BuildArgs {
    /// Directory of elevation rasters
    #[arg(long, short = 'e')]
    pub elevation: Option<PathBuf>,

    /// Directory of color rasters
    #[arg(long, short = 'c')]
    pub color: Option<PathBuf>,

    /// Build elevation tiles only, even if a color directory is configured
    #[arg(long, conflicts_with = "color")]
    pub no_color: bool,

    /// Output directory
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Tile size in pixels
    #[arg(long)]
    pub tile_px: Option<u32>,

    /// Override the computed number of pyramid levels
    #[arg(long)]
    pub max_levels: Option<u32>,

    /// Columns/rows shared across elevation seams
    #[arg(long)]
    pub seam_overlap: Option<u32>,

    /// Elevation reduction for coarse levels
    #[arg(long, value_enum)]
    pub height_sampling: Option<SamplingArg>,

    /// Color resampling filter
    #[arg(long, value_enum)]
    pub color_filter: Option<FilterArg>,

    /// Color tile format
    #[arg(long, value_enum)]
    pub color_format: Option<FormatArg>,

    /// JPEG quality (1-100)
    #[arg(long)]
    pub jpeg_quality: Option<u8>,

    /// Which source wins where rasters overlap
    #[arg(long, value_enum)]
    pub merge_order: Option<MergeOrderArg>,

    /// Worker threads
    #[arg(long, short = 'j')]
    pub threads: Option<usize>,

    /// CRS label recorded in the manifest
    #[arg(long)]
    pub srs: Option<String>,
}

impl BuildArgs {
    /// Apply the flags on top of `config`.
    pub fn apply(&self, mut config: PyramidConfig) -> PyramidConfig {
        if let Some(dir) = &self.elevation {
            config.elevation_dir = dir.clone();
        }
        if let Some(dir) = &self.color {
            config.color_dir = Some(dir.clone());
        }
        if self.no_color {
            config.color_dir = None;
        }
        if let Some(dir) = &self.output {
            config.output_dir = dir.clone();
        }
        if let Some(tile_px) = self.tile_px {
            config.tile_px = tile_px;
        }
        if let Some(levels) = self.max_levels {
            config.max_levels = Some(levels);
        }
        if let Some(overlap) = self.seam_overlap {
            config.seam_overlap_px = overlap;
        }
        if let Some(sampling) = self.height_sampling {
            config.height_sampling = sampling.into();
        }
        if let Some(filter) = self.color_filter {
            config.color_filter = filter.into();
        }

        let configured_quality = match config.color_format {
            ColorFormat::Jpeg { quality } => quality,
            ColorFormat::Png => DEFAULT_JPEG_QUALITY,
        };
        match (self.color_format, self.jpeg_quality) {
            (Some(FormatArg::Png), _) => config.color_format = ColorFormat::Png,
            (Some(FormatArg::Jpeg), quality) => {
                config.color_format = ColorFormat::Jpeg {
                    quality: quality.unwrap_or(configured_quality),
                }
            }
            (None, Some(quality)) => {
                if let ColorFormat::Jpeg { .. } = config.color_format {
                    config.color_format = ColorFormat::Jpeg { quality };
                }
            }
            (None, None) => {}
        }

        if let Some(order) = self.merge_order {
            config.merge_order = order.into();
        }
        if let Some(threads) = self.threads {
            config.threads = Some(threads);
        }
        if let Some(srs) = &self.srs {
            config.srs = Some(srs.clone());
        }
        config
    }
}

/// Run the build command.
pub fn run(args: &BuildArgs, config: PyramidConfig) -> Result<(), CliError> {
    let config = args.apply(config);
    let builder = PyramidBuilder::new(config)?;
    let report = builder.run()?;

    println!("Pyramid built in {:.1}s", report.elapsed.as_secs_f64());
    println!("  Levels:          {} (root not written)", report.levels);
    println!("  Crop side:       {} px", report.side_px);
    println!(
        "  Height range:    {:.2} .. {:.2}",
        report.range.min, report.range.max
    );
    println!("  Elevation tiles: {}", report.elevation_tiles);
    if report.color_tiles > 0 {
        println!("  Color tiles:     {}", report.color_tiles);
    }
    if report.placeholders > 0 {
        println!("  Placeholders:    {}", report.placeholders);
    }
    println!("  Manifest:        {}", report.manifest_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrain_pyramid::level::HeightSampling;

    #[test]
    fn test_flags_override_config() {
        let args = BuildArgs {
            elevation: Some(PathBuf::from("/cli/dem")),
            tile_px: Some(256),
            height_sampling: Some(SamplingArg::Native),
            color_format: Some(FormatArg::Jpeg),
            jpeg_quality: Some(70),
            ..Default::default()
        };
        let config = args.apply(PyramidConfig::new("/file/dem", "/file/out"));
        assert_eq!(config.elevation_dir, PathBuf::from("/cli/dem"));
        assert_eq!(config.output_dir, PathBuf::from("/file/out"));
        assert_eq!(config.tile_px, 256);
        assert_eq!(config.height_sampling, HeightSampling::Native);
        assert_eq!(config.color_format, ColorFormat::Jpeg { quality: 70 });
    }

    #[test]
    fn test_no_color_clears_configured_dir() {
        let args = BuildArgs {
            no_color: true,
            ..Default::default()
        };
        let config = args.apply(PyramidConfig::default().with_color_dir("/dop"));
        assert!(config.color_dir.is_none());
    }

    #[test]
    fn test_quality_alone_ignored_for_png() {
        let args = BuildArgs {
            jpeg_quality: Some(50),
            ..Default::default()
        };
        let config = args.apply(PyramidConfig::default());
        assert_eq!(config.color_format, ColorFormat::Png);
    }
}

//! Argument types and config resolution shared across commands.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use terrain_pyramid::config::{default_config_path, ConfigFile};
use terrain_pyramid::downsample::ResampleFilter;
use terrain_pyramid::level::HeightSampling;
use terrain_pyramid::mosaic::MergeOrder;

use crate::error::CliError;

/// Elevation reduction for coarse levels.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum SamplingArg {
    /// Top-left sample of each block
    Decimate,
    /// Mean of each block
    BoxAverage,
    /// Keep full resolution (coarse tiles grow)
    Native,
}

impl From<SamplingArg> for HeightSampling {
    fn from(arg: SamplingArg) -> Self {
        match arg {
            SamplingArg::Decimate => HeightSampling::Decimate,
            SamplingArg::BoxAverage => HeightSampling::BoxAverage,
            SamplingArg::Native => HeightSampling::Native,
        }
    }
}

/// Color resampling filter.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum FilterArg {
    /// Bilinear
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<FilterArg> for ResampleFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::Triangle => ResampleFilter::Triangle,
            FilterArg::CatmullRom => ResampleFilter::CatmullRom,
            FilterArg::Gaussian => ResampleFilter::Gaussian,
            FilterArg::Lanczos3 => ResampleFilter::Lanczos3,
        }
    }
}

/// Color tile file format.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum FormatArg {
    Png,
    Jpeg,
}

/// Overlap resolution order.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum MergeOrderArg {
    /// Later file names win overlaps
    Ascending,
    /// Earlier file names win overlaps
    Descending,
}

impl From<MergeOrderArg> for MergeOrder {
    fn from(arg: MergeOrderArg) -> Self {
        match arg {
            MergeOrderArg::Ascending => MergeOrder::NameAscending,
            MergeOrderArg::Descending => MergeOrder::NameDescending,
        }
    }
}

/// Config file to use: the explicit path, else the default location.
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf, CliError> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(default_config_path()?),
    }
}

/// Load the configuration file.
///
/// An explicitly named file must exist; a missing default file yields the
/// built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<ConfigFile, CliError> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(CliError::Config(format!(
                "configuration file {} not found",
                path.display()
            )));
        }
        return Ok(ConfigFile::load(path)?);
    }
    match default_config_path() {
        Ok(path) if path.is_file() => Ok(ConfigFile::load(&path)?),
        _ => Ok(ConfigFile::default()),
    }
}

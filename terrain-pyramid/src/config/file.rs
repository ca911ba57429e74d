//! INI persistence for build configuration.
//!
//! ```ini
//! [input]
//! elevation_dir = /data/dem
//! color_dir = /data/dop
//! extensions = tif,tiff,png,jpg,jpeg
//! merge_order = name-ascending
//!
//! [pyramid]
//! tile_px = 512
//! max_levels =
//! seam_overlap_px = 1
//! height_sampling = decimate
//! color_filter = triangle
//! threads =
//!
//! [elevation]
//! scale = 1
//! offset = 0
//! nodata =
//!
//! [output]
//! dir = /data/pyramid
//! color_format = png
//! srs = EPSG:2056
//!
//! [logging]
//! level = info
//! file =
//! ```
//!
//! Empty values mean "unset". Missing keys keep their defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::{Ini, Properties};
use tracing::debug;

use super::{ColorFormat, PyramidConfig};
use crate::error::{PyramidError, PyramidResult};

/// Directory under the home directory holding the default config file.
const CONFIG_DIR_NAME: &str = ".terrain-pyramid";

const CONFIG_FILE_NAME: &str = "config.ini";

/// Default configuration file location (`~/.terrain-pyramid/config.ini`).
pub fn default_config_path() -> PyramidResult<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or_else(|| PyramidError::config("could not determine home directory"))
}

/// Logging settings stored alongside the build configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Default filter directive, e.g. `info` or `terrain_pyramid=debug`.
    pub level: String,
    /// Optional log file written in addition to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Contents of a configuration file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigFile {
    pub pyramid: PyramidConfig,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns a read error if the file cannot be read and a configuration
    /// error for malformed INI or invalid values.
    pub fn load(path: &Path) -> PyramidResult<Self> {
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => PyramidError::ReadFailed {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(e) => {
                PyramidError::config(format!("{}: {}", path.display(), e))
            }
        })?;
        let config = Self::from_ini(&ini)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Write the configuration, creating parent directories.
    pub fn save(&self, path: &Path) -> PyramidResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| PyramidError::DirectoryFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        self.to_ini()
            .write_to_file(path)
            .map_err(|source| PyramidError::WriteFailed {
                path: path.to_path_buf(),
                source,
            })
    }

    fn from_ini(ini: &Ini) -> PyramidResult<Self> {
        let mut pyramid = PyramidConfig::default();
        let mut logging = LoggingSettings::default();

        if let Some(s) = ini.section(Some("input")) {
            if let Some(dir) = text(s, "elevation_dir") {
                pyramid.elevation_dir = PathBuf::from(dir);
            }
            if let Some(dir) = optional(s, "color_dir") {
                pyramid.color_dir = dir.map(PathBuf::from);
            }
            if let Some(exts) = text(s, "extensions") {
                pyramid.source_extensions = exts
                    .split(',')
                    .map(|e| e.trim().trim_start_matches('.').to_string())
                    .filter(|e| !e.is_empty())
                    .collect();
            }
            if let Some(order) = parse(s, "input", "merge_order")? {
                pyramid.merge_order = order;
            }
        }

        if let Some(s) = ini.section(Some("pyramid")) {
            if let Some(tile_px) = parse(s, "pyramid", "tile_px")? {
                pyramid.tile_px = tile_px;
            }
            if optional(s, "max_levels").is_some() {
                pyramid.max_levels = parse(s, "pyramid", "max_levels")?;
            }
            if let Some(overlap) = parse(s, "pyramid", "seam_overlap_px")? {
                pyramid.seam_overlap_px = overlap;
            }
            if let Some(sampling) = parse(s, "pyramid", "height_sampling")? {
                pyramid.height_sampling = sampling;
            }
            if let Some(filter) = parse(s, "pyramid", "color_filter")? {
                pyramid.color_filter = filter;
            }
            if optional(s, "threads").is_some() {
                pyramid.threads = parse(s, "pyramid", "threads")?;
            }
        }

        if let Some(s) = ini.section(Some("elevation")) {
            if let Some(scale) = parse(s, "elevation", "scale")? {
                pyramid.elevation_encoding.scale = scale;
            }
            if let Some(offset) = parse(s, "elevation", "offset")? {
                pyramid.elevation_encoding.offset = offset;
            }
            if optional(s, "nodata").is_some() {
                pyramid.elevation_encoding.nodata = parse(s, "elevation", "nodata")?;
            }
        }

        if let Some(s) = ini.section(Some("output")) {
            if let Some(dir) = text(s, "dir") {
                pyramid.output_dir = PathBuf::from(dir);
            }
            if let Some(format) = parse::<ColorFormat>(s, "output", "color_format")? {
                pyramid.color_format = format;
            }
            if let Some(quality) = parse::<u8>(s, "output", "jpeg_quality")? {
                if let ColorFormat::Jpeg { .. } = pyramid.color_format {
                    pyramid.color_format = ColorFormat::Jpeg { quality };
                }
            }
            if let Some(srs) = optional(s, "srs") {
                pyramid.srs = srs.map(str::to_string);
            }
        }

        if let Some(s) = ini.section(Some("logging")) {
            if let Some(level) = text(s, "level") {
                logging.level = level.to_string();
            }
            if let Some(file) = optional(s, "file") {
                logging.file = file.map(PathBuf::from);
            }
        }

        pyramid.validate()?;
        Ok(Self { pyramid, logging })
    }

    fn to_ini(&self) -> Ini {
        let p = &self.pyramid;
        let opt = |v: Option<String>| v.unwrap_or_default();
        let mut ini = Ini::new();

        ini.with_section(Some("input"))
            .set("elevation_dir", p.elevation_dir.display().to_string())
            .set(
                "color_dir",
                opt(p.color_dir.as_ref().map(|d| d.display().to_string())),
            )
            .set("extensions", p.source_extensions.join(","))
            .set("merge_order", p.merge_order.as_str());

        ini.with_section(Some("pyramid"))
            .set("tile_px", p.tile_px.to_string())
            .set("max_levels", opt(p.max_levels.map(|l| l.to_string())))
            .set("seam_overlap_px", p.seam_overlap_px.to_string())
            .set("height_sampling", p.height_sampling.as_str())
            .set("color_filter", p.color_filter.as_str())
            .set("threads", opt(p.threads.map(|t| t.to_string())));

        ini.with_section(Some("elevation"))
            .set("scale", p.elevation_encoding.scale.to_string())
            .set("offset", p.elevation_encoding.offset.to_string())
            .set("nodata", opt(p.elevation_encoding.nodata.map(|n| n.to_string())));

        let quality = match p.color_format {
            ColorFormat::Jpeg { quality } => quality.to_string(),
            ColorFormat::Png => String::new(),
        };
        ini.with_section(Some("output"))
            .set("dir", p.output_dir.display().to_string())
            .set("color_format", p.color_format.to_string())
            .set("jpeg_quality", quality)
            .set("srs", opt(p.srs.clone()));

        ini.with_section(Some("logging"))
            .set("level", self.logging.level.clone())
            .set(
                "file",
                opt(self.logging.file.as_ref().map(|f| f.display().to_string())),
            );

        ini
    }
}

/// Non-empty trimmed value of `key`.
fn text<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

/// `Some(None)` when the key is present but empty, so an explicit empty value
/// clears an optional setting.
fn optional<'a>(section: &'a Properties, key: &str) -> Option<Option<&'a str>> {
    section
        .get(key)
        .map(str::trim)
        .map(|v| (!v.is_empty()).then_some(v))
}

fn parse<T>(section: &Properties, name: &str, key: &str) -> PyramidResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    text(section, key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| {
                PyramidError::config(format!("[{}] {} = '{}': {}", name, key, raw, e))
            })
        })
        .transpose()
}

//! Output directory layout.
//!
//! ```text
//! <root>/
//! ├── manifest.json
//! ├── dem/
//! │   ├── lod_1/tile_<minX>_<minY>_<maxX>_<maxY>.png
//! │   └── lod_2/...
//! └── dop/
//!     ├── lod_1/tile_<minX>_<minY>_<maxX>_<maxY>.<png|jpg>
//!     └── ...
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{PyramidError, PyramidResult};
use crate::extent::BBox;
use crate::raster::Channel;
use crate::tile::parse_tile_id;

/// Manifest file name at the output root.
pub const MANIFEST_FILE: &str = "manifest.json";

/// A tile file found on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct TileFile {
    /// File stem (the tile id).
    pub id: String,
    /// Bounding box parsed back from the id.
    pub bbox: BBox,
    /// Path relative to the output root, with `/` separators.
    pub relative_path: String,
}

/// Paths of everything a build writes.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn channel_dir(&self, channel: Channel) -> PathBuf {
        self.root.join(channel.dir_name())
    }

    pub fn level_dir(&self, channel: Channel, level: u32) -> PathBuf {
        self.channel_dir(channel).join(level_dir_name(level))
    }

    /// Path of a tile relative to the root.
    pub fn relative_tile_path(channel: Channel, level: u32, id: &str, extension: &str) -> String {
        format!(
            "{}/{}/{}.{}",
            channel.dir_name(),
            level_dir_name(level),
            id,
            extension
        )
    }

    pub fn tile_path(&self, channel: Channel, level: u32, id: &str, extension: &str) -> PathBuf {
        self.level_dir(channel, level)
            .join(format!("{}.{}", id, extension))
    }

    /// Clear the previous build's outputs and create the root.
    ///
    /// The old manifest is removed first so an interrupted run never leaves a
    /// manifest pointing at missing tiles.
    pub fn prepare(&self) -> PyramidResult<()> {
        let manifest = self.manifest_path();
        match fs::remove_file(&manifest) {
            Ok(()) => debug!(path = %manifest.display(), "Removed previous manifest"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(PyramidError::WriteFailed {
                    path: manifest,
                    source,
                })
            }
        }

        for channel in [Channel::Elevation, Channel::Color] {
            let dir = self.channel_dir(channel);
            if dir.exists() {
                fs::remove_dir_all(&dir)
                    .map_err(|source| PyramidError::DirectoryFailed { path: dir.clone(), source })?;
                debug!(path = %dir.display(), "Removed previous tiles");
            }
        }

        fs::create_dir_all(&self.root).map_err(|source| PyramidError::DirectoryFailed {
            path: self.root.clone(),
            source,
        })?;
        info!(root = %self.root.display(), "Prepared output directory");
        Ok(())
    }

    /// Create the directory for one level of one channel.
    pub fn create_level_dir(&self, channel: Channel, level: u32) -> PyramidResult<PathBuf> {
        let dir = self.level_dir(channel, level);
        fs::create_dir_all(&dir).map_err(|source| PyramidError::DirectoryFailed {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    /// Write one encoded tile.
    pub fn write_tile(&self, path: &Path, bytes: &[u8]) -> PyramidResult<()> {
        fs::write(path, bytes).map_err(|source| PyramidError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Tile files present for one level of one channel, sorted by id.
    ///
    /// Files whose stem is not a tile id are ignored.
    pub fn scan_level(&self, channel: Channel, level: u32) -> PyramidResult<Vec<TileFile>> {
        let dir = self.level_dir(channel, level);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(PyramidError::ReadFailed { path: dir, source }),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PyramidError::ReadFailed {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let (Some(stem), Some(ext)) = (
                path.file_stem().and_then(|s| s.to_str()),
                path.extension().and_then(|s| s.to_str()),
            ) else {
                continue;
            };
            let Ok(bbox) = parse_tile_id(stem) else {
                continue;
            };
            files.push(TileFile {
                id: stem.to_string(),
                bbox,
                relative_path: Self::relative_tile_path(channel, level, stem, ext),
            });
        }

        files.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(files)
    }
}

fn level_dir_name(level: u32) -> String {
    format!("lod_{}", level)
}

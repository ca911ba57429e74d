//! ESRI world-file georeferencing.
//!
//! A world file is a six-line text sidecar next to a raster:
//!
//! ```text
//! 2.0          A: pixel width in world units
//! 0.0          D: row rotation
//! 0.0          B: column rotation
//! -2.0         E: pixel height (negative for north-up)
//! 2600001.0    C: X of the center of the upper-left pixel
//! 1199999.0    F: Y of the center of the upper-left pixel
//! ```
//!
//! Sidecar naming follows the usual conventions: `tile.tif` → `tile.tfw` or
//! `tile.tifw`, `tile.png` → `tile.pgw` or `tile.pngw`, `tile.jpg` → `tile.jgw`,
//! and the generic `tile.wld`.

use std::path::{Path, PathBuf};

use crate::error::{PyramidError, PyramidResult};
use crate::extent::WorldPoint;

/// Relative tolerance for treating pixels as square.
const SQUARE_PIXEL_TOLERANCE: f64 = 1e-6;

/// Parsed world-file affine parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldFile {
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub column_rotation: f64,
    pub pixel_height: f64,
    pub center_x: f64,
    pub center_y: f64,
}

impl WorldFile {
    /// Parse world-file text.
    pub fn parse(text: &str) -> PyramidResult<Self> {
        let values: Vec<f64> = text
            .split_whitespace()
            .map(|token| {
                token.parse::<f64>().map_err(|_| {
                    PyramidError::data(format!("invalid world file value '{}'", token))
                })
            })
            .collect::<PyramidResult<_>>()?;

        if values.len() != 6 {
            return Err(PyramidError::data(format!(
                "world file must contain 6 values, found {}",
                values.len()
            )));
        }

        Ok(Self {
            pixel_width: values[0],
            row_rotation: values[1],
            column_rotation: values[2],
            pixel_height: values[3],
            center_x: values[4],
            center_y: values[5],
        })
    }

    /// Read and parse a world file from disk.
    pub fn read(path: &Path) -> PyramidResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| PyramidError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Top-left corner of the upper-left pixel.
    pub fn origin(&self) -> WorldPoint {
        WorldPoint::new(
            self.center_x - self.pixel_width / 2.0,
            self.center_y - self.pixel_height / 2.0,
        )
    }

    /// Square pixel size in world units.
    ///
    /// # Errors
    ///
    /// Rotated, south-up or non-square rasters would need resampling and are
    /// rejected as data errors.
    pub fn pixel_size(&self) -> PyramidResult<f64> {
        if self.row_rotation != 0.0 || self.column_rotation != 0.0 {
            return Err(PyramidError::data("rotated rasters are not supported"));
        }
        if self.pixel_width <= 0.0 || self.pixel_height >= 0.0 {
            return Err(PyramidError::data(format!(
                "raster must be north-up with positive pixel width (got {} × {})",
                self.pixel_width, self.pixel_height
            )));
        }
        let size = self.pixel_width;
        if ((-self.pixel_height) - size).abs() > size * SQUARE_PIXEL_TOLERANCE {
            return Err(PyramidError::data(format!(
                "non-square pixels are not supported ({} × {})",
                self.pixel_width, -self.pixel_height
            )));
        }
        Ok(size)
    }
}

/// Candidate sidecar paths for a raster, in lookup order.
pub fn sidecar_candidates(raster: &Path) -> Vec<PathBuf> {
    let ext = raster
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let mut exts: Vec<String> = Vec::new();
    if let (Some(first), Some(last)) = (ext.chars().next(), ext.chars().last()) {
        // tif -> tfw, png -> pgw, jpg -> jgw
        exts.push(format!("{}{}w", first, last));
        exts.push(format!("{}w", ext));
    }
    exts.push("wld".to_string());

    exts.into_iter()
        .map(|e| raster.with_extension(e))
        .collect()
}

/// Locate and read the world file belonging to `raster`.
pub fn find_world_file(raster: &Path) -> PyramidResult<WorldFile> {
    for candidate in sidecar_candidates(raster) {
        if candidate.is_file() {
            return WorldFile::read(&candidate);
        }
    }
    Err(PyramidError::data(format!(
        "no world file found for {}",
        raster.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWISS_TILE: &str = "2.0\n0.0\n0.0\n-2.0\n2600001.0\n1199999.0\n";

    #[test]
    fn test_parse_and_origin() {
        let wf = WorldFile::parse(SWISS_TILE).unwrap();
        assert_eq!(wf.origin(), WorldPoint::new(2_600_000.0, 1_200_000.0));
        assert_eq!(wf.pixel_size().unwrap(), 2.0);
    }

    #[test]
    fn test_parse_wrong_count() {
        let err = WorldFile::parse("1.0\n0.0\n0.0\n-1.0\n").unwrap_err();
        assert!(err.is_data_error());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(WorldFile::parse("a b c d e f").is_err());
    }

    #[test]
    fn test_rotation_rejected() {
        let wf = WorldFile::parse("1.0 0.5 0.0 -1.0 0.0 0.0").unwrap();
        assert!(wf.pixel_size().is_err());
    }

    #[test]
    fn test_non_square_rejected() {
        let wf = WorldFile::parse("1.0 0.0 0.0 -2.0 0.0 0.0").unwrap();
        assert!(wf.pixel_size().is_err());
    }

    #[test]
    fn test_south_up_rejected() {
        let wf = WorldFile::parse("1.0 0.0 0.0 1.0 0.0 0.0").unwrap();
        assert!(wf.pixel_size().is_err());
    }

    #[test]
    fn test_sidecar_candidates() {
        let names: Vec<String> = sidecar_candidates(Path::new("/data/dem/a.tif"))
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.tfw", "a.tifw", "a.wld"]);

        let names: Vec<String> = sidecar_candidates(Path::new("b.png"))
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["b.pgw", "b.pngw", "b.wld"]);
    }

    #[test]
    fn test_find_world_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let raster = dir.path().join("x.png");
        assert!(find_world_file(&raster).unwrap_err().is_data_error());

        std::fs::write(dir.path().join("x.wld"), SWISS_TILE).unwrap();
        assert_eq!(find_world_file(&raster).unwrap().pixel_width, 2.0);
    }
}

//! Tile identifiers derived from world bounding boxes.
//!
//! A tile id encodes the tile's bounding box in whole millimetres:
//! `tile_{minX}_{minY}_{maxX}_{maxY}`
//!
//! Examples:
//! - `tile_2600000000_1199488000_2600512000_1200000000`
//! - `tile_-1000_-500_3000_1500`
//!
//! Ids are a pure function of the bbox, so both channels produce the same id
//! for the same grid cell and reruns reproduce identical file names.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::extent::BBox;

/// Error parsing a tile id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileIdError {
    /// Name doesn't match the tile id pattern.
    InvalidPattern(String),
    /// A coordinate does not fit in 64 bits.
    InvalidCoordinate(String),
}

impl fmt::Display for TileIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileIdError::InvalidPattern(s) => write!(f, "'{}' is not a tile id", s),
            TileIdError::InvalidCoordinate(s) => write!(f, "invalid tile coordinate: {}", s),
        }
    }
}

impl std::error::Error for TileIdError {}

fn to_millimetres(value: f64) -> i64 {
    (value * 1000.0).round() as i64
}

/// Tile id for `bbox`.
pub fn tile_id(bbox: &BBox) -> String {
    format!(
        "tile_{}_{}_{}_{}",
        to_millimetres(bbox[0]),
        to_millimetres(bbox[1]),
        to_millimetres(bbox[2]),
        to_millimetres(bbox[3])
    )
}

/// Tile id pattern with the four millimetre coordinates as groups.
fn tile_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^tile_(-?\d+)_(-?\d+)_(-?\d+)_(-?\d+)$").expect("tile id pattern is valid")
    })
}

/// Parse a tile id (file stem) back into its bbox.
pub fn parse_tile_id(id: &str) -> Result<BBox, TileIdError> {
    let caps = tile_id_pattern()
        .captures(id)
        .ok_or_else(|| TileIdError::InvalidPattern(id.to_string()))?;

    let mut bbox = [0.0; 4];
    for (i, slot) in bbox.iter_mut().enumerate() {
        let text = &caps[i + 1];
        let mm: i64 = text
            .parse()
            .map_err(|_| TileIdError::InvalidCoordinate(text.to_string()))?;
        *slot = mm as f64 / 1000.0;
    }
    Ok(bbox)
}

/// Returns true if both bboxes map to the same tile id.
pub fn same_tile(a: &BBox, b: &BBox) -> bool {
    a.iter()
        .zip(b.iter())
        .all(|(x, y)| to_millimetres(*x) == to_millimetres(*y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_id_format() {
        let bbox = [2_600_000.0, 1_199_488.0, 2_600_512.0, 1_200_000.0];
        assert_eq!(
            tile_id(&bbox),
            "tile_2600000000_1199488000_2600512000_1200000000"
        );
    }

    #[test]
    fn test_negative_and_fractional() {
        let bbox = [-1.0, -0.5, 3.0, 1.5];
        let id = tile_id(&bbox);
        assert_eq!(id, "tile_-1000_-500_3000_1500");
        assert_eq!(parse_tile_id(&id).unwrap(), bbox);
    }

    #[test]
    fn test_parse_rejects_other_names() {
        assert!(matches!(
            parse_tile_id("manifest"),
            Err(TileIdError::InvalidPattern(_))
        ));
        assert!(parse_tile_id("tile_1_2_3").is_err());
        assert!(parse_tile_id("tile_1_2_3_4.png").is_err());
    }

    #[test]
    fn test_parse_overflow() {
        let id = "tile_99999999999999999999_0_1_1";
        assert!(matches!(
            parse_tile_id(id),
            Err(TileIdError::InvalidCoordinate(_))
        ));
    }

    #[test]
    fn test_same_tile_ignores_sub_millimetre_noise() {
        let a = [0.0, 0.0, 512.0, 512.0];
        let b = [0.0, 1e-9, 512.000_000_1, 512.0];
        assert!(same_tile(&a, &b));
        assert!(!same_tile(&a, &[0.0, 0.0, 512.002, 512.0]));
    }
}

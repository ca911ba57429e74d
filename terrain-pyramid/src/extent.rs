//! Planar world-space extents.
//!
//! An [`Extent`] is stored as its top-left origin and bottom-right opposite
//! corner in projected world units, matching raster row order (rows grow
//! southward while world Y decreases).

use serde::{Deserialize, Serialize};

use crate::error::{PyramidError, PyramidResult};

/// A point in projected world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
}

impl WorldPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in world units.
///
/// Invariant: `origin.x <= opposite.x` and `origin.y >= opposite.y`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    /// Top-left corner.
    pub origin: WorldPoint,
    /// Bottom-right corner.
    pub opposite: WorldPoint,
}

impl Extent {
    /// Create an extent from its top-left and bottom-right corners.
    ///
    /// # Errors
    ///
    /// Returns a data error if the corners violate the top-left/bottom-right
    /// convention.
    pub fn new(origin: WorldPoint, opposite: WorldPoint) -> PyramidResult<Self> {
        if origin.x > opposite.x || origin.y < opposite.y {
            return Err(PyramidError::data(format!(
                "extent corners out of order: origin ({}, {}), opposite ({}, {})",
                origin.x, origin.y, opposite.x, opposite.y
            )));
        }
        Ok(Self { origin, opposite })
    }

    /// Create an extent from min/max bounds.
    pub fn from_bounds(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> PyramidResult<Self> {
        Self::new(WorldPoint::new(min_x, max_y), WorldPoint::new(max_x, min_y))
    }

    /// Extent of a raster anchored at `origin` with `width × height` pixels of
    /// `pixel_size` world units.
    pub fn from_origin(origin: WorldPoint, width: u32, height: u32, pixel_size: f64) -> Self {
        Self {
            origin,
            opposite: WorldPoint::new(
                origin.x + width as f64 * pixel_size,
                origin.y - height as f64 * pixel_size,
            ),
        }
    }

    pub fn min_x(&self) -> f64 {
        self.origin.x
    }

    pub fn max_x(&self) -> f64 {
        self.opposite.x
    }

    pub fn min_y(&self) -> f64 {
        self.opposite.y
    }

    pub fn max_y(&self) -> f64 {
        self.origin.y
    }

    pub fn width(&self) -> f64 {
        self.opposite.x - self.origin.x
    }

    pub fn height(&self) -> f64 {
        self.origin.y - self.opposite.y
    }

    /// Center of the extent, used as the renderer-local anchor.
    pub fn center(&self) -> WorldPoint {
        WorldPoint::new(
            (self.origin.x + self.opposite.x) / 2.0,
            (self.origin.y + self.opposite.y) / 2.0,
        )
    }

    /// Smallest extent covering both `self` and `other`.
    pub fn union(&self, other: &Extent) -> Extent {
        Extent {
            origin: WorldPoint::new(
                self.origin.x.min(other.origin.x),
                self.origin.y.max(other.origin.y),
            ),
            opposite: WorldPoint::new(
                self.opposite.x.max(other.opposite.x),
                self.opposite.y.min(other.opposite.y),
            ),
        }
    }

    /// Bounds as `[minX, minY, maxX, maxY]`.
    pub fn to_bbox(&self) -> BBox {
        [self.min_x(), self.min_y(), self.max_x(), self.max_y()]
    }

    /// Bounds recentred on `center`.
    pub fn recentred(&self, center: WorldPoint) -> BBox {
        [
            self.min_x() - center.x,
            self.min_y() - center.y,
            self.max_x() - center.x,
            self.max_y() - center.y,
        ]
    }
}

/// Bounding box as `[minX, minY, maxX, maxY]`, the manifest representation.
pub type BBox = [f64; 4];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_flipped_corners() {
        let result = Extent::new(WorldPoint::new(10.0, 0.0), WorldPoint::new(20.0, 5.0));
        assert!(result.unwrap_err().is_data_error());

        let result = Extent::new(WorldPoint::new(30.0, 10.0), WorldPoint::new(20.0, 0.0));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_origin_dimensions() {
        let extent = Extent::from_origin(WorldPoint::new(2_600_000.0, 1_200_000.0), 1000, 500, 2.0);
        assert_eq!(extent.width(), 2000.0);
        assert_eq!(extent.height(), 1000.0);
        assert_eq!(extent.max_x(), 2_602_000.0);
        assert_eq!(extent.min_y(), 1_199_000.0);
    }

    #[test]
    fn test_union_takes_outer_edges() {
        let a = Extent::from_bounds(0.0, 0.0, 10.0, 10.0).unwrap();
        let b = Extent::from_bounds(5.0, -5.0, 20.0, 8.0).unwrap();
        let u = a.union(&b);
        assert_eq!(u.to_bbox(), [0.0, -5.0, 20.0, 10.0]);
    }

    #[test]
    fn test_center_and_recentred() {
        let extent = Extent::from_bounds(100.0, 200.0, 300.0, 600.0).unwrap();
        let center = extent.center();
        assert_eq!(center, WorldPoint::new(200.0, 400.0));
        assert_eq!(extent.recentred(center), [-100.0, -200.0, 100.0, 200.0]);
    }
}

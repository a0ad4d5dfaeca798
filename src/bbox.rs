//! Axis-aligned bounding boxes in pixel coordinates.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Axis-aligned rectangle `(x1, y1, x2, y2)` in integer pixel coordinates.
///
/// Serialized as a plain `[x1, y1, x2, y2]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Bbox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Bbox {
    /// Create a box without checking `x1 <= x2` / `y1 <= y2`.
    ///
    /// Malformed boxes are tolerated everywhere in the crate: they score zero
    /// overlap and never match.
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Create a box, rejecting inverted corners.
    pub fn try_new(x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Self> {
        if x2 < x1 || y2 < y1 {
            return Err(Error::InvalidBbox(format!(
                "corners must satisfy x1 <= x2 and y1 <= y2, got ({}, {}, {}, {})",
                x1, y1, x2, y2
            )));
        }
        Ok(Self::new(x1, y1, x2, y2))
    }

    /// Create a box from its top-left corner and size.
    pub const fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// Horizontal extent, widened to `i64` before subtracting.
    #[inline]
    pub fn width(&self) -> i64 {
        i64::from(self.x2) - i64::from(self.x1)
    }

    #[inline]
    pub fn height(&self) -> i64 {
        i64::from(self.y2) - i64::from(self.y1)
    }

    /// Area in square pixels. Any pair of `i32` corners fits; malformed boxes
    /// yield a non-positive value.
    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }

    /// Midpoint of the box in floating point.
    pub fn center(&self) -> Point2<f64> {
        Point2::new(
            (f64::from(self.x1) + f64::from(self.x2)) / 2.0,
            (f64::from(self.y1) + f64::from(self.y2)) / 2.0,
        )
    }

    /// Translate the box by `(dx, dy)`.
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(
            self.x1.saturating_add(dx),
            self.y1.saturating_add(dy),
            self.x2.saturating_add(dx),
            self.y2.saturating_add(dy),
        )
    }

    pub fn to_array(&self) -> [i32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

impl From<[i32; 4]> for Bbox {
    fn from(v: [i32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Bbox> for [i32; 4] {
    fn from(b: Bbox) -> Self {
        b.to_array()
    }
}

impl From<(i32, i32, i32, i32)> for Bbox {
    fn from((x1, y1, x2, y2): (i32, i32, i32, i32)) -> Self {
        Self::new(x1, y1, x2, y2)
    }
}

impl fmt::Display for Bbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}

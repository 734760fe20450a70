//! Bounding-box primitives shared by the association and risk engines.

use serde::{Deserialize, Serialize};

/// Axis-aligned pixel box `(x1, y1, x2, y2)`.
///
/// Boxes built by the normalizer always satisfy `x1 < x2` and `y1 < y2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BBox {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn is_well_formed(&self) -> bool {
        self.x1 < self.x2 && self.y1 < self.y2
    }

    pub fn center(&self) -> (i64, i64) {
        center(self)
    }
}

/// Integer midpoint of a box (floor division, so centers stay on the pixel grid).
pub fn center(bbox: &BBox) -> (i64, i64) {
    let cx = (bbox.x1 as i64 + bbox.x2 as i64).div_euclid(2);
    let cy = (bbox.y1 as i64 + bbox.y2 as i64).div_euclid(2);
    (cx, cy)
}

/// Euclidean distance between the centers of two boxes.
pub fn distance(a: &BBox, b: &BBox) -> f64 {
    let (ax, ay) = center(a);
    let (bx, by) = center(b);
    ((ax - bx) as f64).hypot((ay - by) as f64)
}

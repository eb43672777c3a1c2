//! Geometry primitives shared by labels, shapes and the interpolation engine.
//!
//! Coordinates are image pixels. `Rect2D` stores two corners rather than an
//! origin plus size so that a rectangle being dragged out from any corner can
//! be updated one coordinate at a time and normalized when the gesture ends.

#[cfg(test)]
#[path = "geom_test.rs"]
mod geom_test;

use serde::{Deserialize, Serialize};

/// A point in image space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Clamp into `bounds` (inclusive on both edges).
    #[must_use]
    pub fn clamp_to(self, bounds: &Rect2D) -> Self {
        let b = bounds.normalized();
        Self { x: self.x.clamp(b.x1, b.x2), y: self.y.clamp(b.y1, b.y2) }
    }
}

/// Axis-aligned rectangle stored as two corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect2D {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Rect2D {
    #[must_use]
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Degenerate rectangle with both corners at `p`.
    #[must_use]
    pub fn at(p: Point) -> Self {
        Self { x1: p.x, y1: p.y, x2: p.x, y2: p.y }
    }

    /// Same rectangle with `x1 <= x2` and `y1 <= y2`.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            x1: self.x1.min(self.x2),
            y1: self.y1.min(self.y2),
            x2: self.x1.max(self.x2),
            y2: self.y1.max(self.y2),
        }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).abs()
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).abs()
    }

    /// Move one corner to `p`, keeping the opposite corner fixed.
    /// Handles: 1 = top-left, 2 = top-right, 3 = bottom-right, 4 = bottom-left.
    pub fn set_corner(&mut self, handle: usize, p: Point) {
        match handle {
            1 => {
                self.x1 = p.x;
                self.y1 = p.y;
            }
            2 => {
                self.x2 = p.x;
                self.y1 = p.y;
            }
            3 => {
                self.x2 = p.x;
                self.y2 = p.y;
            }
            4 => {
                self.x1 = p.x;
                self.y2 = p.y;
            }
            _ => {}
        }
    }

    /// Translate by `(dx, dy)`.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.x1 += dx;
        self.x2 += dx;
        self.y1 += dy;
        self.y2 += dy;
    }
}

/// How a path point participates in the outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathPointType {
    /// Regular vertex on the outline.
    #[default]
    Vertex,
    /// Bezier control point between two vertices.
    Bezier,
}

/// One point of a polygon or polyline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub kind: PathPointType,
}

impl PathPoint {
    #[must_use]
    pub fn vertex(p: Point) -> Self {
        Self { x: p.x, y: p.y, kind: PathPointType::Vertex }
    }
}

/// Polygon (closed) or polyline (open) outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathShape {
    pub points: Vec<PathPoint>,
    pub closed: bool,
}

/// Concrete geometry held by a shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Geometry {
    Rect(Rect2D),
    Path(PathShape),
}

impl Geometry {
    /// Whether both geometries have the same kind and the same number of
    /// degrees of freedom, so they can be interpolated field by field.
    #[must_use]
    pub fn is_compatible(&self, other: &Geometry) -> bool {
        match (self, other) {
            (Self::Rect(_), Self::Rect(_)) => true,
            (Self::Path(a), Self::Path(b)) => a.points.len() == b.points.len() && a.closed == b.closed,
            _ => false,
        }
    }

    /// Per-field linear interpolation: `self` at `t = 0`, `other` at `t = 1`.
    ///
    /// Returns `None` when the geometries are not compatible. Point type tags
    /// are taken from `self`.
    #[must_use]
    pub fn lerp(&self, other: &Geometry, t: f64) -> Option<Geometry> {
        match (self, other) {
            (Self::Rect(a), Self::Rect(b)) => Some(Self::Rect(Rect2D {
                x1: lerp(a.x1, b.x1, t),
                y1: lerp(a.y1, b.y1, t),
                x2: lerp(a.x2, b.x2, t),
                y2: lerp(a.y2, b.y2, t),
            })),
            (Self::Path(a), Self::Path(b)) if self.is_compatible(other) => {
                let points = a
                    .points
                    .iter()
                    .zip(&b.points)
                    .map(|(p, q)| PathPoint { x: lerp(p.x, q.x, t), y: lerp(p.y, q.y, t), kind: p.kind })
                    .collect();
                Some(Self::Path(PathShape { points, closed: a.closed }))
            }
            _ => None,
        }
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

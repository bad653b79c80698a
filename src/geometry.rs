//! Pixel-space geometry shared by the store, controllers and hosts.

use serde::{Deserialize, Serialize};

/// A pointer or origin position in desktop pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Signed origin with positive size. Windows may sit partly or fully
/// off-screen, so `x`/`y` are allowed to go negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Geometry {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_half_open() {
        let g = Geometry::new(10.0, 10.0, 20.0, 5.0);
        assert!(g.contains(Point::new(10.0, 10.0)));
        assert!(g.contains(Point::new(29.9, 14.9)));
        assert!(!g.contains(Point::new(30.0, 12.0)));
        assert!(!g.contains(Point::new(12.0, 15.0)));
    }

    #[test]
    fn negative_origin_is_still_finite() {
        let g = Geometry::new(-40.0, -3.0, 200.0, 150.0);
        assert!(g.is_finite());
        assert_eq!(g.right(), 160.0);
        assert!(!Geometry::new(f64::NAN, 0.0, 1.0, 1.0).is_finite());
    }
}

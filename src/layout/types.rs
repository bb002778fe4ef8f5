//! Geometry value types shared by the layout engine

use serde::Deserialize;

/// A 2D point in the coordinate system
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Width and height pair
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Horizontal and vertical displacement
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Offset {
    pub horizontal: f64,
    pub vertical: f64,
}

impl Offset {
    pub fn new(horizontal: f64, vertical: f64) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }
}

/// Distances measured inward from each edge of a rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct EdgeInsets {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

impl EdgeInsets {
    pub fn new(top: f64, left: f64, bottom: f64, right: f64) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// Same inset on every edge
    pub fn uniform(inset: f64) -> Self {
        Self::new(inset, inset, inset, inset)
    }

    pub fn zero() -> Self {
        Self::uniform(0.0)
    }
}

/// The rectangle a view occupies, in absolute coordinates
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Frame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Frame {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a zero-sized frame at the origin
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Right edge x-coordinate
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge y-coordinate
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Center point of the frame
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// True when every component differs by at most `tolerance`
    pub fn approx_eq(&self, other: &Frame, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.width - other.width).abs() <= tolerance
            && (self.height - other.height).abs() <= tolerance
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::zero()
    }
}

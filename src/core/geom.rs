//! Axis-Aligned Bounding Boxes
//!
//! All overlap tests in the simulation go through [`Aabb`]. Coordinates are
//! world pixels with `y` growing upward from the floor.

use serde::{Serialize, Deserialize};

/// Axis-aligned rectangle, stored as its lower-left corner plus size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Left edge
    pub x: f32,
    /// Bottom edge
    pub y: f32,
    /// Width (never negative)
    pub w: f32,
    /// Height (never negative)
    pub h: f32,
}

impl Aabb {
    /// Create a new box. Negative sizes are clamped to zero.
    #[inline]
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w: w.max(0.0), h: h.max(0.0) }
    }

    /// Right edge.
    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    /// Top edge.
    #[inline]
    pub fn top(&self) -> f32 {
        self.y + self.h
    }

    /// Strict overlap test. Touching edges do not overlap.
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.top()
            && other.y < self.top()
    }

    /// Horizontal-only overlap test.
    #[inline]
    pub fn overlaps_x(&self, other: &Aabb) -> bool {
        self.x < other.right() && other.x < self.right()
    }

    /// Shrink the box by `dx` on the left and right and `dy` on the top and
    /// bottom. Never produces a negative size.
    #[inline]
    pub fn inset(&self, dx: f32, dy: f32) -> Aabb {
        let w = (self.w - 2.0 * dx).max(0.0);
        let h = (self.h - 2.0 * dy).max(0.0);
        Aabb {
            x: self.x + (self.w - w) / 2.0,
            y: self.y + (self.h - h) / 2.0,
            w,
            h,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap() {
        let a = Aabb::new(0.0, 0.0, 10.0, 10.0);
        let b = Aabb::new(5.0, 5.0, 10.0, 10.0);
        let c = Aabb::new(20.0, 0.0, 10.0, 10.0);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_touching_edges_do_not_overlap() {
        let a = Aabb::new(0.0, 0.0, 10.0, 10.0);
        let b = Aabb::new(10.0, 0.0, 10.0, 10.0);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_inset_keeps_center() {
        let a = Aabb::new(0.0, 0.0, 40.0, 60.0);
        let hit = a.inset(6.0, 4.0);
        assert_eq!(hit, Aabb::new(6.0, 4.0, 28.0, 52.0));
    }

    #[test]
    fn test_inset_never_negative() {
        let a = Aabb::new(0.0, 0.0, 4.0, 4.0);
        let hit = a.inset(10.0, 10.0);
        assert_eq!(hit.w, 0.0);
        assert_eq!(hit.h, 0.0);
        assert_eq!(hit.x, 2.0);
    }
}

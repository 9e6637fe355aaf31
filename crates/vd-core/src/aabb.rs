//! Axis-aligned bounding boxes.
//!
//! A box with `width <= 0` or `height <= 0` is *empty*: it has no area.
//! Negative extents are a valid sentinel (see [`Aabb::EMPTY`]), not an
//! error, and such a box is *void*. `union` ignores void operands and
//! `intersect` of disjoint boxes yields a void box. Zero extents are still
//! real geometry (a horizontal line, a point-sized node), so unions,
//! transforms and the spatial index keep them.

use crate::transform::Transform;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Aabb {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Aabb {
    /// Canonical empty box. Union with it is the identity.
    pub const EMPTY: Self = Self {
        x: 0.0,
        y: 0.0,
        width: -1.0,
        height: -1.0,
    };

    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_min_max(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    pub fn set(&mut self, x: f64, y: f64, width: f64, height: f64) -> &mut Self {
        *self = Self::new(x, y, width, height);
        self
    }

    pub fn copy_from(&mut self, other: &Self) -> &mut Self {
        *self = *other;
        self
    }

    /// Min/max reduction over `points`. An empty slice yields a zeroed box.
    pub fn from_points(points: &[(f64, f64)]) -> Self {
        let Some(&(x0, y0)) = points.first() else {
            return Self::default();
        };
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (x0, y0, x0, y0);
        for &(x, y) in &points[1..] {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Self::from_min_max(min_x, min_y, max_x, max_y)
    }

    pub fn set_from_points(&mut self, points: &[(f64, f64)]) -> &mut Self {
        *self = Self::from_points(points);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Negative extent: the [`Aabb::EMPTY`] sentinel or a disjoint
    /// intersection. Zero-extent boxes are not void.
    pub fn is_void(&self) -> bool {
        self.width < 0.0 || self.height < 0.0
    }

    pub fn min_x(&self) -> f64 {
        self.x
    }

    pub fn min_y(&self) -> f64 {
        self.y
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.width * self.height
        }
    }

    /// Smallest box containing both. Void operands are ignored.
    pub fn union(&self, other: &Self) -> Self {
        match (self.is_void(), other.is_void()) {
            (true, true) => Self::EMPTY,
            (true, false) => *other,
            (false, true) => *self,
            (false, false) => Self::from_min_max(
                self.x.min(other.x),
                self.y.min(other.y),
                self.max_x().max(other.max_x()),
                self.max_y().max(other.max_y()),
            ),
        }
    }

    /// Overlap of both boxes. Disjoint boxes produce a void box; check
    /// [`Aabb::is_void`] (touching boxes give a zero-extent overlap).
    pub fn intersect(&self, other: &Self) -> Self {
        Self::from_min_max(
            self.x.max(other.x),
            self.y.max(other.y),
            self.max_x().min(other.max_x()),
            self.max_y().min(other.max_y()),
        )
    }

    /// Map all four corners and re-axis-align. Not a tight rotated box.
    pub fn transform(&self, t: &Transform) -> Self {
        if self.is_void() {
            return *self;
        }
        let corners = [
            t.transform_point(self.x, self.y),
            t.transform_point(self.max_x(), self.y),
            t.transform_point(self.max_x(), self.max_y()),
            t.transform_point(self.x, self.max_y()),
        ];
        Self::from_points(&corners)
    }

    /// Grow every edge by `margin` (negative shrinks).
    pub fn expand(&self, margin: f64) -> Self {
        Self::new(
            self.x - margin,
            self.y - margin,
            self.width + margin * 2.0,
            self.height + margin * 2.0,
        )
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Inclusive on every edge.
    pub fn contains_point(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.max_x() && py >= self.y && py <= self.max_y()
    }

    pub fn contains_aabb(&self, other: &Self) -> bool {
        if other.is_void() {
            return true;
        }
        other.x >= self.x
            && other.y >= self.y
            && other.max_x() <= self.max_x()
            && other.max_y() <= self.max_y()
    }

    /// Overlap test. Touching edges count as intersecting.
    pub fn intersects_aabb(&self, other: &Self) -> bool {
        self.x <= other.max_x()
            && self.max_x() >= other.x
            && self.y <= other.max_y()
            && self.max_y() >= other.y
    }

    /// Euclidean distance to the nearest edge, 0 if the point is inside.
    pub fn distance_to_point(&self, px: f64, py: f64) -> f64 {
        let dx = (self.x - px).max(0.0).max(px - self.max_x());
        let dy = (self.y - py).max(0.0).max(py - self.max_y());
        dx.hypot(dy)
    }

    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        (self.x - other.x).abs() <= epsilon
            && (self.y - other.y).abs() <= epsilon
            && (self.width - other.width).abs() <= epsilon
            && (self.height - other.height).abs() <= epsilon
    }

    pub fn to_kurbo_rect(&self) -> kurbo::Rect {
        kurbo::Rect::new(self.x, self.y, self.max_x(), self.max_y())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn empty_point_list_is_zeroed() {
        assert_eq!(Aabb::from_points(&[]), Aabb::new(0.0, 0.0, 0.0, 0.0));
        assert_eq!(Aabb::from_points(&[(3.0, 4.0)]), Aabb::new(3.0, 4.0, 0.0, 0.0));
    }

    #[test]
    fn zero_extent_is_empty_but_not_void() {
        let line = Aabb::new(0.0, 50.0, 100.0, 0.0);
        assert!(line.is_empty());
        assert!(!line.is_void());
        assert!(Aabb::EMPTY.is_void());
        assert_eq!(line.union(&Aabb::new(10.0, 0.0, 5.0, 5.0)), Aabb::new(0.0, 0.0, 100.0, 50.0));
        let moved = line.transform(&Transform::from_translation(5.0, 5.0));
        assert_eq!(moved, Aabb::new(5.0, 55.0, 100.0, 0.0));
    }

    #[test]
    fn from_points_reduces_min_max() {
        let b = Aabb::from_points(&[(3.0, 4.0), (-1.0, 10.0), (5.0, 2.0)]);
        assert_eq!(b, Aabb::new(-1.0, 2.0, 6.0, 8.0));
    }

    #[test]
    fn negative_extent_is_empty_not_error() {
        let b = Aabb::new(10.0, 10.0, -5.0, 3.0);
        assert!(b.is_empty());
        assert_eq!(b.area(), 0.0);
    }

    #[test]
    fn union_is_idempotent() {
        let a = Aabb::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(a.union(&a), a);
    }

    #[test]
    fn union_contains_both() {
        let a = Aabb::new(0.0, 0.0, 10.0, 10.0);
        let b = Aabb::new(20.0, -5.0, 5.0, 5.0);
        let u = a.union(&b);
        assert!(u.contains_aabb(&a));
        assert!(u.contains_aabb(&b));
        assert_eq!(u, b.union(&a));
    }

    #[test]
    fn union_ignores_empty() {
        let a = Aabb::new(5.0, 5.0, 1.0, 1.0);
        assert_eq!(a.union(&Aabb::EMPTY), a);
        assert_eq!(Aabb::EMPTY.union(&a), a);
    }

    #[test]
    fn disjoint_intersection_is_empty() {
        let a = Aabb::new(0.0, 0.0, 10.0, 10.0);
        let b = Aabb::new(20.0, 20.0, 5.0, 5.0);
        assert!(a.intersect(&b).is_empty());
        assert_eq!(a.intersect(&Aabb::new(5.0, 5.0, 10.0, 10.0)), Aabb::new(5.0, 5.0, 5.0, 5.0));
    }

    #[test]
    fn touching_edges_intersect() {
        let a = Aabb::new(0.0, 0.0, 10.0, 10.0);
        let b = Aabb::new(10.0, 0.0, 10.0, 10.0);
        assert!(a.intersects_aabb(&b));
        assert!(!a.intersects_aabb(&Aabb::new(10.5, 0.0, 1.0, 1.0)));
    }

    #[test]
    fn transform_realigns_rotated_corners() {
        let b = Aabb::new(0.0, 0.0, 10.0, 20.0);
        let mapped = b.transform(&Transform::from_rotation(FRAC_PI_2));
        assert!(mapped.approx_eq(&Aabb::new(-20.0, 0.0, 20.0, 10.0), 1e-9));
    }

    #[test]
    fn distance_is_zero_inside() {
        let b = Aabb::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(b.distance_to_point(5.0, 5.0), 0.0);
        assert_eq!(b.distance_to_point(13.0, 14.0), 5.0);
        assert_eq!(b.distance_to_point(-2.0, 5.0), 2.0);
    }
}

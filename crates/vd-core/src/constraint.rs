//! Responsive-resize constraints.
//!
//! When a container is resized, each child with constraints recomputes its
//! box in the container's local space. Constraints apply in list order; each
//! one sees the box produced by the previous.

use crate::aabb::Aabb;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizontalConstraint {
    #[default]
    Left,
    Right,
    LeftRight,
    Center,
    Scale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalConstraint {
    #[default]
    Top,
    Bottom,
    TopBottom,
    Center,
    Scale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Constraint {
    #[serde(default)]
    pub horizontal: HorizontalConstraint,
    #[serde(default)]
    pub vertical: VerticalConstraint,
}

#[derive(Clone, Copy)]
enum Axis {
    Min,
    Max,
    Stretch,
    Center,
    Scale,
}

/// Reposition one axis span `(start, len)` for a container going `old → new`.
fn resolve_axis(mode: Axis, start: f64, len: f64, old: f64, new: f64) -> (f64, f64) {
    let delta = new - old;
    match mode {
        Axis::Min => (start, len),
        Axis::Max => (start + delta, len),
        Axis::Stretch => (start, (len + delta).max(0.0)),
        Axis::Center => (start + delta / 2.0, len),
        Axis::Scale => {
            if old.abs() <= f64::EPSILON {
                (start, len)
            } else {
                let ratio = new / old;
                (start * ratio, len * ratio)
            }
        }
    }
}

impl Constraint {
    pub fn new(horizontal: HorizontalConstraint, vertical: VerticalConstraint) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }

    /// New box for `child` (in the container's space) after the container
    /// goes from `old_size` to `new_size`.
    pub fn resolve(&self, child: &Aabb, old_size: (f64, f64), new_size: (f64, f64)) -> Aabb {
        let h = match self.horizontal {
            HorizontalConstraint::Left => Axis::Min,
            HorizontalConstraint::Right => Axis::Max,
            HorizontalConstraint::LeftRight => Axis::Stretch,
            HorizontalConstraint::Center => Axis::Center,
            HorizontalConstraint::Scale => Axis::Scale,
        };
        let v = match self.vertical {
            VerticalConstraint::Top => Axis::Min,
            VerticalConstraint::Bottom => Axis::Max,
            VerticalConstraint::TopBottom => Axis::Stretch,
            VerticalConstraint::Center => Axis::Center,
            VerticalConstraint::Scale => Axis::Scale,
        };
        let (x, width) = resolve_axis(h, child.x, child.width, old_size.0, new_size.0);
        let (y, height) = resolve_axis(v, child.y, child.height, old_size.1, new_size.1);
        Aabb::new(x, y, width, height)
    }
}

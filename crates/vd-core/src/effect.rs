//! Visual effects attached to nodes.
//!
//! Effects change appearance only. The scene asks each one how far it
//! pushes the node's painted area out (`expand_bounds`) and never lets an
//! effect influence layout.

use crate::aabb::Aabb;
use crate::model::Color;
use serde::{Deserialize, Serialize};

fn enabled_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    DropShadow {
        offset_x: f64,
        offset_y: f64,
        blur: f64,
        #[serde(default)]
        spread: f64,
        color: Color,
        #[serde(default = "enabled_default")]
        enabled: bool,
    },
    /// Painted inside the shape, so it never grows the bounds.
    InnerShadow {
        offset_x: f64,
        offset_y: f64,
        blur: f64,
        color: Color,
        #[serde(default = "enabled_default")]
        enabled: bool,
    },
    LayerBlur {
        radius: f64,
        #[serde(default = "enabled_default")]
        enabled: bool,
    },
    /// Blurs what is behind the node, clipped to its shape.
    BackgroundBlur {
        radius: f64,
        #[serde(default = "enabled_default")]
        enabled: bool,
    },
}

impl Effect {
    pub fn drop_shadow(offset_x: f64, offset_y: f64, blur: f64, color: Color) -> Self {
        Self::DropShadow {
            offset_x,
            offset_y,
            blur,
            spread: 0.0,
            color,
            enabled: true,
        }
    }

    pub fn layer_blur(radius: f64) -> Self {
        Self::LayerBlur {
            radius,
            enabled: true,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::DropShadow { .. } => "drop_shadow",
            Self::InnerShadow { .. } => "inner_shadow",
            Self::LayerBlur { .. } => "layer_blur",
            Self::BackgroundBlur { .. } => "background_blur",
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            Self::DropShadow { enabled, .. }
            | Self::InnerShadow { enabled, .. }
            | Self::LayerBlur { enabled, .. }
            | Self::BackgroundBlur { enabled, .. } => *enabled,
        }
    }

    pub fn set_enabled(&mut self, on: bool) {
        match self {
            Self::DropShadow { enabled, .. }
            | Self::InnerShadow { enabled, .. }
            | Self::LayerBlur { enabled, .. }
            | Self::BackgroundBlur { enabled, .. } => *enabled = on,
        }
    }

    /// Painted area of a node with local bounds `bounds` once this effect applies.
    pub fn expand_bounds(&self, bounds: &Aabb) -> Aabb {
        if !self.is_enabled() || bounds.is_void() {
            return *bounds;
        }
        match self {
            Self::DropShadow {
                offset_x,
                offset_y,
                blur,
                spread,
                ..
            } => {
                let shadow = bounds
                    .translate(*offset_x, *offset_y)
                    .expand((blur + spread).max(0.0));
                bounds.union(&shadow)
            }
            Self::LayerBlur { radius, .. } => bounds.expand(radius.max(0.0)),
            Self::InnerShadow { .. } | Self::BackgroundBlur { .. } => *bounds,
        }
    }

    /// Render-cost estimate used by the complexity score.
    pub fn complexity(&self) -> f64 {
        if self.is_enabled() { 2.0 } else { 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_shadow_grows_toward_offset() {
        let b = Aabb::new(0.0, 0.0, 100.0, 50.0);
        let fx = Effect::drop_shadow(10.0, 5.0, 4.0, Color::BLACK);
        assert_eq!(fx.expand_bounds(&b), Aabb::new(0.0, 0.0, 114.0, 59.0));
    }

    #[test]
    fn layer_blur_grows_every_edge() {
        let b = Aabb::new(10.0, 10.0, 10.0, 10.0);
        assert_eq!(Effect::layer_blur(3.0).expand_bounds(&b), Aabb::new(7.0, 7.0, 16.0, 16.0));
    }

    #[test]
    fn disabled_and_inner_effects_leave_bounds() {
        let b = Aabb::new(0.0, 0.0, 10.0, 10.0);
        let mut blur = Effect::layer_blur(8.0);
        blur.set_enabled(false);
        assert_eq!(blur.expand_bounds(&b), b);
        let inner = Effect::InnerShadow {
            offset_x: 2.0,
            offset_y: 2.0,
            blur: 6.0,
            color: Color::BLACK,
            enabled: true,
        };
        assert_eq!(inner.expand_bounds(&b), b);
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(Effect::layer_blur(2.0)).unwrap();
        assert_eq!(json["type"], "layer_blur");
        let back: Effect = serde_json::from_value(serde_json::json!({"type": "layer_blur", "radius": 2.0})).unwrap();
        assert!(back.is_enabled());
    }
}

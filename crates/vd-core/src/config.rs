//! Tunables for the scene and its spatial index.
//!
//! Every struct has a `Default` and deserializes with missing fields falling
//! back to that default, so hosts can ship partial JSON overrides.

use crate::aabb::Aabb;
use serde::{Deserialize, Serialize};

/// QuadTree split policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadTreeConfig {
    /// Objects a leaf may hold before it splits.
    pub max_objects: usize,
    /// Deepest level a split may create (root is level 0).
    pub max_levels: u32,
}

impl Default for QuadTreeConfig {
    fn default() -> Self {
        Self {
            max_objects: 10,
            max_levels: 5,
        }
    }
}

/// The canvas (viewport) dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

/// Scene-level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Root region of the spatial index. Nodes outside it are still indexed.
    pub index_bounds: Aabb,
    pub quadtree: QuadTreeConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            index_bounds: Aabb::new(-16384.0, -16384.0, 32768.0, 32768.0),
            quadtree: QuadTreeConfig::default(),
        }
    }
}

impl SceneConfig {
    /// Parse a (possibly partial) JSON override.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg = SceneConfig::from_json(r#"{ "quadtree": { "max_objects": 4 } }"#).unwrap();
        assert_eq!(cfg.quadtree.max_objects, 4);
        assert_eq!(cfg.quadtree.max_levels, 5);
        assert_eq!(cfg.index_bounds, SceneConfig::default().index_bounds);
    }
}

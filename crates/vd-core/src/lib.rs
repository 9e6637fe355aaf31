pub mod aabb;
pub mod config;
pub mod constraint;
pub mod effect;
pub mod error;
pub mod id;
pub mod layers;
pub mod layout;
pub mod model;
pub mod node;
pub mod quadtree;
pub mod scene;
pub mod serial;
pub mod transform;

pub use aabb::Aabb;
pub use config::{QuadTreeConfig, SceneConfig, Viewport};
pub use constraint::{Constraint, HorizontalConstraint, VerticalConstraint};
pub use effect::Effect;
pub use error::SceneError;
pub use id::NodeId;
pub use layers::{BatchKey, Layer, LayerId, LayerManager, RenderBatch, SortedLayer};
pub use layout::{AutoLayout, LayoutAlign, LayoutDirection};
pub use model::*;
pub use node::SceneNode;
pub use quadtree::{QuadTree, QuadTreeStats};
pub use scene::{IntegrityIssue, QueryFilter, Scene, SceneEvent, TraverseOptions};
pub use serial::NodeJson;
pub use transform::{Decomposed, Transform};

// Re-export petgraph types so downstream crates don't need a direct dependency
pub use petgraph::graph::NodeIndex;

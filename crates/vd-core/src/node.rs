//! Scene nodes.
//!
//! A `SceneNode` is the arena payload of [`crate::scene::Scene`]. It owns
//! its local state (kind, transform, effects, constraints, layout) and the
//! caches the scene derives from it. Hierarchy links are arena indices;
//! every structural edit goes through `Scene` so dirty flags, the spatial
//! index and listeners stay consistent.

use crate::aabb::Aabb;
use crate::constraint::Constraint;
use crate::effect::Effect;
use crate::id::NodeId;
use crate::layers::LayerId;
use crate::layout::AutoLayout;
use crate::model::{BlendMode, NodeKind};
use crate::transform::Transform;
use petgraph::graph::NodeIndex;
use smallvec::SmallVec;

#[derive(Debug, Clone)]
pub struct SceneNode {
    /// Unique for the lifetime of the process; never reused.
    pub id: NodeId,

    /// Identity shared by snapshots of the same logical object (clones
    /// made for version history). Equals `id` for originals.
    pub logical_id: NodeId,

    pub name: String,
    pub kind: NodeKind,

    pub visible: bool,
    pub locked: bool,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    pub layer: LayerId,
    /// Paint order within the layer. Ties keep document order.
    pub z_index: i32,
    pub tags: SmallVec<[String; 2]>,

    pub effects: SmallVec<[Effect; 2]>,
    pub constraints: SmallVec<[Constraint; 1]>,
    pub layout: Option<AutoLayout>,

    pub(crate) transform: Transform,
    pub(crate) children: SmallVec<[NodeIndex; 4]>,

    // ─── Derived caches ──────────────────────────────────────────────
    pub(crate) world: Transform,
    /// Own painted area in world space, children excluded.
    pub(crate) own_world_bounds: Aabb,
    /// Own painted area unioned with every descendant's.
    pub(crate) world_bounds: Aabb,
    pub(crate) transform_dirty: bool,
    pub(crate) bounds_dirty: bool,
    /// Bumped every time `world` is recomputed.
    pub(crate) world_generation: u64,
    /// Parent generation `world` was last composed against.
    pub(crate) parent_generation: u64,
}

impl SceneNode {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            logical_id: id,
            name: String::new(),
            kind,
            visible: true,
            locked: false,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            layer: LayerId::DEFAULT,
            z_index: 0,
            tags: SmallVec::new(),
            effects: SmallVec::new(),
            constraints: SmallVec::new(),
            layout: None,
            transform: Transform::identity(),
            children: SmallVec::new(),
            world: Transform::identity(),
            own_world_bounds: Aabb::EMPTY,
            world_bounds: Aabb::EMPTY,
            transform_dirty: true,
            bounds_dirty: true,
            world_generation: 0,
            parent_generation: 0,
        }
    }

    /// New node with a fresh id prefixed by the kind (`shape_12`).
    pub fn fresh(kind: NodeKind) -> Self {
        let id = NodeId::with_prefix(kind.tag().as_str());
        Self::new(id, kind)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Builder shorthand for a pure translation.
    pub fn at(self, x: f64, y: f64) -> Self {
        self.with_transform(Transform::from_translation(x, y))
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_layout(mut self, layout: AutoLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn with_layer(mut self, layer: LayerId) -> Self {
        self.layer = layer;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    // ─── Read access ─────────────────────────────────────────────────

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn children(&self) -> &[NodeIndex] {
        &self.children
    }

    /// Cached world transform. Only valid right after `Scene::update_transform`.
    pub fn world_transform(&self) -> &Transform {
        &self.world
    }

    /// Cached subtree bounds. Only valid right after `Scene::update_bounds`.
    pub fn world_bounds(&self) -> Aabb {
        self.world_bounds
    }

    /// Cached bounds of this node alone, children excluded.
    pub fn own_world_bounds(&self) -> Aabb {
        self.own_world_bounds
    }

    pub fn is_transform_dirty(&self) -> bool {
        self.transform_dirty
    }

    pub fn is_bounds_dirty(&self) -> bool {
        self.bounds_dirty
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Kind geometry in local space, grown by every enabled effect.
    pub fn local_bounds(&self) -> Aabb {
        self.effects
            .iter()
            .fold(self.kind.local_bounds(), |b, fx| fx.expand_bounds(&b))
    }

    /// Kind geometry alone, the box layout and constraints work with.
    pub fn layout_bounds(&self) -> Aabb {
        self.kind.local_bounds()
    }

    /// This node's share of the scene complexity score.
    pub fn complexity(&self) -> f64 {
        let kind = match &self.kind {
            NodeKind::Group(_) => self.children.len() as f64 * 0.3,
            other => other.complexity_weight(),
        };
        let effects: f64 = self.effects.iter().map(Effect::complexity).sum();
        1.0 + kind + effects
    }
}

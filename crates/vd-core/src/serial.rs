//! Document JSON shape.
//!
//! ```text
//! Node := { id, kind, name, properties: {...}, transform: {a,b,c,d,e,f},
//!           effects: [...], constraints: [...], layout: {...} | null,
//!           children: [Node...] }
//! ```
//!
//! Per-node presentation fields (`visible`, `opacity`, `layer`, ...) ride
//! along with defaults so older documents without them still load.
//! Loading validates the whole tree before touching the scene, so a bad
//! document never leaves a partial subtree behind.

use crate::constraint::Constraint;
use crate::effect::Effect;
use crate::error::SceneError;
use crate::id::NodeId;
use crate::layers::LayerId;
use crate::layout::AutoLayout;
use crate::model::{BlendMode, KindTag, NodeKind};
use crate::node::SceneNode;
use crate::scene::Scene;
use crate::transform::Transform;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

fn default_true() -> bool {
    true
}

fn default_opacity() -> f32 {
    1.0
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeJson {
    pub id: NodeId,
    pub kind: KindTag,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub properties: serde_json::Value,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub layout: Option<AutoLayout>,
    #[serde(default)]
    pub children: Vec<NodeJson>,

    /// Present only when it differs from `id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_id: Option<NodeId>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "is_default")]
    pub locked: bool,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default, skip_serializing_if = "is_default")]
    pub blend_mode: BlendMode,
    #[serde(default, skip_serializing_if = "is_default")]
    pub layer: LayerId,
    #[serde(default, skip_serializing_if = "is_default")]
    pub z_index: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl NodeJson {
    /// Total node count in this subtree.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(NodeJson::count).sum::<usize>()
    }

    fn to_node(&self) -> Result<SceneNode, SceneError> {
        let props = match &self.properties {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            other => other.clone(),
        };
        let kind = NodeKind::from_parts(self.kind, props)?;
        let mut node = SceneNode::new(self.id, kind).with_transform(self.transform.clone());
        node.logical_id = self.logical_id.unwrap_or(self.id);
        node.name = self.name.clone();
        node.visible = self.visible;
        node.locked = self.locked;
        node.opacity = self.opacity;
        node.blend_mode = self.blend_mode;
        node.layer = self.layer;
        node.z_index = self.z_index;
        node.tags = self.tags.iter().cloned().collect();
        node.effects = self.effects.iter().cloned().collect();
        node.constraints = self.constraints.iter().cloned().collect();
        node.layout = self.layout;
        Ok(node)
    }
}

impl Scene {
    /// Serialize the subtree rooted at `idx`.
    pub fn to_json(&self, idx: NodeIndex) -> Result<NodeJson, SceneError> {
        let node = self.get(idx).ok_or(SceneError::MissingNode(idx))?;
        let (kind, properties) = node.kind.to_parts()?;
        let children = self
            .children(idx)
            .iter()
            .map(|&child| self.to_json(child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NodeJson {
            id: node.id,
            kind,
            name: node.name.clone(),
            properties,
            transform: node.transform().clone(),
            effects: node.effects.to_vec(),
            constraints: node.constraints.to_vec(),
            layout: node.layout,
            children,
            logical_id: (node.logical_id != node.id).then_some(node.logical_id),
            visible: node.visible,
            locked: node.locked,
            opacity: node.opacity,
            blend_mode: node.blend_mode,
            layer: node.layer,
            z_index: node.z_index,
            tags: node.tags.to_vec(),
        })
    }

    /// Serialize the whole document (the root subtree) as JSON text.
    pub fn to_json_string(&self) -> Result<String, SceneError> {
        match self.root() {
            Some(root) => Ok(serde_json::to_string_pretty(&self.to_json(root)?)?),
            None => Ok("null".into()),
        }
    }

    /// Rebuild a subtree, preserving ids. The new subtree is registered
    /// detached; attach it with [`Scene::add_child`]. It becomes the root
    /// if the scene has none.
    pub fn from_json(&mut self, json: &NodeJson) -> Result<NodeIndex, SceneError> {
        let mut seen = HashSet::new();
        let mut flat = Vec::with_capacity(json.count());
        self.flatten(json, None, &mut seen, &mut flat)?;

        let mut placed: Vec<NodeIndex> = Vec::with_capacity(flat.len());
        for (node, parent) in flat {
            let idx = self.insert_detached(node)?;
            if let Some(p) = parent {
                self.add_child(placed[p], idx);
            }
            placed.push(idx);
        }
        let top = placed[0];
        if self.root().is_none() {
            self.set_root(top);
        }
        log::debug!("scene: loaded {} nodes under {}", placed.len(), json.id);
        Ok(top)
    }

    /// Parse a JSON document into a fresh scene.
    pub fn load_document(text: &str) -> Result<Scene, SceneError> {
        let json: NodeJson = serde_json::from_str(text)?;
        let mut scene = Scene::new();
        scene.from_json(&json)?;
        Ok(scene)
    }

    /// Pre-order pass: convert every node, remember its parent's position
    /// in the output and reject duplicate ids.
    fn flatten(
        &self,
        json: &NodeJson,
        parent: Option<usize>,
        seen: &mut HashSet<NodeId>,
        out: &mut Vec<(SceneNode, Option<usize>)>,
    ) -> Result<(), SceneError> {
        if !seen.insert(json.id) || self.index_of(json.id).is_some() {
            return Err(SceneError::DuplicateId(json.id));
        }
        let position = out.len();
        out.push((json.to_node()?, parent));
        for child in &json.children {
            self.flatten(child, Some(position), seen, out)?;
        }
        Ok(())
    }
}

//! Named z-ordered layers and the batched draw list built from them.
//!
//! Nodes reference a layer by [`LayerId`]. The manager owns the layer
//! table and turns the scene's paint order into per-layer sorted lists and
//! then into draw batches. Batching only merges *adjacent* nodes with the
//! same material key, so it never changes what ends up on top.

use crate::effect::Effect;
use crate::id::NodeId;
use crate::model::{BlendMode, KindTag, NodeKind, Paint};
use crate::node::SceneNode;
use crate::scene::Scene;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LayerId(pub u32);

impl LayerId {
    /// The layer every node starts on. It cannot be deleted.
    pub const DEFAULT: Self = Self(0);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub z_index: i32,
    pub visible: bool,
    pub locked: bool,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    /// Node whose shape masks the whole layer.
    pub mask: Option<NodeId>,
    pub effects: Vec<Effect>,
}

impl Layer {
    fn new(id: LayerId, name: String, z_index: i32) -> Self {
        Self {
            id,
            name,
            z_index,
            visible: true,
            locked: false,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            mask: None,
            effects: Vec::new(),
        }
    }
}

/// One visible layer and its drawable members in paint order.
#[derive(Debug, Clone, PartialEq)]
pub struct SortedLayer {
    pub layer: LayerId,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    pub nodes: Vec<NodeIndex>,
}

/// Render-state key. Adjacent nodes with equal keys share a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchKey {
    pub kind: KindTag,
    pub layer: LayerId,
    pub blend_mode: BlendMode,
    pub fill: Option<Paint>,
    pub stroke: Option<Paint>,
    pub stroke_width: Option<f64>,
    /// Sorted names of the enabled effects.
    pub effects: Vec<&'static str>,
}

impl BatchKey {
    fn of(node: &SceneNode, layer: &SortedLayer) -> Self {
        let stroke = node.kind.stroke();
        let mut effects: Vec<&'static str> = node
            .effects
            .iter()
            .filter(|fx| fx.is_enabled())
            .map(Effect::kind_name)
            .collect();
        effects.sort_unstable();
        Self {
            kind: node.kind.tag(),
            layer: layer.layer,
            blend_mode: layer.blend_mode,
            fill: node.kind.fill().cloned(),
            stroke: stroke.map(|s| s.paint.clone()),
            stroke_width: stroke.map(|s| s.width),
            effects,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderBatch {
    pub key: BatchKey,
    pub opacity: f32,
    pub nodes: Vec<NodeIndex>,
}

#[derive(Debug)]
pub struct LayerManager {
    layers: BTreeMap<LayerId, Layer>,
    next_id: u32,
    version: u64,
    /// `(manager version, scene content version)` the caches were built for.
    cached_for: Option<(u64, u64)>,
    sorted: Vec<SortedLayer>,
    batches: Vec<RenderBatch>,
    rebuilds: u64,
}

impl Default for LayerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerManager {
    pub fn new() -> Self {
        let mut layers = BTreeMap::new();
        layers.insert(
            LayerId::DEFAULT,
            Layer::new(LayerId::DEFAULT, "Default".into(), 0),
        );
        Self {
            layers,
            next_id: 1,
            version: 0,
            cached_for: None,
            sorted: Vec::new(),
            batches: Vec::new(),
            rebuilds: 0,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// How many times the sorted list has been rebuilt.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    fn bump(&mut self) {
        self.version += 1;
    }

    // ─── Layer table ─────────────────────────────────────────────────

    pub fn create_layer(&mut self, name: impl Into<String>, z_index: i32) -> LayerId {
        let id = LayerId(self.next_id);
        self.next_id += 1;
        self.layers.insert(id, Layer::new(id, name.into(), z_index));
        self.bump();
        log::debug!("layers: created {id:?} at z {z_index}");
        id
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(&id)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layers in paint order: by z index, ties by id (creation order).
    pub fn ordered(&self) -> Vec<&Layer> {
        let mut layers: Vec<&Layer> = self.layers.values().collect();
        layers.sort_by_key(|l| (l.z_index, l.id));
        layers
    }

    /// Delete a layer, moving its nodes to the default layer. Deleting the
    /// default layer or an unknown id is a no-op.
    pub fn delete_layer(&mut self, scene: &mut Scene, id: LayerId) -> bool {
        if id == LayerId::DEFAULT || self.layers.remove(&id).is_none() {
            return false;
        }
        let members: Vec<NodeIndex> = scene
            .iter()
            .filter(|(_, n)| n.layer == id)
            .map(|(idx, _)| idx)
            .collect();
        for idx in &members {
            scene.set_layer(*idx, LayerId::DEFAULT);
        }
        self.bump();
        log::debug!("layers: deleted {id:?}, {} nodes moved to default", members.len());
        true
    }

    fn update_layer(&mut self, id: LayerId, f: impl FnOnce(&mut Layer)) -> bool {
        let Some(layer) = self.layers.get_mut(&id) else {
            return false;
        };
        f(layer);
        self.bump();
        true
    }

    pub fn rename_layer(&mut self, id: LayerId, name: impl Into<String>) -> bool {
        let name = name.into();
        self.update_layer(id, |l| l.name = name)
    }

    pub fn set_layer_visible(&mut self, id: LayerId, visible: bool) -> bool {
        self.update_layer(id, |l| l.visible = visible)
    }

    pub fn set_layer_locked(&mut self, id: LayerId, locked: bool) -> bool {
        self.update_layer(id, |l| l.locked = locked)
    }

    pub fn set_layer_opacity(&mut self, id: LayerId, opacity: f32) -> bool {
        self.update_layer(id, |l| l.opacity = opacity.clamp(0.0, 1.0))
    }

    pub fn set_layer_blend_mode(&mut self, id: LayerId, mode: BlendMode) -> bool {
        self.update_layer(id, |l| l.blend_mode = mode)
    }

    pub fn set_layer_z_index(&mut self, id: LayerId, z_index: i32) -> bool {
        self.update_layer(id, |l| l.z_index = z_index)
    }

    pub fn set_layer_mask(&mut self, id: LayerId, mask: Option<NodeId>) -> bool {
        self.update_layer(id, |l| l.mask = mask)
    }

    pub fn add_layer_effect(&mut self, id: LayerId, effect: Effect) -> bool {
        self.update_layer(id, |l| l.effects.push(effect))
    }

    // ─── Membership ──────────────────────────────────────────────────

    /// Move `node` onto `layer`. Unknown layers are refused.
    pub fn assign(&mut self, scene: &mut Scene, node: NodeIndex, layer: LayerId) -> bool {
        if !self.layers.contains_key(&layer) || !scene.set_layer(node, layer) {
            return false;
        }
        self.bump();
        true
    }

    /// Put `node` back on the default layer.
    pub fn unassign(&mut self, scene: &mut Scene, node: NodeIndex) -> bool {
        self.assign(scene, node, LayerId::DEFAULT)
    }

    /// The layer `node` effectively paints on. Ids this manager does not
    /// know resolve to the default layer.
    pub fn layer_of(&self, scene: &Scene, node: NodeIndex) -> Option<LayerId> {
        scene.get(node).map(|n| self.resolve(n.layer))
    }

    fn resolve(&self, id: LayerId) -> LayerId {
        if self.layers.contains_key(&id) {
            id
        } else {
            LayerId::DEFAULT
        }
    }

    pub fn is_node_locked(&self, scene: &Scene, node: NodeIndex) -> bool {
        scene.get(node).is_some_and(|n| {
            n.locked || self.layers.get(&self.resolve(n.layer)).is_some_and(|l| l.locked)
        })
    }

    /// Reassign nodes that reference unknown layers (e.g. after loading a
    /// document) to the default layer. Returns how many moved.
    pub fn sync_with_scene(&mut self, scene: &mut Scene) -> usize {
        let strays: Vec<NodeIndex> = scene
            .iter()
            .filter(|(_, n)| !self.layers.contains_key(&n.layer))
            .map(|(idx, _)| idx)
            .collect();
        for idx in &strays {
            scene.set_layer(*idx, LayerId::DEFAULT);
        }
        if !strays.is_empty() {
            self.bump();
        }
        strays.len()
    }

    // ─── Sorted & batched lists ──────────────────────────────────────

    fn ensure_cache(&mut self, scene: &Scene) {
        let key = (self.version, scene.content_version());
        if self.cached_for == Some(key) {
            return;
        }
        self.sorted = self.build_sorted(scene);
        self.batches = build_batches(scene, &self.sorted);
        self.cached_for = Some(key);
        self.rebuilds += 1;
        log::trace!(
            "layers: rebuilt {} layers into {} batches",
            self.sorted.len(),
            self.batches.len()
        );
    }

    fn build_sorted(&self, scene: &Scene) -> Vec<SortedLayer> {
        let mut members: HashMap<LayerId, Vec<(i32, NodeIndex)>> = HashMap::new();
        for idx in scene.paint_order() {
            let Some(node) = scene.get(idx) else {
                continue;
            };
            if matches!(node.kind, NodeKind::Group(_)) {
                continue;
            }
            members
                .entry(self.resolve(node.layer))
                .or_default()
                .push((node.z_index, idx));
        }
        self.ordered()
            .into_iter()
            .filter(|layer| layer.visible)
            .map(|layer| {
                let mut nodes = members.remove(&layer.id).unwrap_or_default();
                // Stable: equal z keeps paint order.
                nodes.sort_by_key(|(z, _)| *z);
                SortedLayer {
                    layer: layer.id,
                    opacity: layer.opacity,
                    blend_mode: layer.blend_mode,
                    nodes: nodes.into_iter().map(|(_, idx)| idx).collect(),
                }
            })
            .collect()
    }

    /// Visible layers in z order, each with its visible drawable nodes
    /// sorted by node z index. Groups contribute no entries of their own.
    pub fn get_sorted_nodes(&mut self, scene: &Scene) -> &[SortedLayer] {
        self.ensure_cache(scene);
        &self.sorted
    }

    /// The sorted stream cut into runs of equal [`BatchKey`].
    pub fn get_batched_nodes(&mut self, scene: &Scene) -> &[RenderBatch] {
        self.ensure_cache(scene);
        &self.batches
    }
}

fn build_batches(scene: &Scene, sorted: &[SortedLayer]) -> Vec<RenderBatch> {
    let mut batches: Vec<RenderBatch> = Vec::new();
    for layer in sorted {
        for &idx in &layer.nodes {
            let Some(node) = scene.get(idx) else {
                continue;
            };
            let key = BatchKey::of(node, layer);
            match batches.last_mut() {
                Some(last) if last.key == key => last.nodes.push(idx),
                _ => batches.push(RenderBatch {
                    key,
                    opacity: layer.opacity,
                    nodes: vec![idx],
                }),
            }
        }
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Color;
    use pretty_assertions::assert_eq;

    fn filled(color: Color) -> SceneNode {
        let mut node = SceneNode::fresh(NodeKind::rect(10.0, 10.0));
        if let NodeKind::Shape(props) = &mut node.kind {
            props.fill = Some(Paint::solid(color));
        }
        node
    }

    fn scene_with_root() -> (Scene, NodeIndex) {
        let mut scene = Scene::new();
        let root = scene.add_node(SceneNode::fresh(NodeKind::group()), None).unwrap();
        (scene, root)
    }

    #[test]
    fn default_layer_cannot_be_deleted() {
        let (mut scene, _) = scene_with_root();
        let mut layers = LayerManager::new();
        assert!(!layers.delete_layer(&mut scene, LayerId::DEFAULT));
        assert!(!layers.delete_layer(&mut scene, LayerId(42)));
        assert_eq!(layers.len(), 1);
    }

    #[test]
    fn layers_order_by_z_then_creation() {
        let mut layers = LayerManager::new();
        let top = layers.create_layer("top", 10);
        let tie_a = layers.create_layer("a", 5);
        let tie_b = layers.create_layer("b", 5);
        let ids: Vec<LayerId> = layers.ordered().iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![LayerId::DEFAULT, tie_a, tie_b, top]);
    }

    #[test]
    fn sorted_nodes_follow_layer_and_node_z() {
        let (mut scene, root) = scene_with_root();
        let mut layers = LayerManager::new();
        let overlay = layers.create_layer("overlay", 1);

        let a = scene.add_node(filled(Color::BLACK), Some(root)).unwrap();
        let b = scene.add_node(filled(Color::BLACK), Some(root)).unwrap();
        let c = scene.add_node(filled(Color::BLACK), Some(root)).unwrap();
        let d = scene.add_node(filled(Color::BLACK), Some(root)).unwrap();
        layers.assign(&mut scene, a, overlay);
        scene.set_z_index(c, -1);

        let sorted = layers.get_sorted_nodes(&scene).to_vec();
        assert_eq!(sorted.len(), 2);
        assert_eq!(sorted[0].nodes, vec![c, b, d]);
        assert_eq!(sorted[1].layer, overlay);
        assert_eq!(sorted[1].nodes, vec![a]);
    }

    #[test]
    fn repeated_fetch_is_cached_and_stable() {
        let (mut scene, root) = scene_with_root();
        let mut layers = LayerManager::new();
        for _ in 0..5 {
            scene.add_node(filled(Color::WHITE), Some(root)).unwrap();
        }
        let first = layers.get_sorted_nodes(&scene).to_vec();
        let second = layers.get_sorted_nodes(&scene).to_vec();
        assert_eq!(first, second);
        assert_eq!(layers.rebuild_count(), 1);

        // Pure moves don't change the draw list.
        let child = scene.children(root)[0];
        scene.translate_node(child, 3.0, 3.0);
        layers.get_sorted_nodes(&scene);
        assert_eq!(layers.rebuild_count(), 1);

        scene.set_visible(child, false);
        assert_eq!(layers.get_sorted_nodes(&scene)[0].nodes.len(), 4);
        assert_eq!(layers.rebuild_count(), 2);
    }

    #[test]
    fn batches_merge_only_adjacent_runs() {
        let red = Color::rgba(1.0, 0.0, 0.0, 1.0);
        let blue = Color::rgba(0.0, 0.0, 1.0, 1.0);
        let (mut scene, root) = scene_with_root();
        let mut layers = LayerManager::new();
        let r1 = scene.add_node(filled(red), Some(root)).unwrap();
        let r2 = scene.add_node(filled(red), Some(root)).unwrap();
        let b1 = scene.add_node(filled(blue), Some(root)).unwrap();
        let r3 = scene.add_node(filled(red), Some(root)).unwrap();

        let batches: Vec<Vec<NodeIndex>> = layers
            .get_batched_nodes(&scene)
            .iter()
            .map(|b| b.nodes.clone())
            .collect();
        assert_eq!(batches, vec![vec![r1, r2], vec![b1], vec![r3]]);
    }

    #[test]
    fn effects_split_batches() {
        let (mut scene, root) = scene_with_root();
        let mut layers = LayerManager::new();
        scene.add_node(filled(Color::BLACK), Some(root)).unwrap();
        scene
            .add_node(filled(Color::BLACK).with_effect(Effect::layer_blur(2.0)), Some(root))
            .unwrap();
        let batches = layers.get_batched_nodes(&scene);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].key.effects, vec!["layer_blur"]);
    }

    #[test]
    fn deleting_a_layer_moves_members_to_default() {
        let (mut scene, root) = scene_with_root();
        let mut layers = LayerManager::new();
        let temp = layers.create_layer("temp", 3);
        let n = scene.add_node(filled(Color::BLACK), Some(root)).unwrap();
        assert!(layers.assign(&mut scene, n, temp));
        assert_eq!(layers.layer_of(&scene, n), Some(temp));

        assert!(layers.delete_layer(&mut scene, temp));
        assert_eq!(scene.get(n).unwrap().layer, LayerId::DEFAULT);
        assert!(!layers.assign(&mut scene, n, temp));
    }

    #[test]
    fn hidden_and_locked_layers() {
        let (mut scene, root) = scene_with_root();
        let mut layers = LayerManager::new();
        let hidden = layers.create_layer("hidden", 1);
        let n = scene.add_node(filled(Color::BLACK), Some(root)).unwrap();
        layers.assign(&mut scene, n, hidden);
        layers.set_layer_visible(hidden, false);
        layers.set_layer_locked(hidden, true);

        let sorted = layers.get_sorted_nodes(&scene);
        assert_eq!(sorted.len(), 1);
        assert!(sorted[0].nodes.is_empty());
        assert!(layers.is_node_locked(&scene, n));
    }

    #[test]
    fn sync_reassigns_unknown_layers() {
        let (mut scene, root) = scene_with_root();
        let mut layers = LayerManager::new();
        let n = scene
            .add_node(filled(Color::BLACK).with_layer(LayerId(99)), Some(root))
            .unwrap();
        assert_eq!(layers.layer_of(&scene, n), Some(LayerId::DEFAULT));
        assert_eq!(layers.sync_with_scene(&mut scene), 1);
        assert_eq!(scene.get(n).unwrap().layer, LayerId::DEFAULT);
    }
}

//! The scene: node arena, hierarchy, cached geometry and spatial index.
//!
//! Nodes live in a `StableDiGraph` and are addressed by `NodeIndex`.
//! Parent→child edges mirror the hierarchy for ancestry lookups, while each
//! node keeps its ordered child list for paint order.
//!
//! World transforms and bounds are cached per node and recomputed lazily.
//! A node recomputes its world transform when its own transform changed or
//! when the generation of its parent's world transform differs from the one
//! it last composed with, so a read after `update_transform` never observes
//! a stale ancestor. Bounds dirtiness propagates upward on every mutation.

use crate::aabb::Aabb;
use crate::config::SceneConfig;
use crate::constraint::Constraint;
use crate::effect::Effect;
use crate::error::SceneError;
use crate::id::NodeId;
use crate::layers::LayerId;
use crate::layout::AutoLayout;
use crate::model::{KindTag, NodeKind};
use crate::node::SceneNode;
use crate::quadtree::{QuadTree, QuadTreeStats};
use crate::transform::Transform;
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use std::fmt;

// ─── Events & options ────────────────────────────────────────────────────

/// Structural and property notifications delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    NodeAdded(NodeIndex),
    NodeRemoved { index: NodeIndex, id: NodeId },
    ChildAdded { parent: NodeIndex, child: NodeIndex },
    ChildRemoved { parent: NodeIndex, child: NodeIndex },
    TransformChanged(NodeIndex),
    PropertiesChanged(NodeIndex),
    SelectionChanged,
}

pub type ListenerId = u64;

type Listener = Box<dyn FnMut(&SceneEvent)>;

/// Predicate applied on top of the spatial query in [`Scene::query_region`].
/// `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub kind: Option<KindTag>,
    pub layer: Option<LayerId>,
    pub tag: Option<String>,
    pub visible: Option<bool>,
}

impl QueryFilter {
    fn matches(&self, node: &SceneNode) -> bool {
        self.kind.is_none_or(|k| node.kind.tag() == k)
            && self.layer.is_none_or(|l| node.layer == l)
            && self.tag.as_deref().is_none_or(|t| node.has_tag(t))
            && self.visible.is_none_or(|v| node.visible == v)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TraverseOptions {
    /// Skip invisible nodes and their subtrees. The root is always visited.
    pub visible_only: bool,
    /// Deepest level visited; the root is depth 0.
    pub max_depth: Option<usize>,
}

/// A map↔tree consistency problem found by [`Scene::verify_integrity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    /// Registered in the id map but not reachable from the root.
    Orphan(NodeIndex),
    /// In the arena but missing from (or mismatched in) the id map.
    Unregistered(NodeIndex),
    /// Id map entry pointing at a vacant or different node.
    DanglingId(NodeId),
    /// More than one incoming parent edge.
    MultipleParents(NodeIndex),
    /// Ordered child list disagrees with the parent→child edges.
    ChildListMismatch(NodeIndex),
    /// Clean node whose spatial index entry differs from its bounds.
    StaleIndexEntry(NodeIndex),
}

// ─── Scene ───────────────────────────────────────────────────────────────

pub struct Scene {
    graph: StableDiGraph<SceneNode, ()>,
    root: Option<NodeIndex>,
    id_index: HashMap<NodeId, NodeIndex>,
    config: SceneConfig,

    index: QuadTree<NodeIndex>,
    /// Nodes whose cached bounds changed since the index last saw them.
    index_pending: HashSet<NodeIndex>,
    /// Topmost nodes of dirty chains, refreshed before every spatial query.
    top_pending: HashSet<NodeIndex>,
    /// Auto-layout containers whose children changed.
    layout_pending: HashSet<NodeIndex>,

    dirty_nodes: HashSet<NodeIndex>,
    selection: Vec<NodeIndex>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: ListenerId,

    generation: u64,
    content_version: u64,
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("nodes", &self.graph.node_count())
            .field("root", &self.root)
            .field("selection", &self.selection)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::with_config(SceneConfig::default())
    }

    pub fn with_config(config: SceneConfig) -> Self {
        Self {
            graph: StableDiGraph::new(),
            root: None,
            id_index: HashMap::new(),
            index: QuadTree::new(config.index_bounds, config.quadtree),
            config,
            index_pending: HashSet::new(),
            top_pending: HashSet::new(),
            layout_pending: HashSet::new(),
            dirty_nodes: HashSet::new(),
            selection: Vec::new(),
            listeners: Vec::new(),
            next_listener: 1,
            generation: 0,
            content_version: 0,
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    // ─── Lookup ──────────────────────────────────────────────────────

    pub fn root(&self) -> Option<NodeIndex> {
        self.root
    }

    /// Number of registered nodes, orphans included.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, idx: NodeIndex) -> bool {
        self.graph.contains_node(idx)
    }

    pub fn get(&self, idx: NodeIndex) -> Option<&SceneNode> {
        self.graph.node_weight(idx)
    }

    pub fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.id_index.get(&id).copied()
    }

    pub fn get_by_id(&self, id: NodeId) -> Option<&SceneNode> {
        self.index_of(id).and_then(|idx| self.graph.node_weight(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &SceneNode)> {
        self.graph.node_indices().map(|idx| (idx, &self.graph[idx]))
    }

    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .next()
    }

    /// Children in paint order (first is painted first).
    pub fn children(&self, idx: NodeIndex) -> &[NodeIndex] {
        self.graph
            .node_weight(idx)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// `true` if `ancestor` is a strict ancestor of `descendant`.
    pub fn is_ancestor_of(&self, ancestor: NodeIndex, descendant: NodeIndex) -> bool {
        let mut cur = self.parent(descendant);
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.parent(p);
        }
        false
    }

    /// Depth below the topmost ancestor (0 for parentless nodes).
    pub fn depth(&self, idx: NodeIndex) -> usize {
        let mut depth = 0;
        let mut cur = self.parent(idx);
        while let Some(p) = cur {
            depth += 1;
            cur = self.parent(p);
        }
        depth
    }

    /// Visible itself and through every ancestor.
    pub fn is_effectively_visible(&self, idx: NodeIndex) -> bool {
        let mut cur = Some(idx);
        while let Some(i) = cur {
            match self.graph.node_weight(i) {
                Some(node) if node.visible => cur = self.parent(i),
                _ => return false,
            }
        }
        true
    }

    /// Bumped on every change that affects what is drawn, except pure
    /// transform edits. Layer caches key off this.
    pub fn content_version(&self) -> u64 {
        self.content_version
    }

    // ─── Registration ────────────────────────────────────────────────

    /// Register `node` and attach it. The first node added becomes the
    /// root; later nodes attach under `parent` (default: the root).
    pub fn add_node(
        &mut self,
        node: SceneNode,
        parent: Option<NodeIndex>,
    ) -> Result<NodeIndex, SceneError> {
        let target = match (self.root, parent) {
            (None, _) => None,
            (Some(root), None) => Some(root),
            (Some(_), Some(p)) if self.contains(p) => Some(p),
            (Some(_), Some(p)) => return Err(SceneError::MissingNode(p)),
        };
        let idx = self.insert_detached(node)?;
        match target {
            None => {
                log::debug!("scene: {} becomes root", self.graph[idx].id);
                self.root = Some(idx);
            }
            Some(parent) => {
                self.add_child(parent, idx);
            }
        }
        Ok(idx)
    }

    /// Make a parentless node the root. The previous root, if any, stays
    /// registered as an orphan.
    pub fn set_root(&mut self, idx: NodeIndex) -> bool {
        if !self.contains(idx) || self.parent(idx).is_some() {
            return false;
        }
        self.root = Some(idx);
        self.content_version += 1;
        true
    }

    /// Register `node` without attaching it anywhere. It stays an orphan
    /// (reachable only by id) until passed to [`Scene::add_child`].
    pub fn insert_detached(&mut self, mut node: SceneNode) -> Result<NodeIndex, SceneError> {
        if self.id_index.contains_key(&node.id) {
            return Err(SceneError::DuplicateId(node.id));
        }
        node.children.clear();
        node.transform_dirty = true;
        node.bounds_dirty = true;
        node.parent_generation = 0;
        let id = node.id;
        let idx = self.graph.add_node(node);
        self.id_index.insert(id, idx);
        self.top_pending.insert(idx);
        self.dirty_nodes.insert(idx);
        self.content_version += 1;
        self.emit(SceneEvent::NodeAdded(idx));
        Ok(idx)
    }

    /// Unregister `idx`. Its children are *not* removed: they stay
    /// registered as parentless orphans until removed themselves. Use
    /// [`Scene::remove_subtree`] to drop a whole branch.
    pub fn remove_node(&mut self, idx: NodeIndex) -> Option<SceneNode> {
        if !self.contains(idx) {
            return None;
        }
        self.detach(idx);
        let node = self.graph.remove_node(idx)?;
        if self.id_index.get(&node.id) == Some(&idx) {
            self.id_index.remove(&node.id);
        }
        if self.root == Some(idx) {
            self.root = None;
        }
        for &child in &node.children {
            if let Some(c) = self.graph.node_weight_mut(child) {
                c.transform_dirty = true;
                c.bounds_dirty = true;
                self.top_pending.insert(child);
            }
        }
        self.index.remove(idx);
        self.index_pending.remove(&idx);
        self.top_pending.remove(&idx);
        self.layout_pending.remove(&idx);
        self.dirty_nodes.remove(&idx);
        let was_selected = self.selection.contains(&idx);
        self.selection.retain(|&s| s != idx);
        self.content_version += 1;
        log::debug!("scene: removed {} ({} orphaned children)", node.id, node.children.len());
        self.emit(SceneEvent::NodeRemoved { index: idx, id: node.id });
        if was_selected {
            self.emit(SceneEvent::SelectionChanged);
        }
        Some(node)
    }

    /// Remove `idx` and every descendant, returning them in pre-order.
    pub fn remove_subtree(&mut self, idx: NodeIndex) -> Vec<SceneNode> {
        let order = self.subtree(idx);
        order
            .into_iter()
            .filter_map(|i| self.remove_node(i))
            .collect()
    }

    /// Destroy a node and its subtree. Disposing a node that is already
    /// gone is a no-op.
    pub fn dispose_node(&mut self, idx: NodeIndex) {
        if self.contains(idx) {
            let removed = self.remove_subtree(idx);
            log::trace!("scene: disposed {} nodes", removed.len());
        }
    }

    /// `idx` and its descendants in pre-order.
    pub fn subtree(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        if !self.contains(idx) {
            return out;
        }
        let mut stack = vec![idx];
        while let Some(i) = stack.pop() {
            out.push(i);
            stack.extend(self.children(i).iter().rev().copied());
        }
        out
    }

    // ─── Hierarchy ───────────────────────────────────────────────────

    /// Append `child` to `parent`, detaching it from any previous parent.
    /// Returns `false` for self-parenting, cycles, the root, or unknown nodes.
    pub fn add_child(&mut self, parent: NodeIndex, child: NodeIndex) -> bool {
        let at = self.children(parent).len();
        self.insert_child(parent, child, at)
    }

    /// Like [`Scene::add_child`] but inserts at `position` (clamped).
    pub fn insert_child(&mut self, parent: NodeIndex, child: NodeIndex, position: usize) -> bool {
        if parent == child || !self.contains(parent) || !self.contains(child) {
            return false;
        }
        if self.root == Some(child) {
            log::warn!("scene: refusing to attach the root under {parent:?}");
            return false;
        }
        if self.is_ancestor_of(child, parent) {
            log::warn!(
                "scene: refusing cycle, {} is an ancestor of {}",
                self.graph[child].id,
                self.graph[parent].id
            );
            return false;
        }
        self.detach(child);

        let siblings = &mut self.graph[parent].children;
        let position = position.min(siblings.len());
        siblings.insert(position, child);
        self.graph.add_edge(parent, child, ());

        let node = &mut self.graph[child];
        node.transform_dirty = true;
        node.bounds_dirty = true;
        self.top_pending.remove(&child);
        self.mark_bounds_dirty_up(parent);
        self.queue_layout(parent);
        self.dirty_nodes.insert(child);
        self.content_version += 1;
        self.emit(SceneEvent::ChildAdded { parent, child });
        true
    }

    /// Detach `child` from `parent`. The child stays registered as an orphan.
    pub fn remove_child(&mut self, parent: NodeIndex, child: NodeIndex) -> bool {
        if self.parent(child) != Some(parent) {
            return false;
        }
        self.detach(child).is_some()
    }

    /// Unlink `child` from its parent, if any. Returns the old parent.
    fn detach(&mut self, child: NodeIndex) -> Option<NodeIndex> {
        let parent = self.parent(child)?;
        if let Some(edge) = self.graph.find_edge(parent, child) {
            self.graph.remove_edge(edge);
        }
        self.graph[parent].children.retain(|c| *c != child);
        if let Some(node) = self.graph.node_weight_mut(child) {
            node.transform_dirty = true;
            node.bounds_dirty = true;
            self.top_pending.insert(child);
        }
        self.mark_bounds_dirty_up(parent);
        self.queue_layout(parent);
        self.dirty_nodes.insert(parent);
        self.content_version += 1;
        self.emit(SceneEvent::ChildRemoved { parent, child });
        Some(parent)
    }

    /// Move `child` to `position` among its siblings. Returns `true` if the
    /// paint order changed.
    pub fn move_child(&mut self, child: NodeIndex, position: usize) -> bool {
        let Some(parent) = self.parent(child) else {
            return false;
        };
        let siblings = &mut self.graph[parent].children;
        let Some(from) = siblings.iter().position(|&s| s == child) else {
            return false;
        };
        let to = position.min(siblings.len() - 1);
        if from == to {
            return false;
        }
        let moved = siblings.remove(from);
        siblings.insert(to, moved);
        self.queue_layout(parent);
        self.dirty_nodes.insert(child);
        self.content_version += 1;
        self.emit(SceneEvent::PropertiesChanged(parent));
        true
    }

    fn sibling_position(&self, child: NodeIndex) -> Option<(usize, usize)> {
        let parent = self.parent(child)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&s| s == child)?;
        Some((pos, siblings.len()))
    }

    pub fn bring_forward(&mut self, child: NodeIndex) -> bool {
        match self.sibling_position(child) {
            Some((pos, _)) => self.move_child(child, pos + 1),
            None => false,
        }
    }

    pub fn send_backward(&mut self, child: NodeIndex) -> bool {
        match self.sibling_position(child) {
            Some((pos, _)) if pos > 0 => self.move_child(child, pos - 1),
            _ => false,
        }
    }

    pub fn bring_to_front(&mut self, child: NodeIndex) -> bool {
        match self.sibling_position(child) {
            Some((_, len)) => self.move_child(child, len - 1),
            None => false,
        }
    }

    pub fn send_to_back(&mut self, child: NodeIndex) -> bool {
        self.move_child(child, 0)
    }

    // ─── Mutation ────────────────────────────────────────────────────

    pub fn set_transform(&mut self, idx: NodeIndex, transform: Transform) -> bool {
        self.edit_transform(idx, |t| *t = transform)
    }

    /// Translate in parent space.
    pub fn translate_node(&mut self, idx: NodeIndex, dx: f64, dy: f64) -> bool {
        self.edit_transform(idx, |t| {
            t.pre_multiply(&Transform::from_translation(dx, dy));
        })
    }

    pub fn edit_transform(&mut self, idx: NodeIndex, f: impl FnOnce(&mut Transform)) -> bool {
        let Some(node) = self.graph.node_weight_mut(idx) else {
            return false;
        };
        f(&mut node.transform);
        self.touch_transform(idx);
        true
    }

    /// Mutate node properties. Dirties bounds and re-indexes afterwards.
    pub fn edit(&mut self, idx: NodeIndex, f: impl FnOnce(&mut SceneNode)) -> bool {
        let Some(node) = self.graph.node_weight_mut(idx) else {
            return false;
        };
        f(node);
        self.touch_properties(idx);
        true
    }

    pub fn set_kind(&mut self, idx: NodeIndex, kind: NodeKind) -> bool {
        self.edit(idx, |n| n.kind = kind)
    }

    pub fn set_visible(&mut self, idx: NodeIndex, visible: bool) -> bool {
        self.edit(idx, |n| n.visible = visible)
    }

    pub fn set_layer(&mut self, idx: NodeIndex, layer: LayerId) -> bool {
        self.edit(idx, |n| n.layer = layer)
    }

    pub fn set_z_index(&mut self, idx: NodeIndex, z_index: i32) -> bool {
        self.edit(idx, |n| n.z_index = z_index)
    }

    pub fn add_effect(&mut self, idx: NodeIndex, effect: Effect) -> bool {
        self.edit(idx, |n| n.effects.push(effect))
    }

    pub fn add_constraint(&mut self, idx: NodeIndex, constraint: Constraint) -> bool {
        self.edit(idx, |n| n.constraints.push(constraint))
    }

    pub fn set_layout(&mut self, idx: NodeIndex, layout: Option<AutoLayout>) -> bool {
        let changed = self.edit(idx, |n| n.layout = layout);
        if changed {
            self.queue_layout(idx);
        }
        changed
    }

    fn touch_transform(&mut self, idx: NodeIndex) {
        self.graph[idx].transform_dirty = true;
        self.mark_bounds_dirty_up(idx);
        self.dirty_nodes.insert(idx);
        self.emit(SceneEvent::TransformChanged(idx));
    }

    fn touch_properties(&mut self, idx: NodeIndex) {
        self.mark_bounds_dirty_up(idx);
        self.dirty_nodes.insert(idx);
        if let Some(parent) = self.parent(idx) {
            self.queue_layout(parent);
        }
        self.content_version += 1;
        self.emit(SceneEvent::PropertiesChanged(idx));
    }

    fn mark_bounds_dirty_up(&mut self, idx: NodeIndex) {
        let mut cur = idx;
        loop {
            self.graph[cur].bounds_dirty = true;
            match self.parent(cur) {
                Some(p) => cur = p,
                None => {
                    self.top_pending.insert(cur);
                    break;
                }
            }
        }
    }

    fn queue_layout(&mut self, idx: NodeIndex) {
        if self
            .graph
            .node_weight(idx)
            .is_some_and(|n| n.layout.is_some())
        {
            self.layout_pending.insert(idx);
        }
    }

    // ─── Cached geometry ─────────────────────────────────────────────

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Recompute `idx`'s world transform if its own transform changed or
    /// the parent's world moved on since the last composition.
    fn refresh_world(&mut self, idx: NodeIndex, parent: Option<&(Transform, u64)>) {
        let parent_gen = parent.map_or(0, |p| p.1);
        let Some(node) = self.graph.node_weight(idx) else {
            return;
        };
        if !node.transform_dirty && node.parent_generation == parent_gen {
            return;
        }
        let generation = self.next_generation();
        let node = &mut self.graph[idx];
        node.world = match parent {
            Some((world, _)) => world.then_local(&node.transform),
            None => node.transform.clone(),
        };
        node.parent_generation = parent_gen;
        node.world_generation = generation;
        node.transform_dirty = false;
        node.bounds_dirty = true;
        let children = node.children.clone();
        for child in children {
            self.graph[child].transform_dirty = true;
        }
    }

    /// Bring `idx`'s world transform up to date, walking the ancestor chain
    /// from the top so every composition uses a fresh parent.
    pub fn update_transform(&mut self, idx: NodeIndex) {
        if !self.contains(idx) {
            return;
        }
        let mut chain: SmallVec<[NodeIndex; 16]> = SmallVec::new();
        let mut cur = Some(idx);
        while let Some(i) = cur {
            chain.push(i);
            cur = self.parent(i);
        }
        let mut parent: Option<(Transform, u64)> = None;
        for &i in chain.iter().rev() {
            self.refresh_world(i, parent.as_ref());
            let node = &self.graph[i];
            parent = Some((node.world.clone(), node.world_generation));
        }
    }

    /// Bring `idx`'s world bounds (own geometry plus every descendant) up to date.
    pub fn update_bounds(&mut self, idx: NodeIndex) {
        self.update_transform(idx);
        self.refresh_bounds(idx);
    }

    /// Assumes `idx`'s world transform is fresh.
    fn refresh_bounds(&mut self, idx: NodeIndex) {
        let Some(node) = self.graph.node_weight(idx) else {
            return;
        };
        if !node.bounds_dirty {
            return;
        }
        let parent = (node.world.clone(), node.world_generation);
        let own = node.local_bounds().transform(&node.world);
        let children = node.children.clone();
        let mut total = own;
        for child in children {
            self.refresh_world(child, Some(&parent));
            self.refresh_bounds(child);
            total = total.union(&self.graph[child].world_bounds);
        }
        let node = &mut self.graph[idx];
        node.own_world_bounds = own;
        node.world_bounds = total;
        node.bounds_dirty = false;
        self.index_pending.insert(idx);
    }

    /// Fresh world transform of `idx`.
    pub fn world_transform(&mut self, idx: NodeIndex) -> Option<Transform> {
        self.update_transform(idx);
        self.graph.node_weight(idx).map(|n| n.world.clone())
    }

    /// Fresh subtree bounds of `idx` in world space.
    pub fn world_bounds(&mut self, idx: NodeIndex) -> Option<Aabb> {
        self.update_bounds(idx);
        self.graph.node_weight(idx).map(|n| n.world_bounds)
    }

    /// Refresh every dirty chain and sync the spatial index with it.
    pub fn refresh(&mut self) {
        let tops: Vec<NodeIndex> = self.top_pending.drain().collect();
        for top in tops {
            if self.contains(top) {
                self.update_bounds(top);
            }
        }
        for idx in std::mem::take(&mut self.index_pending) {
            match self.graph.node_weight(idx) {
                Some(node) if !node.world_bounds.is_void() => {
                    self.index.update(idx, node.world_bounds);
                }
                _ => {
                    self.index.remove(idx);
                }
            }
        }
    }

    pub fn index_stats(&self) -> QuadTreeStats {
        self.index.get_stats()
    }

    // ─── Queries ─────────────────────────────────────────────────────

    /// Nodes whose world bounds intersect `bounds` and pass `filter`,
    /// sorted by arena index.
    pub fn query_region(&mut self, bounds: &Aabb, filter: &QueryFilter) -> Vec<NodeIndex> {
        self.refresh();
        let mut hits: Vec<NodeIndex> = self
            .index
            .query_region(bounds)
            .into_iter()
            .filter(|&idx| self.graph.node_weight(idx).is_some_and(|n| filter.matches(n)))
            .collect();
        hits.sort();
        hits
    }

    /// Visible nodes whose own painted area contains `(x, y)`, topmost first.
    pub fn query_point(&mut self, x: f64, y: f64) -> Vec<NodeIndex> {
        self.refresh();
        let candidates = self.index.query_point(x, y);
        if candidates.is_empty() {
            return Vec::new();
        }
        let order: HashMap<NodeIndex, usize> = self
            .paint_order()
            .into_iter()
            .enumerate()
            .map(|(i, idx)| (idx, i))
            .collect();
        let mut hits: Vec<(usize, NodeIndex)> = candidates
            .into_iter()
            .filter(|idx| {
                self.graph[*idx].own_world_bounds.contains_point(x, y)
            })
            .filter_map(|idx| order.get(&idx).map(|&pos| (pos, idx)))
            .collect();
        hits.sort_by(|a, b| b.0.cmp(&a.0));
        hits.into_iter().map(|(_, idx)| idx).collect()
    }

    /// Pre-order walk from the root. `visit` receives each node and its depth.
    pub fn traverse(
        &self,
        options: TraverseOptions,
        mut visit: impl FnMut(NodeIndex, &SceneNode, usize),
    ) {
        let Some(root) = self.root else {
            return;
        };
        let mut stack = vec![(root, 0_usize)];
        while let Some((idx, depth)) = stack.pop() {
            let node = &self.graph[idx];
            visit(idx, node, depth);
            if options.max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            for &child in node.children.iter().rev() {
                if options.visible_only && !self.graph[child].visible {
                    continue;
                }
                stack.push((child, depth + 1));
            }
        }
    }

    /// Visible nodes reachable from the root, in paint order.
    pub fn paint_order(&self) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        self.traverse(
            TraverseOptions {
                visible_only: true,
                max_depth: None,
            },
            |idx, node, _| {
                if node.visible {
                    out.push(idx);
                }
            },
        );
        out
    }

    /// Additive render-cost estimate over every registered node.
    pub fn get_complexity_score(&self) -> f64 {
        self.graph
            .node_indices()
            .map(|idx| self.graph[idx].complexity())
            .sum()
    }

    // ─── Dirty tracking ──────────────────────────────────────────────

    /// Mark every node intersecting `bounds` for redraw.
    pub fn mark_dirty(&mut self, bounds: &Aabb) {
        self.refresh();
        let hits = self.index.query_region(bounds);
        self.dirty_nodes.extend(hits);
    }

    pub fn mark_node_dirty(&mut self, idx: NodeIndex) {
        if self.contains(idx) {
            self.dirty_nodes.insert(idx);
        }
    }

    pub fn has_dirty_nodes(&self) -> bool {
        !self.dirty_nodes.is_empty()
    }

    /// Take the set of nodes changed since the last call.
    pub fn get_dirty_nodes(&mut self) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self.dirty_nodes.drain().collect();
        out.sort();
        out
    }

    // ─── Selection ───────────────────────────────────────────────────

    pub fn selected(&self) -> &[NodeIndex] {
        &self.selection
    }

    pub fn is_selected(&self, idx: NodeIndex) -> bool {
        self.selection.contains(&idx)
    }

    pub fn select(&mut self, idx: NodeIndex) -> bool {
        if !self.contains(idx) || self.selection.contains(&idx) {
            return false;
        }
        self.selection.push(idx);
        self.emit(SceneEvent::SelectionChanged);
        true
    }

    pub fn deselect(&mut self, idx: NodeIndex) -> bool {
        let before = self.selection.len();
        self.selection.retain(|&s| s != idx);
        let changed = self.selection.len() != before;
        if changed {
            self.emit(SceneEvent::SelectionChanged);
        }
        changed
    }

    pub fn clear_selection(&mut self) {
        if !self.selection.is_empty() {
            self.selection.clear();
            self.emit(SceneEvent::SelectionChanged);
        }
    }

    /// Replace the selection. Unknown and duplicate indices are dropped.
    pub fn set_selection(&mut self, nodes: impl IntoIterator<Item = NodeIndex>) {
        let mut next = Vec::new();
        for idx in nodes {
            if self.contains(idx) && !next.contains(&idx) {
                next.push(idx);
            }
        }
        if next != self.selection {
            self.selection = next;
            self.emit(SceneEvent::SelectionChanged);
        }
    }

    // ─── Listeners ───────────────────────────────────────────────────

    pub fn subscribe(&mut self, listener: impl FnMut(&SceneEvent) + 'static) -> ListenerId {
        let id = self.next_listener;
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    fn emit(&mut self, event: SceneEvent) {
        log::trace!("scene event {event:?}");
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
    }

    // ─── Cloning ─────────────────────────────────────────────────────

    /// Copy `idx` (and its subtree when `deep`) as a new detached node.
    /// Copies always get fresh ids and keep the source's `logical_id`.
    pub fn clone_node(&mut self, idx: NodeIndex, deep: bool) -> Option<NodeIndex> {
        let source = self.graph.node_weight(idx)?;
        let mut copy = source.clone();
        copy.id = NodeId::with_prefix(copy.kind.tag().as_str());
        let children = source.children.clone();
        let copy_idx = self.insert_detached(copy).ok()?;
        if deep {
            for child in children {
                if let Some(child_copy) = self.clone_node(child, true) {
                    self.add_child(copy_idx, child_copy);
                }
            }
        }
        Some(copy_idx)
    }

    // ─── Layout & constraints ────────────────────────────────────────

    /// Layout box of `idx` in its parent's space, ignoring its translation.
    fn layout_extent(&self, idx: NodeIndex) -> Aabb {
        let node = &self.graph[idx];
        let mut local = node.layout_bounds();
        if local.is_empty() {
            for &child in &node.children {
                let (tx, ty) = self.graph[child].transform.translation();
                local = local.union(&self.layout_extent(child).translate(tx, ty));
            }
        }
        let (tx, ty) = node.transform.translation();
        local.transform(&node.transform).translate(-tx, -ty)
    }

    /// Position `idx`'s children with its auto layout. Invisible children
    /// keep their place. Returns `false` without a layout.
    pub fn apply_auto_layout(&mut self, idx: NodeIndex) -> bool {
        let Some(node) = self.graph.node_weight(idx) else {
            return false;
        };
        let Some(layout) = node.layout else {
            return false;
        };
        let own = node.layout_bounds();
        let container = (!own.is_empty()).then_some((own.width, own.height));
        let children: Vec<NodeIndex> = node
            .children
            .iter()
            .copied()
            .filter(|&c| self.graph[c].visible)
            .collect();
        let extents: Vec<Aabb> = children.iter().map(|&c| self.layout_extent(c)).collect();
        let sizes: Vec<(f64, f64)> = extents
            .iter()
            .map(|e| (e.width.max(0.0), e.height.max(0.0)))
            .collect();
        let arrangement = layout.arrange(&sizes, container);

        for ((child, extent), (x, y)) in children.iter().zip(&extents).zip(arrangement.positions) {
            let target = (x - extent.x, y - extent.y);
            let [a, b, c, d, e, f] = self.graph[*child].transform.components();
            if (e - target.0).abs() > 1e-9 || (f - target.1).abs() > 1e-9 {
                self.edit_transform(*child, |t| {
                    t.set(a, b, c, d, target.0, target.1);
                });
            }
        }
        if layout.hug_contents {
            let (w, h) = arrangement.content_size;
            if (own.width - w).abs() > 1e-9 || (own.height - h).abs() > 1e-9 {
                self.edit(idx, |n| n.kind.resize(w, h));
            }
        }
        self.layout_pending.remove(&idx);
        log::trace!("scene: auto layout on {:?} placed {} children", idx, children.len());
        true
    }

    /// Apply every queued auto layout, deepest containers first so hugging
    /// containers settle before their parents measure them.
    pub fn run_pending_layouts(&mut self) -> usize {
        let mut applied = 0;
        // Hugging containers re-queue their parents; bound the cascade.
        for _ in 0..64 {
            if self.layout_pending.is_empty() {
                break;
            }
            let mut batch: Vec<NodeIndex> = self.layout_pending.drain().collect();
            batch.sort_by_key(|&idx| std::cmp::Reverse(self.depth(idx)));
            for idx in batch {
                if self.apply_auto_layout(idx) {
                    applied += 1;
                }
            }
        }
        applied
    }

    /// Resize `idx`'s intrinsic box and let its children respond: auto
    /// layout re-flows them, otherwise each child's constraints apply.
    pub fn resize_node(&mut self, idx: NodeIndex, width: f64, height: f64) -> bool {
        let Some(node) = self.graph.node_weight(idx) else {
            return false;
        };
        let old = node.layout_bounds();
        let old_size = (old.width.max(0.0), old.height.max(0.0));
        self.edit(idx, |n| n.kind.resize(width, height));
        let new = self.graph[idx].layout_bounds();
        let new_size = (new.width.max(0.0), new.height.max(0.0));

        if self.graph[idx].layout.is_some() {
            self.apply_auto_layout(idx);
            return true;
        }
        let children = self.graph[idx].children.clone();
        for child in children {
            let node = &self.graph[child];
            if node.constraints.is_empty() {
                continue;
            }
            let current = node.layout_bounds().transform(&node.transform);
            let target = node
                .constraints
                .iter()
                .fold(current, |b, c| c.resolve(&b, old_size, new_size));
            let local = node.layout_bounds();
            let (dx, dy) = (target.x - current.x, target.y - current.y);
            if dx != 0.0 || dy != 0.0 {
                self.translate_node(child, dx, dy);
            }
            let resized = (target.width - current.width).abs() > 1e-9
                || (target.height - current.height).abs() > 1e-9;
            if resized && current.width > 0.0 && current.height > 0.0 {
                let w = local.width * target.width / current.width;
                let h = local.height * target.height / current.height;
                self.resize_node(child, w, h);
            }
        }
        true
    }

    // ─── Integrity ───────────────────────────────────────────────────

    /// Walk the arena and report every map↔tree divergence.
    pub fn verify_integrity(&self) -> Vec<IntegrityIssue> {
        let mut issues = Vec::new();

        for (&id, &idx) in &self.id_index {
            if self.graph.node_weight(idx).is_none_or(|n| n.id != id) {
                issues.push(IntegrityIssue::DanglingId(id));
            }
        }

        let mut reachable = HashSet::new();
        if let Some(root) = self.root {
            reachable.extend(self.subtree(root));
        }

        let mut indices: Vec<NodeIndex> = self.graph.node_indices().collect();
        indices.sort();
        for idx in indices {
            let node = &self.graph[idx];
            if self.id_index.get(&node.id) != Some(&idx) {
                issues.push(IntegrityIssue::Unregistered(idx));
            }
            if self.graph.neighbors_directed(idx, Direction::Incoming).count() > 1 {
                issues.push(IntegrityIssue::MultipleParents(idx));
            }
            let edges: HashSet<NodeIndex> = self
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .collect();
            let listed: HashSet<NodeIndex> = node.children.iter().copied().collect();
            if edges != listed || listed.len() != node.children.len() {
                issues.push(IntegrityIssue::ChildListMismatch(idx));
            }
            if !reachable.contains(&idx) {
                issues.push(IntegrityIssue::Orphan(idx));
            }
            let clean = !node.bounds_dirty
                && !node.transform_dirty
                && !self.index_pending.contains(&idx);
            if clean && !node.world_bounds.is_void() && self.index.get(idx) != Some(node.world_bounds) {
                issues.push(IntegrityIssue::StaleIndexEntry(idx));
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{HorizontalConstraint, VerticalConstraint};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn rect(w: f64, h: f64) -> SceneNode {
        SceneNode::fresh(NodeKind::rect(w, h))
    }

    fn group() -> SceneNode {
        SceneNode::fresh(NodeKind::group())
    }

    #[test]
    fn first_node_becomes_root() {
        let mut scene = Scene::new();
        let root = scene.add_node(group(), None).unwrap();
        let child = scene.add_node(rect(10.0, 10.0), None).unwrap();
        assert_eq!(scene.root(), Some(root));
        assert_eq!(scene.parent(child), Some(root));
        assert_eq!(scene.children(root), &[child]);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut scene = Scene::new();
        let node = rect(1.0, 1.0);
        let twin = SceneNode::new(node.id, NodeKind::group());
        scene.add_node(node, None).unwrap();
        assert!(matches!(scene.add_node(twin, None), Err(SceneError::DuplicateId(_))));
    }

    #[test]
    fn world_transform_composes_down_the_chain() {
        let mut scene = Scene::new();
        let root = scene.add_node(group().at(10.0, 0.0), None).unwrap();
        let child = scene.add_node(group().at(10.0, 0.0), Some(root)).unwrap();
        let grandchild = scene.add_node(rect(1.0, 1.0).at(10.0, 0.0), Some(child)).unwrap();

        scene.update_transform(grandchild);
        assert_eq!(scene.get(grandchild).unwrap().world_transform().translation(), (30.0, 0.0));
    }

    #[test]
    fn ancestor_mutation_is_seen_by_descendants() {
        let mut scene = Scene::new();
        let root = scene.add_node(group(), None).unwrap();
        let child = scene.add_node(group(), Some(root)).unwrap();
        let leaf = scene.add_node(rect(1.0, 1.0), Some(child)).unwrap();
        scene.update_transform(leaf);

        scene.translate_node(root, 5.0, 7.0);
        scene.update_transform(leaf);
        assert_eq!(scene.get(leaf).unwrap().world_transform().translation(), (5.0, 7.0));
    }

    #[test]
    fn update_bounds_reflects_child_mutation() {
        let mut scene = Scene::new();
        let root = scene.add_node(group(), None).unwrap();
        let a = scene.add_node(rect(10.0, 10.0), Some(root)).unwrap();
        let b = scene.add_node(rect(10.0, 10.0).at(20.0, 0.0), Some(root)).unwrap();
        assert_eq!(scene.world_bounds(root), Some(Aabb::new(0.0, 0.0, 30.0, 10.0)));

        scene.translate_node(b, 0.0, 40.0);
        assert_eq!(scene.world_bounds(root), Some(Aabb::new(0.0, 0.0, 30.0, 50.0)));
        assert_eq!(scene.get(a).unwrap().world_bounds(), Aabb::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn reparenting_detaches_first() {
        let mut scene = Scene::new();
        let root = scene.add_node(group(), None).unwrap();
        let g1 = scene.add_node(group().at(100.0, 0.0), Some(root)).unwrap();
        let g2 = scene.add_node(group(), Some(root)).unwrap();
        let leaf = scene.add_node(rect(5.0, 5.0), Some(g1)).unwrap();
        assert_eq!(scene.world_bounds(leaf), Some(Aabb::new(100.0, 0.0, 5.0, 5.0)));

        assert!(scene.add_child(g2, leaf));
        assert!(scene.children(g1).is_empty());
        assert_eq!(scene.parent(leaf), Some(g2));
        assert_eq!(scene.world_bounds(leaf), Some(Aabb::new(0.0, 0.0, 5.0, 5.0)));
        assert!(scene.verify_integrity().is_empty());
    }

    #[test]
    fn cycles_and_self_parenting_are_refused() {
        let mut scene = Scene::new();
        let root = scene.add_node(group(), None).unwrap();
        let a = scene.add_node(group(), Some(root)).unwrap();
        let b = scene.add_node(group(), Some(a)).unwrap();
        assert!(!scene.add_child(b, a));
        assert!(!scene.add_child(a, a));
        assert!(!scene.add_child(a, root));
        assert_eq!(scene.parent(a), Some(root));
    }

    #[test]
    fn remove_child_on_non_child_is_noop() {
        let mut scene = Scene::new();
        let root = scene.add_node(group(), None).unwrap();
        let a = scene.add_node(rect(1.0, 1.0), Some(root)).unwrap();
        let b = scene.add_node(rect(1.0, 1.0), Some(root)).unwrap();
        assert!(!scene.remove_child(a, b));
        assert!(scene.remove_child(root, b));
        assert_eq!(scene.parent(b), None);
        assert!(scene.contains(b));
        assert_eq!(scene.verify_integrity(), vec![IntegrityIssue::Orphan(b)]);
    }

    #[test]
    fn remove_node_orphans_children() {
        let mut scene = Scene::new();
        let root = scene.add_node(group(), None).unwrap();
        let g = scene.add_node(group(), Some(root)).unwrap();
        let leaf = scene.add_node(rect(1.0, 1.0), Some(g)).unwrap();
        let leaf_id = scene.get(leaf).unwrap().id;

        scene.remove_node(g);
        assert_eq!(scene.index_of(leaf_id), Some(leaf));
        assert_eq!(scene.verify_integrity(), vec![IntegrityIssue::Orphan(leaf)]);

        scene.remove_node(root);
        assert_eq!(scene.root(), None);
    }

    #[test]
    fn remove_subtree_cascades() {
        let mut scene = Scene::new();
        let root = scene.add_node(group(), None).unwrap();
        let g = scene.add_node(group(), Some(root)).unwrap();
        scene.add_node(rect(1.0, 1.0), Some(g)).unwrap();
        scene.add_node(rect(1.0, 1.0), Some(g)).unwrap();

        assert_eq!(scene.remove_subtree(g).len(), 3);
        assert_eq!(scene.len(), 1);
        assert!(scene.verify_integrity().is_empty());

        scene.dispose_node(g);
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn traverse_honours_visibility_and_depth() {
        let mut scene = Scene::new();
        let mut hidden_root = group();
        hidden_root.visible = false;
        let root = scene.add_node(hidden_root, None).unwrap();
        let a = scene.add_node(group(), Some(root)).unwrap();
        let mut hidden = group();
        hidden.visible = false;
        let h = scene.add_node(hidden, Some(root)).unwrap();
        let deep = scene.add_node(rect(1.0, 1.0), Some(a)).unwrap();
        scene.add_node(rect(1.0, 1.0), Some(h)).unwrap();

        let mut seen = Vec::new();
        scene.traverse(
            TraverseOptions {
                visible_only: true,
                max_depth: None,
            },
            |idx, _, depth| seen.push((idx, depth)),
        );
        assert_eq!(seen, vec![(root, 0), (a, 1), (deep, 2)]);

        let mut shallow = Vec::new();
        scene.traverse(
            TraverseOptions {
                visible_only: false,
                max_depth: Some(1),
            },
            |idx, _, _| shallow.push(idx),
        );
        assert_eq!(shallow, vec![root, a, h]);
    }

    #[test]
    fn query_region_filters() {
        let mut scene = Scene::new();
        let root = scene.add_node(group(), None).unwrap();
        let r = scene.add_node(rect(10.0, 10.0).with_tag("hero"), Some(root)).unwrap();
        let t = scene
            .add_node(SceneNode::fresh(NodeKind::text("hi")).at(100.0, 100.0), Some(root))
            .unwrap();

        let everything = Aabb::new(-10.0, -10.0, 500.0, 500.0);
        let shapes = scene.query_region(
            &everything,
            &QueryFilter {
                kind: Some(KindTag::Shape),
                ..Default::default()
            },
        );
        assert_eq!(shapes, vec![r]);

        let tagged = scene.query_region(
            &everything,
            &QueryFilter {
                tag: Some("hero".into()),
                ..Default::default()
            },
        );
        assert_eq!(tagged, vec![r]);

        let near_text = scene.query_region(&Aabb::new(95.0, 95.0, 10.0, 10.0), &QueryFilter::default());
        assert!(near_text.contains(&t));
        assert!(!near_text.contains(&r));
    }

    #[test]
    fn query_point_is_topmost_first() {
        let mut scene = Scene::new();
        let root = scene.add_node(group(), None).unwrap();
        let below = scene.add_node(rect(50.0, 50.0), Some(root)).unwrap();
        let above = scene.add_node(rect(50.0, 50.0).at(25.0, 25.0), Some(root)).unwrap();

        assert_eq!(scene.query_point(30.0, 30.0), vec![above, below]);
        assert_eq!(scene.query_point(5.0, 5.0), vec![below]);
        scene.bring_to_front(below);
        assert_eq!(scene.query_point(30.0, 30.0), vec![below, above]);
    }

    #[test]
    fn index_follows_moves() {
        let mut scene = Scene::new();
        let root = scene.add_node(group(), None).unwrap();
        let r = scene.add_node(rect(10.0, 10.0), Some(root)).unwrap();
        assert_eq!(scene.query_point(5.0, 5.0), vec![r]);

        scene.translate_node(r, 200.0, 0.0);
        assert!(scene.query_point(5.0, 5.0).is_empty());
        assert_eq!(scene.query_point(205.0, 5.0), vec![r]);
        assert!(scene.verify_integrity().is_empty());
    }

    #[test]
    fn dirty_nodes_drain() {
        let mut scene = Scene::new();
        let root = scene.add_node(group(), None).unwrap();
        let r = scene.add_node(rect(10.0, 10.0), Some(root)).unwrap();
        scene.get_dirty_nodes();
        assert!(!scene.has_dirty_nodes());

        scene.mark_dirty(&Aabb::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(scene.get_dirty_nodes(), vec![root, r]);
        assert!(scene.get_dirty_nodes().is_empty());
    }

    #[test]
    fn complexity_score_is_additive() {
        let mut scene = Scene::new();
        let root = scene.add_node(group(), None).unwrap();
        scene.add_node(rect(1.0, 1.0), Some(root)).unwrap();
        scene
            .add_node(rect(1.0, 1.0).with_effect(Effect::layer_blur(1.0)), Some(root))
            .unwrap();
        // group: 1 + 2 × 0.3, rects: 1.4 each, effect: 2
        assert!((scene.get_complexity_score() - (1.6 + 1.4 + 3.4)).abs() < 1e-9);
    }

    #[test]
    fn selection_is_a_set() {
        let mut scene = Scene::new();
        let root = scene.add_node(group(), None).unwrap();
        let r = scene.add_node(rect(1.0, 1.0), Some(root)).unwrap();
        assert!(scene.select(r));
        assert!(!scene.select(r));
        assert!(!scene.deselect(root));
        scene.remove_node(r);
        assert!(scene.selected().is_empty());
    }

    #[test]
    fn listeners_see_structural_events() {
        let mut scene = Scene::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let id = scene.subscribe(move |e| sink.borrow_mut().push(e.clone()));

        let root = scene.add_node(group(), None).unwrap();
        let child = scene.add_node(rect(1.0, 1.0), Some(root)).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![
                SceneEvent::NodeAdded(root),
                SceneEvent::NodeAdded(child),
                SceneEvent::ChildAdded { parent: root, child },
            ]
        );

        assert!(scene.unsubscribe(id));
        scene.translate_node(child, 1.0, 1.0);
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn clone_gets_fresh_ids_and_keeps_logical_id() {
        let mut scene = Scene::new();
        let root = scene.add_node(group(), None).unwrap();
        let g = scene.add_node(group().with_name("card"), Some(root)).unwrap();
        scene.add_node(rect(4.0, 4.0), Some(g)).unwrap();

        let copy = scene.clone_node(g, true).unwrap();
        let (orig, dup) = (scene.get(g).unwrap(), scene.get(copy).unwrap());
        assert_ne!(orig.id, dup.id);
        assert_eq!(orig.logical_id, dup.logical_id);
        assert_eq!(dup.name, "card");
        assert_eq!(scene.children(copy).len(), 1);
        assert_ne!(scene.children(copy)[0], scene.children(g)[0]);
        assert_eq!(scene.parent(copy), None);

        let shallow = scene.clone_node(g, false).unwrap();
        assert!(scene.children(shallow).is_empty());
    }

    #[test]
    fn auto_layout_stacks_children() {
        let mut scene = Scene::new();
        let root = scene.add_node(group(), None).unwrap();
        let frame = scene
            .add_node(
                SceneNode::fresh(NodeKind::artboard(200.0, 200.0)).with_layout(AutoLayout::column(10.0, 5.0)),
                Some(root),
            )
            .unwrap();
        let a = scene.add_node(rect(50.0, 20.0).at(80.0, 80.0), Some(frame)).unwrap();
        let b = scene.add_node(rect(30.0, 40.0), Some(frame)).unwrap();

        assert_eq!(scene.run_pending_layouts(), 1);
        assert_eq!(scene.get(a).unwrap().transform().translation(), (5.0, 5.0));
        assert_eq!(scene.get(b).unwrap().transform().translation(), (5.0, 35.0));
        assert_eq!(scene.run_pending_layouts(), 0);
    }

    #[test]
    fn hugging_layout_resizes_container() {
        let mut scene = Scene::new();
        let root = scene.add_node(group(), None).unwrap();
        let frame = scene
            .add_node(
                SceneNode::fresh(NodeKind::artboard(500.0, 500.0)).with_layout(AutoLayout {
                    hug_contents: true,
                    ..AutoLayout::row(4.0, 2.0)
                }),
                Some(root),
            )
            .unwrap();
        scene.add_node(rect(10.0, 10.0), Some(frame)).unwrap();
        scene.add_node(rect(10.0, 20.0), Some(frame)).unwrap();
        scene.run_pending_layouts();
        assert_eq!(
            scene.get(frame).unwrap().layout_bounds(),
            Aabb::new(0.0, 0.0, 28.0, 24.0)
        );
    }

    #[test]
    fn resize_applies_child_constraints() {
        let mut scene = Scene::new();
        let board = scene.add_node(SceneNode::fresh(NodeKind::artboard(100.0, 100.0)), None).unwrap();
        let pinned = scene
            .add_node(
                rect(10.0, 10.0).at(80.0, 80.0).with_constraint(Constraint::new(
                    HorizontalConstraint::Right,
                    VerticalConstraint::Bottom,
                )),
                Some(board),
            )
            .unwrap();
        let stretched = scene
            .add_node(
                rect(80.0, 10.0).at(10.0, 0.0).with_constraint(Constraint::new(
                    HorizontalConstraint::LeftRight,
                    VerticalConstraint::Top,
                )),
                Some(board),
            )
            .unwrap();
        let free = scene.add_node(rect(5.0, 5.0).at(1.0, 1.0), Some(board)).unwrap();

        assert!(scene.resize_node(board, 200.0, 150.0));
        assert_eq!(scene.get(pinned).unwrap().transform().translation(), (180.0, 130.0));
        assert_eq!(
            scene.get(stretched).unwrap().layout_bounds(),
            Aabb::new(0.0, 0.0, 180.0, 10.0)
        );
        assert_eq!(scene.get(free).unwrap().transform().translation(), (1.0, 1.0));
    }

    #[test]
    fn reorder_changes_paint_order() {
        let mut scene = Scene::new();
        let root = scene.add_node(group(), None).unwrap();
        let a = scene.add_node(rect(1.0, 1.0), Some(root)).unwrap();
        let b = scene.add_node(rect(1.0, 1.0), Some(root)).unwrap();
        let c = scene.add_node(rect(1.0, 1.0), Some(root)).unwrap();
        assert!(scene.bring_forward(a));
        assert_eq!(scene.children(root), &[b, a, c]);
        assert!(scene.send_to_back(c));
        assert_eq!(scene.children(root), &[c, b, a]);
        assert!(!scene.send_backward(c));
        assert_eq!(scene.paint_order(), vec![root, c, b, a]);
    }
}

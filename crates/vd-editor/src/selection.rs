//! Selection state and the select tool's interaction state machine.
//!
//! ```text
//!        ┌── handle hit ──▶ Resizing(handle) | Rotating ──┐
//! Idle ──┼── node hit ────▶ Dragging ─────────────────────┼──▶ Idle
//!        └── empty space ─▶ Marquee ──────────────────────┘
//! ```
//!
//! The set of selected nodes lives in the `Scene`; this manager owns the
//! derived geometry (bounds, handles) and the gesture in progress. Every
//! gesture snapshots the local transforms it touches so a cancel can put
//! them back exactly. Moves, resizes and rotations are world-space
//! mappings pushed down into each node's local transform, so nodes under
//! scaled or rotated parents follow the pointer.

use crate::input::Modifiers;
use kurbo::Affine;
use serde::{Deserialize, Serialize};
use vd_core::{Aabb, Color, LayerManager, NodeIndex, Scene, Transform};
use vd_render::{Quad, hit_test, hit_test_rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
    Rotate,
}

impl HandleKind {
    pub const RESIZE: [HandleKind; 8] = [
        Self::TopLeft,
        Self::Top,
        Self::TopRight,
        Self::Right,
        Self::BottomRight,
        Self::Bottom,
        Self::BottomLeft,
        Self::Left,
    ];

    /// Position on the selection box, `(0, 0)` top-left to `(1, 1)` bottom-right.
    fn anchor(self) -> (f64, f64) {
        match self {
            Self::TopLeft => (0.0, 0.0),
            Self::Top | Self::Rotate => (0.5, 0.0),
            Self::TopRight => (1.0, 0.0),
            Self::Right => (1.0, 0.5),
            Self::BottomRight => (1.0, 1.0),
            Self::Bottom => (0.5, 1.0),
            Self::BottomLeft => (0.0, 1.0),
            Self::Left => (0.0, 0.5),
        }
    }

    /// Edges the handle drags: -1 the left/top edge, 1 the right/bottom edge.
    fn axes(self) -> (i8, i8) {
        match self {
            Self::TopLeft => (-1, -1),
            Self::Top => (0, -1),
            Self::TopRight => (1, -1),
            Self::Right => (1, 0),
            Self::BottomRight => (1, 1),
            Self::Bottom => (0, 1),
            Self::BottomLeft => (-1, 1),
            Self::Left => (-1, 0),
            Self::Rotate => (0, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handle {
    pub kind: HandleKind,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Side of a handle's square hit area, in document units.
    pub handle_size: f64,
    /// Distance of the rotate handle above the top edge.
    pub rotate_offset: f64,
    /// Shift-rotate step, in degrees.
    pub rotation_snap_degrees: f64,
    /// Smallest width or height a resize can produce.
    pub min_size: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            handle_size: 8.0,
            rotate_offset: 24.0,
            rotation_snap_degrees: 15.0,
            min_size: 1.0,
        }
    }
}

impl SelectionConfig {
    /// Parse a (possibly partial) JSON override.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    Dragging,
    Resizing(HandleKind),
    Rotating,
    Marquee,
}

/// A node caught by the current gesture, as it was when the gesture began.
#[derive(Debug, Clone)]
struct Grab {
    idx: NodeIndex,
    local: Transform,
    parent_world: Transform,
}

#[derive(Debug, Default)]
pub struct SelectionManager {
    config: SelectionConfig,
    state: InteractionState,
    origin: (f64, f64),
    start_bounds: Aabb,
    grabs: Vec<Grab>,
    /// Selection before the gesture, restored on cancel.
    prior_selection: Vec<NodeIndex>,
    /// Selection a shift-marquee adds to.
    marquee_base: Vec<NodeIndex>,
    marquee: Option<Aabb>,
}

impl SelectionManager {
    pub fn new(config: SelectionConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn is_interacting(&self) -> bool {
        self.state != InteractionState::Idle
    }

    /// The rubber-band rectangle while a marquee is in progress.
    pub fn marquee(&self) -> Option<Aabb> {
        self.marquee
    }

    // ─── Derived geometry ────────────────────────────────────────────

    /// Union of every selected node's world bounds.
    pub fn bounds(&self, scene: &mut Scene) -> Option<Aabb> {
        let selected = scene.selected().to_vec();
        selected
            .into_iter()
            .filter_map(|idx| scene.world_bounds(idx))
            .filter(|b| !b.is_void())
            .reduce(|acc, b| acc.union(&b))
    }

    /// Translation to the selection's top-left corner.
    pub fn selection_transform(&self, scene: &mut Scene) -> Transform {
        self.bounds(scene)
            .map(|b| Transform::from_translation(b.x, b.y))
            .unwrap_or_default()
    }

    /// Eight resize handles followed by the rotate handle.
    pub fn handles(&self, scene: &mut Scene) -> Vec<Handle> {
        let Some(b) = self.bounds(scene) else {
            return Vec::new();
        };
        let mut handles: Vec<Handle> = HandleKind::RESIZE
            .iter()
            .map(|&kind| {
                let (ax, ay) = kind.anchor();
                Handle {
                    kind,
                    x: b.x + ax * b.width,
                    y: b.y + ay * b.height,
                }
            })
            .collect();
        handles.push(Handle {
            kind: HandleKind::Rotate,
            x: b.x + b.width / 2.0,
            y: b.y - self.config.rotate_offset,
        });
        handles
    }

    /// The handle under (`x`, `y`). The rotate handle wins, then corners
    /// before edges so tiny selections stay resizable diagonally.
    pub fn handle_at(&self, scene: &mut Scene, x: f64, y: f64) -> Option<HandleKind> {
        let half = self.config.handle_size / 2.0;
        let mut handles = self.handles(scene);
        handles.sort_by_key(|h| match h.kind {
            HandleKind::Rotate => 0,
            HandleKind::TopLeft | HandleKind::TopRight | HandleKind::BottomRight | HandleKind::BottomLeft => 1,
            _ => 2,
        });
        handles
            .into_iter()
            .find(|h| (x - h.x).abs() <= half && (y - h.y).abs() <= half)
            .map(|h| h.kind)
    }

    /// Selection outline, handles and marquee as overlay quads in
    /// document space.
    pub fn overlay(&self, scene: &mut Scene) -> Vec<Quad> {
        const ACCENT: Color = Color::rgba(0.05, 0.55, 1.0, 1.0);
        let mut quads = Vec::new();
        if let Some(m) = self.marquee {
            quads.push(Quad::new(
                Affine::translate((m.x, m.y)),
                m.width,
                m.height,
                ACCENT.with_alpha(0.15),
            ));
        }
        let Some(b) = self.bounds(scene) else {
            return quads;
        };
        let edges = [
            (b.x, b.y, b.width, 1.0),
            (b.x, b.max_y() - 1.0, b.width, 1.0),
            (b.x, b.y, 1.0, b.height),
            (b.max_x() - 1.0, b.y, 1.0, b.height),
        ];
        for (x, y, w, h) in edges {
            quads.push(Quad::new(Affine::translate((x, y)), w, h, ACCENT));
        }
        let size = self.config.handle_size;
        for handle in self.handles(scene) {
            quads.push(Quad::new(
                Affine::translate((handle.x - size / 2.0, handle.y - size / 2.0)),
                size,
                size,
                ACCENT,
            ));
        }
        quads
    }

    // ─── Interaction ─────────────────────────────────────────────────

    /// Pointer pressed at (`x`, `y`) in document space. Picks the gesture
    /// and updates the selection for clicks.
    pub fn begin_interaction(
        &mut self,
        scene: &mut Scene,
        layers: &mut LayerManager,
        x: f64,
        y: f64,
        modifiers: Modifiers,
    ) -> InteractionState {
        if self.is_interacting() {
            self.end_interaction();
        }
        self.origin = (x, y);
        self.prior_selection = scene.selected().to_vec();

        if let Some(handle) = self.handle_at(scene, x, y) {
            self.start_bounds = self.bounds(scene).unwrap_or(Aabb::EMPTY);
            self.capture(scene, layers);
            self.state = match handle {
                HandleKind::Rotate => InteractionState::Rotating,
                resize => InteractionState::Resizing(resize),
            };
            log::trace!("selection: {:?} from {:?}", self.state, self.start_bounds);
            return self.state;
        }

        match hit_test(scene, layers, x, y) {
            Some(hit) => {
                if modifiers.shift {
                    if scene.is_selected(hit) {
                        scene.deselect(hit);
                        return self.state;
                    }
                    scene.select(hit);
                } else if !scene.is_selected(hit) {
                    scene.set_selection([hit]);
                }
                self.start_bounds = self.bounds(scene).unwrap_or(Aabb::EMPTY);
                self.capture(scene, layers);
                self.state = InteractionState::Dragging;
            }
            None => {
                if !modifiers.shift {
                    scene.clear_selection();
                }
                self.marquee_base = scene.selected().to_vec();
                self.marquee = Some(Aabb::new(x, y, 0.0, 0.0));
                self.state = InteractionState::Marquee;
            }
        }
        self.state
    }

    /// Pointer moved to (`x`, `y`). Returns whether the scene or the
    /// selection changed.
    pub fn update_interaction(
        &mut self,
        scene: &mut Scene,
        layers: &mut LayerManager,
        x: f64,
        y: f64,
        modifiers: Modifiers,
    ) -> bool {
        let (ox, oy) = self.origin;
        match self.state {
            InteractionState::Idle => false,
            InteractionState::Dragging => {
                let mut mapping = Transform::from_translation(x - ox, y - oy);
                if modifiers.shift {
                    // Constrain to the dominant axis.
                    mapping = if (x - ox).abs() >= (y - oy).abs() {
                        Transform::from_translation(x - ox, 0.0)
                    } else {
                        Transform::from_translation(0.0, y - oy)
                    };
                }
                self.apply(scene, &mapping)
            }
            InteractionState::Resizing(handle) => {
                let target = resize_bounds(
                    &self.start_bounds,
                    handle,
                    x - ox,
                    y - oy,
                    modifiers.shift,
                    self.config.min_size,
                );
                let mapping = box_mapping(&self.start_bounds, &target);
                self.apply(scene, &mapping)
            }
            InteractionState::Rotating => {
                let (cx, cy) = self.start_bounds.center();
                let mut angle = (y - cy).atan2(x - cx) - (oy - cy).atan2(ox - cx);
                if modifiers.shift {
                    let step = self.config.rotation_snap_degrees.to_radians();
                    if step > 0.0 {
                        angle = (angle / step).round() * step;
                    }
                }
                let mut mapping = Transform::from_translation(cx, cy);
                mapping.rotate(angle).translate(-cx, -cy);
                self.apply(scene, &mapping)
            }
            InteractionState::Marquee => {
                let rect = Aabb::from_points(&[(ox, oy), (x, y)]);
                self.marquee = Some(rect);
                let hits = hit_test_rect(scene, layers, &rect);
                let mut selection = if modifiers.shift {
                    self.marquee_base.clone()
                } else {
                    Vec::new()
                };
                for idx in hits {
                    if !selection.contains(&idx) {
                        selection.push(idx);
                    }
                }
                if selection.as_slice() == scene.selected() {
                    return false;
                }
                scene.set_selection(selection);
                true
            }
        }
    }

    /// Pointer released: keep the result. Returns the gesture that ended.
    pub fn end_interaction(&mut self) -> InteractionState {
        let finished = std::mem::take(&mut self.state);
        self.grabs.clear();
        self.marquee = None;
        self.marquee_base.clear();
        finished
    }

    /// Abort the gesture, restoring transforms and selection as they were
    /// at `begin_interaction`. Returns `false` when idle.
    pub fn cancel_interaction(&mut self, scene: &mut Scene) -> bool {
        if !self.is_interacting() {
            return false;
        }
        for grab in std::mem::take(&mut self.grabs) {
            scene.set_transform(grab.idx, grab.local);
        }
        let prior: Vec<NodeIndex> = std::mem::take(&mut self.prior_selection)
            .into_iter()
            .filter(|&idx| scene.contains(idx))
            .collect();
        scene.set_selection(prior);
        log::debug!("selection: cancelled {:?}", self.state);
        self.end_interaction();
        true
    }

    /// Snapshot the transforms the gesture will drive. Selected nodes under
    /// another selected node ride along with it; locked nodes stay put.
    fn capture(&mut self, scene: &mut Scene, layers: &LayerManager) {
        let selected = scene.selected().to_vec();
        let movers: Vec<NodeIndex> = selected
            .iter()
            .copied()
            .filter(|&idx| {
                !selected
                    .iter()
                    .any(|&other| other != idx && scene.is_ancestor_of(other, idx))
                    && !layers.is_node_locked(scene, idx)
            })
            .collect();

        self.grabs.clear();
        for idx in movers {
            let Some(local) = scene.get(idx).map(|n| n.transform().clone()) else {
                continue;
            };
            let parent_world = match scene.parent(idx) {
                Some(parent) => scene.world_transform(parent).unwrap_or_default(),
                None => Transform::identity(),
            };
            self.grabs.push(Grab {
                idx,
                local,
                parent_world,
            });
        }
    }

    /// Push a world-space `mapping` into every grabbed node:
    /// `local' = parent⁻¹ · mapping · parent · local`.
    fn apply(&self, scene: &mut Scene, mapping: &Transform) -> bool {
        let mut changed = false;
        for grab in &self.grabs {
            let local = grab
                .parent_world
                .invert()
                .then_local(mapping)
                .then_local(&grab.parent_world)
                .then_local(&grab.local);
            changed |= scene.set_transform(grab.idx, local);
        }
        changed
    }
}

/// The box `start` becomes when `handle` is dragged by (`dx`, `dy`).
/// Edges never cross; the box keeps at least `min_size` per side.
fn resize_bounds(start: &Aabb, handle: HandleKind, dx: f64, dy: f64, keep_aspect: bool, min_size: f64) -> Aabb {
    let (ax, ay) = handle.axes();
    let (mut left, mut top) = (start.x, start.y);
    let (mut right, mut bottom) = (start.max_x(), start.max_y());
    match ax {
        -1 => left += dx,
        1 => right += dx,
        _ => {}
    }
    match ay {
        -1 => top += dy,
        1 => bottom += dy,
        _ => {}
    }
    if right - left < min_size {
        if ax == -1 {
            left = right - min_size;
        } else {
            right = left + min_size;
        }
    }
    if bottom - top < min_size {
        if ay == -1 {
            top = bottom - min_size;
        } else {
            bottom = top + min_size;
        }
    }

    if keep_aspect && start.width > 0.0 && start.height > 0.0 {
        let ratio = start.width / start.height;
        let (w, h) = (right - left, bottom - top);
        match (ax, ay) {
            (0, _) => {
                let w = h * ratio;
                let (cx, _) = start.center();
                left = cx - w / 2.0;
                right = cx + w / 2.0;
            }
            (_, 0) => {
                let h = w / ratio;
                let (_, cy) = start.center();
                top = cy - h / 2.0;
                bottom = cy + h / 2.0;
            }
            _ => {
                let scale = (w / start.width).max(h / start.height);
                let (w, h) = (start.width * scale, start.height * scale);
                if ax == -1 {
                    left = right - w;
                } else {
                    right = left + w;
                }
                if ay == -1 {
                    top = bottom - h;
                } else {
                    bottom = top + h;
                }
            }
        }
    }
    Aabb::from_min_max(left, top, right, bottom)
}

/// World mapping that carries box `from` onto box `to`.
fn box_mapping(from: &Aabb, to: &Aabb) -> Transform {
    let sx = if from.width > 0.0 { to.width / from.width } else { 1.0 };
    let sy = if from.height > 0.0 { to.height / from.height } else { 1.0 };
    Transform::from_components(sx, 0.0, 0.0, sy, to.x - from.x * sx, to.y - from.y * sy)
}

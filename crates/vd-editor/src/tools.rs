//! Tool system for canvas interactions.
//!
//! Each tool translates input events (already mapped into document
//! coordinates) into `SceneEdit`s that the app applies through the
//! command stack. The select tool drives the `SelectionManager`, which
//! moves nodes live during a gesture; the app brackets every pointer
//! gesture in one undo batch, so either way a gesture is one undo step.

use crate::edit::SceneEdit;
use crate::input::{InputEvent, Modifiers};
use crate::selection::SelectionManager;
use smallvec::{SmallVec, smallvec};
use vd_core::{Color, LayerManager, NodeId, NodeKind, Paint, Scene, SceneNode};

/// The active tool determines how input events are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Select,
    Rect,
    Ellipse,
    Text,
}

/// What a tool may read and drive while handling an event.
pub struct ToolContext<'a> {
    pub scene: &'a mut Scene,
    pub layers: &'a mut LayerManager,
    pub selection: &'a mut SelectionManager,
}

pub type Edits = SmallVec<[SceneEdit; 2]>;

/// Trait for tools that handle input and produce edits.
pub trait Tool {
    fn kind(&self) -> ToolKind;

    /// Handle an input event, returning zero or more edits.
    fn handle(&mut self, event: &InputEvent, cx: &mut ToolContext<'_>) -> Edits;

    /// Abandon whatever gesture is in flight (tool switch, focus loss).
    fn reset(&mut self, _cx: &mut ToolContext<'_>) {}
}

/// Create a boxed tool of `kind`.
pub fn make_tool(kind: ToolKind) -> Box<dyn Tool> {
    match kind {
        ToolKind::Select => Box::new(SelectTool::new()),
        ToolKind::Rect => Box::new(ShapeTool::rect()),
        ToolKind::Ellipse => Box::new(ShapeTool::ellipse()),
        ToolKind::Text => Box::new(TextTool::new()),
    }
}

fn selected_ids(scene: &Scene) -> Vec<NodeId> {
    scene
        .selected()
        .iter()
        .filter_map(|&idx| scene.get(idx).map(|n| n.id))
        .collect()
}

/// Select the node with `id` once its `AddNode` edit has landed.
fn select_created(scene: &mut Scene, id: NodeId) {
    if let Some(idx) = scene.index_of(id) {
        scene.set_selection([idx]);
    }
}

// ─── Select Tool ─────────────────────────────────────────────────────────

/// Keyboard nudge distance; shift multiplies it by ten.
const NUDGE: f64 = 1.0;
/// Offset of a Ctrl/Cmd+D duplicate from its original.
const DUPLICATE_OFFSET: f64 = 10.0;

#[derive(Debug, Default)]
pub struct SelectTool;

impl SelectTool {
    pub fn new() -> Self {
        Self
    }
}

impl Tool for SelectTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Select
    }

    fn handle(&mut self, event: &InputEvent, cx: &mut ToolContext<'_>) -> Edits {
        match event {
            InputEvent::PointerDown { x, y, modifiers, .. } => {
                cx.selection.begin_interaction(cx.scene, cx.layers, *x, *y, *modifiers);
                Edits::new()
            }
            InputEvent::PointerMove { x, y, modifiers, .. } => {
                cx.selection.update_interaction(cx.scene, cx.layers, *x, *y, *modifiers);
                Edits::new()
            }
            InputEvent::PointerUp { .. } => {
                cx.selection.end_interaction();
                Edits::new()
            }
            InputEvent::Key { key, modifiers } => handle_select_key(key, *modifiers, cx),
            InputEvent::Scroll { .. } => Edits::new(),
        }
    }

    fn reset(&mut self, cx: &mut ToolContext<'_>) {
        cx.selection.cancel_interaction(cx.scene);
    }
}

fn handle_select_key(key: &str, modifiers: Modifiers, cx: &mut ToolContext<'_>) -> Edits {
    let step = if modifiers.shift { NUDGE * 10.0 } else { NUDGE };
    let nudge = |dx: f64, dy: f64, scene: &Scene| -> Edits {
        selected_ids(scene)
            .into_iter()
            .map(|id| SceneEdit::MoveNode { id, dx, dy })
            .collect()
    };
    match key {
        "Escape" => {
            if !cx.selection.cancel_interaction(cx.scene) {
                cx.scene.clear_selection();
            }
            Edits::new()
        }
        "Delete" | "Backspace" => selected_ids(cx.scene)
            .into_iter()
            .map(|id| SceneEdit::RemoveNode { id })
            .collect(),
        "ArrowLeft" => nudge(-step, 0.0, cx.scene),
        "ArrowRight" => nudge(step, 0.0, cx.scene),
        "ArrowUp" => nudge(0.0, -step, cx.scene),
        "ArrowDown" => nudge(0.0, step, cx.scene),
        "d" | "D" if modifiers.command() => selected_ids(cx.scene)
            .into_iter()
            .map(|id| SceneEdit::DuplicateNode {
                id,
                dx: DUPLICATE_OFFSET,
                dy: DUPLICATE_OFFSET,
            })
            .collect(),
        _ => Edits::new(),
    }
}

// ─── Shape Tools ─────────────────────────────────────────────────────────

/// Size given to a shape created by a click without a drag.
const CLICK_SIZE: f64 = 100.0;

/// Draws rectangles or ellipses by dragging out their box.
/// Shift constrains to a square / circle.
#[derive(Debug)]
pub struct ShapeTool {
    kind: ToolKind,
    pub fill: Paint,
    /// Node being drawn and the drag origin.
    drawing: Option<(NodeId, f64, f64)>,
    moved: bool,
}

impl ShapeTool {
    pub fn rect() -> Self {
        Self::new(ToolKind::Rect)
    }

    pub fn ellipse() -> Self {
        Self::new(ToolKind::Ellipse)
    }

    fn new(kind: ToolKind) -> Self {
        Self {
            kind,
            fill: Paint::solid(Color::rgba(0.85, 0.85, 0.85, 1.0)),
            drawing: None,
            moved: false,
        }
    }

    fn geometry(&self, width: f64, height: f64) -> NodeKind {
        match self.kind {
            ToolKind::Ellipse => NodeKind::ellipse(width, height),
            _ => NodeKind::rect(width, height),
        }
    }
}

impl Tool for ShapeTool {
    fn kind(&self) -> ToolKind {
        self.kind
    }

    fn handle(&mut self, event: &InputEvent, cx: &mut ToolContext<'_>) -> Edits {
        match event {
            InputEvent::PointerDown { x, y, .. } => {
                let mut node = SceneNode::fresh(self.geometry(0.0, 0.0)).at(*x, *y);
                if let NodeKind::Shape(props) = &mut node.kind {
                    props.fill = Some(self.fill.clone());
                }
                self.drawing = Some((node.id, *x, *y));
                self.moved = false;
                smallvec![SceneEdit::AddNode {
                    parent: None,
                    node: Box::new(node),
                }]
            }
            InputEvent::PointerMove { x, y, modifiers, .. } => {
                let Some((id, sx, sy)) = self.drawing else {
                    return Edits::new();
                };
                self.moved = true;
                smallvec![drag_frame(id, sx, sy, *x, *y, modifiers.shift)]
            }
            InputEvent::PointerUp { .. } => {
                let Some((id, sx, sy)) = self.drawing.take() else {
                    return Edits::new();
                };
                select_created(cx.scene, id);
                if self.moved {
                    return Edits::new();
                }
                smallvec![SceneEdit::SetFrame {
                    id,
                    x: sx,
                    y: sy,
                    width: CLICK_SIZE,
                    height: CLICK_SIZE,
                }]
            }
            _ => Edits::new(),
        }
    }

    fn reset(&mut self, _cx: &mut ToolContext<'_>) {
        self.drawing = None;
    }
}

/// The frame spanned by a drag from (`sx`, `sy`) to (`x`, `y`).
fn drag_frame(id: NodeId, sx: f64, sy: f64, x: f64, y: f64, square: bool) -> SceneEdit {
    let (mut w, mut h) = ((x - sx).abs(), (y - sy).abs());
    if square {
        w = w.max(h);
        h = w;
    }
    SceneEdit::SetFrame {
        id,
        x: if x < sx { sx - w } else { sx },
        y: if y < sy { sy - h } else { sy },
        width: w,
        height: h,
    }
}

// ─── Text Tool ───────────────────────────────────────────────────────────

/// Places a text node at the click point.
#[derive(Debug)]
pub struct TextTool {
    pub placeholder: String,
    pending: Option<NodeId>,
}

impl Default for TextTool {
    fn default() -> Self {
        Self::new()
    }
}

impl TextTool {
    pub fn new() -> Self {
        Self {
            placeholder: "Text".into(),
            pending: None,
        }
    }
}

impl Tool for TextTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Text
    }

    fn handle(&mut self, event: &InputEvent, cx: &mut ToolContext<'_>) -> Edits {
        match event {
            InputEvent::PointerDown { x, y, .. } => {
                let mut node = SceneNode::fresh(NodeKind::text(self.placeholder.clone())).at(*x, *y);
                if let NodeKind::Text(text) = &mut node.kind {
                    text.fill = Some(Paint::solid(Color::BLACK));
                }
                self.pending = Some(node.id);
                smallvec![SceneEdit::AddNode {
                    parent: None,
                    node: Box::new(node),
                }]
            }
            InputEvent::PointerUp { .. } => {
                if let Some(id) = self.pending.take() {
                    select_created(cx.scene, id);
                }
                Edits::new()
            }
            _ => Edits::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::apply_edit;
    use pretty_assertions::assert_eq;
    use vd_core::{Aabb, NodeIndex};

    struct Fixture {
        scene: Scene,
        layers: LayerManager,
        selection: SelectionManager,
    }

    impl Fixture {
        fn new() -> Self {
            let mut scene = Scene::new();
            scene.add_node(SceneNode::fresh(NodeKind::group()), None).unwrap();
            Self {
                scene,
                layers: LayerManager::new(),
                selection: SelectionManager::default(),
            }
        }

        fn add_rect(&mut self, x: f64, y: f64) -> NodeIndex {
            let mut node = SceneNode::fresh(NodeKind::rect(10.0, 10.0)).at(x, y);
            if let NodeKind::Shape(props) = &mut node.kind {
                props.fill = Some(Paint::solid(Color::BLACK));
            }
            self.scene.add_node(node, None).unwrap()
        }

        /// Feed an event and apply the resulting edits, as the app does.
        fn feed(&mut self, tool: &mut dyn Tool, event: InputEvent) -> Edits {
            let mut cx = ToolContext {
                scene: &mut self.scene,
                layers: &mut self.layers,
                selection: &mut self.selection,
            };
            let edits = tool.handle(&event, &mut cx);
            for edit in &edits {
                apply_edit(&mut self.scene, edit);
            }
            edits
        }
    }

    #[test]
    fn select_tool_drag() {
        let mut fx = Fixture::new();
        let rect = fx.add_rect(0.0, 0.0);
        let mut tool = SelectTool::new();

        // Press alone doesn't produce edits
        assert!(fx.feed(&mut tool, InputEvent::pointer_down(5.0, 5.0)).is_empty());
        assert_eq!(fx.scene.selected(), &[rect]);

        fx.feed(&mut tool, InputEvent::pointer_move(15.0, 10.0));
        fx.feed(&mut tool, InputEvent::pointer_up(15.0, 10.0));
        assert_eq!(fx.scene.world_bounds(rect), Some(Aabb::new(10.0, 5.0, 10.0, 10.0)));
    }

    #[test]
    fn select_tool_keys() {
        let mut fx = Fixture::new();
        let rect = fx.add_rect(0.0, 0.0);
        fx.scene.select(rect);
        let mut tool = SelectTool::new();

        let edits = fx.feed(
            &mut tool,
            InputEvent::key("ArrowRight").with_modifiers(Modifiers::SHIFT),
        );
        assert_eq!(edits.len(), 1);
        assert_eq!(fx.scene.world_bounds(rect).unwrap().x, 10.0);

        fx.feed(&mut tool, InputEvent::key("Escape"));
        assert!(fx.scene.selected().is_empty());

        fx.scene.select(rect);
        let edits = fx.feed(&mut tool, InputEvent::key("Delete"));
        assert!(matches!(edits[0], SceneEdit::RemoveNode { .. }));
        assert!(!fx.scene.contains(rect));
    }

    #[test]
    fn escape_mid_drag_cancels() {
        let mut fx = Fixture::new();
        let rect = fx.add_rect(0.0, 0.0);
        let mut tool = SelectTool::new();

        fx.feed(&mut tool, InputEvent::pointer_down(5.0, 5.0));
        fx.feed(&mut tool, InputEvent::pointer_move(50.0, 5.0));
        fx.feed(&mut tool, InputEvent::key("Escape"));
        assert_eq!(fx.scene.world_bounds(rect).unwrap().x, 0.0);
        assert_eq!(fx.scene.selected(), &[] as &[NodeIndex]);
    }

    #[test]
    fn rect_tool_draws_up_and_left() {
        let mut fx = Fixture::new();
        let mut tool = ShapeTool::rect();

        let edits = fx.feed(&mut tool, InputEvent::pointer_down(110.0, 60.0));
        assert_eq!(edits.len(), 1);
        match &edits[0] {
            SceneEdit::AddNode { node, .. } => assert!(matches!(node.kind, NodeKind::Shape(_))),
            _ => panic!("expected AddNode"),
        }
        let id = edits[0].target();

        let edits = fx.feed(&mut tool, InputEvent::pointer_move(10.0, 10.0));
        match &edits[0] {
            SceneEdit::SetFrame {
                x,
                y,
                width,
                height,
                ..
            } => {
                assert_eq!((*x, *y, *width, *height), (10.0, 10.0, 100.0, 50.0));
            }
            _ => panic!("expected SetFrame"),
        }

        assert!(fx.feed(&mut tool, InputEvent::pointer_up(10.0, 10.0)).is_empty());
        let idx = fx.scene.index_of(id).unwrap();
        assert_eq!(fx.scene.selected(), &[idx]);
        assert_eq!(fx.scene.world_bounds(idx), Some(Aabb::new(10.0, 10.0, 100.0, 50.0)));
    }

    #[test]
    fn shift_draws_a_circle_and_click_gets_default_size() {
        let mut fx = Fixture::new();
        let mut tool = ShapeTool::ellipse();

        fx.feed(&mut tool, InputEvent::pointer_down(0.0, 0.0));
        let edits = fx.feed(
            &mut tool,
            InputEvent::pointer_move(30.0, 10.0).with_modifiers(Modifiers::SHIFT),
        );
        assert!(matches!(
            edits[0],
            SceneEdit::SetFrame {
                width: 30.0,
                height: 30.0,
                ..
            }
        ));
        fx.feed(&mut tool, InputEvent::pointer_up(30.0, 10.0));

        fx.feed(&mut tool, InputEvent::pointer_down(200.0, 200.0));
        let edits = fx.feed(&mut tool, InputEvent::pointer_up(200.0, 200.0));
        let id = edits[0].target();
        let idx = fx.scene.index_of(id).unwrap();
        assert_eq!(fx.scene.world_bounds(idx), Some(Aabb::new(200.0, 200.0, 100.0, 100.0)));
    }

    #[test]
    fn text_tool_places_and_selects() {
        let mut fx = Fixture::new();
        let mut tool = TextTool::new();
        let edits = fx.feed(&mut tool, InputEvent::pointer_down(40.0, 40.0));
        let id = edits[0].target();
        fx.feed(&mut tool, InputEvent::pointer_up(40.0, 40.0));

        let idx = fx.scene.index_of(id).unwrap();
        assert_eq!(fx.scene.selected(), &[idx]);
        assert!(matches!(&fx.scene.get(idx).unwrap().kind, NodeKind::Text(t) if t.content == "Text"));
    }
}

//! Application context and the per-frame loop.
//!
//! `AppContext` owns every editor subsystem; there is no ambient state.
//! The host calls `handle_input` from its event handlers and `frame(now)`
//! once per display refresh. Within a frame the order is fixed:
//!
//! 1. drain queued input (through the active tool) and queued edits
//! 2. run update systems: animation, constraints, layout, effects
//! 3. render, if anything changed since the last rendered frame
//! 4. clear the render flag
//!
//! Input that arrives while a frame runs simply waits in the queue for
//! the next one.

use crate::commands::CommandStack;
use crate::edit::SceneEdit;
use crate::error::EditorError;
use crate::input::InputEvent;
use crate::selection::{SelectionConfig, SelectionManager};
use crate::tools::{Tool, ToolContext, ToolKind, make_tool};
use kurbo::{Affine, Point};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;
use vd_core::{LayerManager, Scene};
use vd_render::{EngineConfig, FrameOutcome, PerformanceMonitor, RenderingEngine};

/// Zoom is clamped to this range.
const MIN_ZOOM: f64 = 0.02;
const MAX_ZOOM: f64 = 64.0;

// ─── Configuration ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub engine: EngineConfig,
    pub selection: SelectionConfig,
    pub undo_depth: usize,
    /// Frames averaged by the performance monitor.
    pub perf_window: usize,
    pub frame_budget_ms: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            selection: SelectionConfig::default(),
            undo_depth: 100,
            perf_window: 60,
            frame_budget_ms: 1000.0 / 60.0,
        }
    }
}

impl EditorConfig {
    /// Parse a (possibly partial) JSON override.
    pub fn from_json(text: &str) -> Result<Self, EditorError> {
        Ok(serde_json::from_str(text)?)
    }
}

// ─── Update systems ──────────────────────────────────────────────────────

/// Update stages, run in declaration order. Later stages may depend on
/// geometry the earlier ones just changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SystemStage {
    Animation,
    Constraints,
    Layout,
    Effects,
}

/// Per-frame work registered with the app (animations, simulations).
pub trait UpdateSystem {
    fn stage(&self) -> SystemStage;

    fn name(&self) -> &str {
        "system"
    }

    /// Advance by `dt_ms`. Scene mutations must go through `Scene` methods.
    fn update(&mut self, scene: &mut Scene, dt_ms: f64);
}

/// What one call to `AppContext::frame` did.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSummary {
    pub events: usize,
    pub edits_applied: usize,
    pub layouts_applied: usize,
    /// `None` when nothing changed or the loop is paused.
    pub render: Option<FrameOutcome>,
}

// ─── AppContext ──────────────────────────────────────────────────────────

pub struct AppContext {
    pub scene: Scene,
    pub layers: LayerManager,
    selection: SelectionManager,
    engine: RenderingEngine,
    monitor: PerformanceMonitor,
    commands: CommandStack,
    tool: Box<dyn Tool>,
    input: VecDeque<InputEvent>,
    edits: VecDeque<(SceneEdit, String)>,
    systems: Vec<Box<dyn UpdateSystem>>,
    /// Set by the scene listener on any document or selection change.
    scene_changed: Rc<Cell<bool>>,
    needs_render: bool,
    paused: bool,
    last_frame_ms: Option<f64>,
    /// Last pointer position in screen space, the zoom anchor.
    pointer: Point,
    gesture_open: bool,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("nodes", &self.scene.len())
            .field("tool", &self.tool.kind())
            .field("paused", &self.paused)
            .field("engine", &self.engine)
            .finish()
    }
}

impl AppContext {
    pub fn new(config: EditorConfig, scene: Scene, engine: RenderingEngine) -> Self {
        let mut scene = scene;
        let scene_changed = Rc::new(Cell::new(true));
        let flag = Rc::clone(&scene_changed);
        scene.subscribe(move |_| flag.set(true));

        let mut layers = LayerManager::new();
        layers.sync_with_scene(&mut scene);

        Self {
            scene,
            layers,
            selection: SelectionManager::new(config.selection),
            engine,
            monitor: PerformanceMonitor::new(config.perf_window, config.frame_budget_ms),
            commands: CommandStack::new(config.undo_depth),
            tool: make_tool(ToolKind::Select),
            input: VecDeque::new(),
            edits: VecDeque::new(),
            systems: Vec::new(),
            scene_changed,
            needs_render: true,
            paused: false,
            last_frame_ms: None,
            pointer: Point::ZERO,
            gesture_open: false,
        }
    }

    /// App without a GPU, rendering through the software backend.
    pub fn headless(config: EditorConfig, scene: Scene) -> Self {
        let engine = RenderingEngine::headless(config.engine.clone());
        Self::new(config, scene, engine)
    }

    pub fn selection(&self) -> &SelectionManager {
        &self.selection
    }

    pub fn engine(&self) -> &RenderingEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut RenderingEngine {
        self.needs_render = true;
        &mut self.engine
    }

    pub fn commands(&self) -> &CommandStack {
        &self.commands
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    pub fn tool(&self) -> ToolKind {
        self.tool.kind()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn needs_render(&self) -> bool {
        self.needs_render || self.scene_changed.get()
    }

    // ─── Host entry points ───────────────────────────────────────────

    /// Queue an input event for the next frame. Coordinates are screen
    /// pixels.
    pub fn handle_input(&mut self, event: InputEvent) {
        self.input.push_back(event);
    }

    /// Queue an edit for the next frame. It becomes its own undo step.
    pub fn queue_edit(&mut self, edit: SceneEdit, description: impl Into<String>) {
        self.edits.push_back((edit, description.into()));
    }

    pub fn add_system(&mut self, system: Box<dyn UpdateSystem>) {
        log::debug!("app: registered {} ({:?})", system.name(), system.stage());
        self.systems.push(system);
        self.systems.sort_by_key(|s| s.stage());
    }

    /// Switch tools, abandoning any gesture in flight.
    pub fn set_tool(&mut self, kind: ToolKind) -> Result<(), EditorError> {
        if self.tool.kind() == kind {
            return Ok(());
        }
        let mut cx = ToolContext {
            scene: &mut self.scene,
            layers: &mut self.layers,
            selection: &mut self.selection,
        };
        self.tool.reset(&mut cx);
        self.close_gesture()?;
        self.tool = make_tool(kind);
        self.needs_render = true;
        Ok(())
    }

    pub fn pause(&mut self) {
        if !self.paused {
            log::debug!("app: paused");
            self.paused = true;
        }
    }

    /// Resume the loop. Timing history is dropped so the pause does not
    /// read as one very slow frame.
    pub fn resume(&mut self) {
        if self.paused {
            log::debug!("app: resumed");
            self.paused = false;
            self.last_frame_ms = None;
            self.monitor.reset();
            self.needs_render = true;
        }
    }

    pub fn undo(&mut self) -> Result<Option<String>, EditorError> {
        let undone = self.commands.undo(&mut self.scene)?;
        if undone.is_some() {
            self.layers.sync_with_scene(&mut self.scene);
        }
        Ok(undone)
    }

    pub fn redo(&mut self) -> Result<Option<String>, EditorError> {
        let redone = self.commands.redo(&mut self.scene)?;
        if redone.is_some() {
            self.layers.sync_with_scene(&mut self.scene);
        }
        Ok(redone)
    }

    // ─── Frame ───────────────────────────────────────────────────────

    /// Run one frame at host time `now_ms`.
    pub fn frame(&mut self, now_ms: f64) -> Result<FrameSummary, EditorError> {
        let mut summary = FrameSummary {
            events: 0,
            edits_applied: 0,
            layouts_applied: 0,
            render: None,
        };
        if self.paused {
            return Ok(summary);
        }
        let dt = self.last_frame_ms.map_or(0.0, |last| (now_ms - last).max(0.0));
        self.last_frame_ms = Some(now_ms);

        // (1) input and queued edits
        let events: Vec<InputEvent> = self.input.drain(..).collect();
        summary.events = events.len();
        for event in events {
            summary.edits_applied += self.process_event(event)?;
        }
        let edits: Vec<(SceneEdit, String)> = self.edits.drain(..).collect();
        for (edit, description) in edits {
            if self.commands.execute(&mut self.scene, &edit, &description)? {
                summary.edits_applied += 1;
            }
        }

        // (2) dependent systems, in stage order
        // Pending auto layouts close out the layout stage.
        let mut laid_out = false;
        for system in &mut self.systems {
            if !laid_out && system.stage() > SystemStage::Layout {
                summary.layouts_applied = self.scene.run_pending_layouts();
                laid_out = true;
            }
            system.update(&mut self.scene, dt);
        }
        if !laid_out {
            summary.layouts_applied = self.scene.run_pending_layouts();
        }

        // (3) render
        if self.needs_render() {
            let started = Instant::now();
            self.monitor.begin_frame(now_ms);
            self.engine.set_overlay(self.selection.overlay(&mut self.scene));
            let metrics = self.monitor.get_metrics();
            let outcome = self.engine.render_frame(&mut self.scene, &mut self.layers, &metrics)?;
            self.monitor.end_frame(now_ms + started.elapsed().as_secs_f64() * 1000.0);
            summary.render = Some(outcome);

            // (4) a skipped frame leaves the flag set so the next one retries
            if outcome != FrameOutcome::Skipped {
                self.needs_render = false;
                self.scene_changed.set(false);
            }
        } else {
            self.monitor.tick(now_ms);
        }
        Ok(summary)
    }

    /// Route one event. Returns the number of edits that changed the scene.
    fn process_event(&mut self, event: InputEvent) -> Result<usize, EditorError> {
        if let Some((x, y)) = event.position() {
            self.pointer = Point::new(x, y);
        }
        match &event {
            InputEvent::Scroll { dx, dy, zoom } => {
                self.scroll(*dx, *dy, *zoom);
                return Ok(0);
            }
            InputEvent::Key { key, modifiers } if modifiers.command() => {
                let handled = match key.as_str() {
                    "z" | "Z" if modifiers.shift => Some(self.redo()?),
                    "z" | "Z" => Some(self.undo()?),
                    "y" | "Y" => Some(self.redo()?),
                    _ => None,
                };
                if let Some(done) = handled {
                    return Ok(usize::from(done.is_some()));
                }
            }
            InputEvent::Key { key, modifiers } if !self.gesture_open && !modifiers.alt => {
                let tool = match key.as_str() {
                    "v" | "V" => Some(ToolKind::Select),
                    "r" | "R" => Some(ToolKind::Rect),
                    "o" | "O" => Some(ToolKind::Ellipse),
                    "t" | "T" => Some(ToolKind::Text),
                    _ => None,
                };
                if let Some(kind) = tool {
                    self.set_tool(kind)?;
                    return Ok(0);
                }
            }
            _ => {}
        }

        let inverse = self.engine.view().inverse();
        let event = event.map_position(|x, y| {
            let p = inverse * Point::new(x, y);
            (p.x, p.y)
        });

        if matches!(event, InputEvent::PointerDown { .. }) && !self.gesture_open {
            let label = format!("{:?}", self.tool.kind());
            self.commands.begin_batch(&self.scene, &label)?;
            self.gesture_open = true;
        }

        let mut cx = ToolContext {
            scene: &mut self.scene,
            layers: &mut self.layers,
            selection: &mut self.selection,
        };
        let edits = self.tool.handle(&event, &mut cx);
        let mut applied = 0;
        for edit in &edits {
            if self.commands.execute(&mut self.scene, edit, edit.label())? {
                applied += 1;
            }
        }
        if applied > 0 {
            self.layers.sync_with_scene(&mut self.scene);
        }

        if matches!(event, InputEvent::PointerUp { .. }) {
            self.close_gesture()?;
        }
        // Escape may cancel a drag without a pointer-up.
        if matches!(event, InputEvent::Key { .. }) && self.gesture_open && !self.selection.is_interacting() {
            self.close_gesture()?;
        }
        Ok(applied)
    }

    fn close_gesture(&mut self) -> Result<(), EditorError> {
        if self.gesture_open {
            self.gesture_open = false;
            self.commands.end_batch(&self.scene)?;
        }
        Ok(())
    }

    /// Pan by the scroll delta, or zoom about the pointer.
    fn scroll(&mut self, dx: f64, dy: f64, zoom: f64) {
        let view = self.engine.view();
        let next = if zoom > 0.0 && (zoom - 1.0).abs() > f64::EPSILON {
            let current = view.determinant().abs().sqrt();
            let target = (current * zoom).clamp(MIN_ZOOM, MAX_ZOOM);
            let factor = target / current;
            let anchor = self.pointer.to_vec2();
            Affine::translate(anchor) * Affine::scale(factor) * Affine::translate(-anchor) * view
        } else {
            Affine::translate((-dx, -dy)) * view
        };
        self.engine.set_view(next);
        self.needs_render = true;
    }
}

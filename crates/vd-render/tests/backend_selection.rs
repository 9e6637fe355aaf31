//! Integration tests: drive `RenderingEngine` through backend selection,
//! hardware context loss, and the hybrid layer cache.

use pretty_assertions::assert_eq;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use vd_core::{Color, LayerManager, NodeIndex, NodeKind, Paint, Scene, SceneNode, Viewport};
use vd_render::{
    BackendChoice, EngineConfig, EngineState, FrameOutcome, FrameReport, HardwareContextProvider, HardwareSurface,
    PerformanceMetrics, RenderError, RenderMode, RenderingEngine,
};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ─── Scripted hardware ───────────────────────────────────────────────────

struct ScriptedSurface {
    lost: Rc<Cell<bool>>,
    presents: Rc<Cell<u32>>,
}

impl HardwareSurface for ScriptedSurface {
    fn present(&mut self, _scene: &vello::Scene, _w: u32, _h: u32) -> Result<(), RenderError> {
        if self.lost.get() {
            return Err(RenderError::ContextLost);
        }
        self.presents.set(self.presents.get() + 1);
        Ok(())
    }
}

/// Each `create_context` pops the next scripted outcome; an empty script
/// means no GPU.
#[derive(Clone, Default)]
struct ScriptedProvider {
    outcomes: Rc<RefCell<VecDeque<bool>>>,
    lost: Rc<Cell<bool>>,
    presents: Rc<Cell<u32>>,
    attempts: Rc<Cell<u32>>,
}

impl ScriptedProvider {
    fn new(outcomes: &[bool]) -> Self {
        let provider = Self::default();
        provider.outcomes.borrow_mut().extend(outcomes.iter().copied());
        provider
    }
}

impl HardwareContextProvider for ScriptedProvider {
    fn create_context(&mut self, _w: u32, _h: u32) -> Result<Box<dyn HardwareSurface>, RenderError> {
        self.attempts.set(self.attempts.get() + 1);
        if self.outcomes.borrow_mut().pop_front().unwrap_or(false) {
            self.lost.set(false);
            Ok(Box::new(ScriptedSurface {
                lost: self.lost.clone(),
                presents: self.presents.clone(),
            }))
        } else {
            Err(RenderError::ContextUnavailable("scripted failure".into()))
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────

fn filled_rect(w: f64, h: f64, color: Color) -> SceneNode {
    let mut node = SceneNode::fresh(NodeKind::rect(w, h));
    if let NodeKind::Shape(props) = &mut node.kind {
        props.fill = Some(Paint::solid(color));
    }
    node
}

/// Root group with `count` small rects; complexity grows 1.4 per rect.
fn busy_scene(count: usize) -> (Scene, NodeIndex) {
    let mut scene = Scene::new();
    let root = scene.add_node(SceneNode::fresh(NodeKind::group()), None).unwrap();
    for i in 0..count {
        let x = (i % 40) as f64 * 5.0;
        let y = (i / 40) as f64 * 5.0;
        scene
            .add_node(filled_rect(4.0, 4.0, Color::BLACK).at(x, y), Some(root))
            .unwrap();
    }
    (scene, root)
}

fn metrics(fps: f64) -> PerformanceMetrics {
    PerformanceMetrics {
        fps,
        ..Default::default()
    }
}

fn config(mode: RenderMode) -> EngineConfig {
    EngineConfig {
        mode,
        viewport: Viewport {
            width: 200.0,
            height: 200.0,
        },
        ..Default::default()
    }
}

fn rendered(outcome: FrameOutcome) -> FrameReport {
    match outcome {
        FrameOutcome::Rendered(report) => report,
        FrameOutcome::Skipped => panic!("expected a rendered frame"),
    }
}

// ─── Selection ───────────────────────────────────────────────────────────

#[test]
fn busy_scene_goes_hardware_until_frame_rate_drops() {
    init_logs();
    let (mut scene, _) = busy_scene(800);
    assert!(scene.get_complexity_score() > 1200.0);
    let mut layers = LayerManager::new();
    let provider = ScriptedProvider::new(&[true]);
    let mut engine = RenderingEngine::new(config(RenderMode::Auto), Box::new(provider.clone()));

    let fast = rendered(engine.render_frame(&mut scene, &mut layers, &metrics(45.0)).unwrap());
    assert_eq!(fast.backend, BackendChoice::Hardware);
    assert_eq!(fast.nodes_painted, 800);
    assert_eq!(engine.state(), EngineState::HardwareActive);

    let slow = rendered(engine.render_frame(&mut scene, &mut layers, &metrics(20.0)).unwrap());
    assert_ne!(slow.backend, BackendChoice::Hardware);
    assert_eq!(slow.backend, BackendChoice::Hybrid);
    assert_eq!(provider.presents.get(), 2);
}

#[test]
fn light_scene_stays_on_software() {
    init_logs();
    let mut scene = Scene::new();
    let root = scene.add_node(SceneNode::fresh(NodeKind::group()), None).unwrap();
    scene
        .add_node(filled_rect(20.0, 20.0, Color::rgba(1.0, 0.0, 0.0, 1.0)).at(10.0, 10.0), Some(root))
        .unwrap();
    let mut layers = LayerManager::new();
    let mut engine = RenderingEngine::new(config(RenderMode::Auto), Box::new(ScriptedProvider::new(&[true])));

    let report = rendered(engine.render_frame(&mut scene, &mut layers, &metrics(60.0)).unwrap());
    assert_eq!(report.backend, BackendChoice::Software);
    assert_eq!(engine.software().pixel(15, 15), Some([255, 0, 0, 255]));
    assert_eq!(engine.software().pixel(50, 50), Some([255, 255, 255, 255]));
}

#[test]
fn no_gpu_means_software_even_when_forced() {
    init_logs();
    let (mut scene, _) = busy_scene(800);
    let mut layers = LayerManager::new();
    let mut engine = RenderingEngine::headless(config(RenderMode::Hardware));

    let report = rendered(engine.render_frame(&mut scene, &mut layers, &metrics(60.0)).unwrap());
    assert_eq!(report.backend, BackendChoice::Software);
    assert_eq!(engine.state(), EngineState::SoftwareActive);
    assert!(!engine.status().hardware_available);
}

// ─── Context loss ────────────────────────────────────────────────────────

#[test]
fn context_loss_with_failed_reinit_pins_software() {
    init_logs();
    let (mut scene, _) = busy_scene(10);
    let mut layers = LayerManager::new();
    let provider = ScriptedProvider::new(&[true, false]);
    let mut engine = RenderingEngine::new(config(RenderMode::Hardware), Box::new(provider.clone()));

    let first = rendered(engine.render_frame(&mut scene, &mut layers, &metrics(60.0)).unwrap());
    assert_eq!(first.backend, BackendChoice::Hardware);

    provider.lost.set(true);
    let lost = engine.render_frame(&mut scene, &mut layers, &metrics(60.0)).unwrap();
    assert_eq!(lost, FrameOutcome::Skipped);
    assert_eq!(engine.state(), EngineState::Recovering);
    assert_eq!(engine.status().context_losses, 1);

    // The single reinitialization attempt fails; no frame is produced.
    let retry = engine.render_frame(&mut scene, &mut layers, &metrics(60.0)).unwrap();
    assert_eq!(retry, FrameOutcome::Skipped);
    assert_eq!(provider.attempts.get(), 2);
    assert_eq!(engine.state(), EngineState::SoftwareActive);
    assert!(engine.status().pinned_software);

    let after = rendered(engine.render_frame(&mut scene, &mut layers, &metrics(60.0)).unwrap());
    assert_eq!(after.backend, BackendChoice::Software);
    assert!(!engine.set_render_mode(RenderMode::Hardware));
    assert_eq!(engine.mode(), RenderMode::Software);
    assert_eq!(provider.attempts.get(), 2);
}

#[test]
fn context_loss_with_successful_reinit_resumes_hardware() {
    init_logs();
    let (mut scene, _) = busy_scene(10);
    let mut layers = LayerManager::new();
    let provider = ScriptedProvider::new(&[true, true]);
    let mut engine = RenderingEngine::new(config(RenderMode::Hardware), Box::new(provider.clone()));

    rendered(engine.render_frame(&mut scene, &mut layers, &metrics(60.0)).unwrap());
    provider.lost.set(true);
    assert_eq!(
        engine.render_frame(&mut scene, &mut layers, &metrics(60.0)).unwrap(),
        FrameOutcome::Skipped
    );
    assert_eq!(
        engine.render_frame(&mut scene, &mut layers, &metrics(60.0)).unwrap(),
        FrameOutcome::Skipped
    );
    assert_eq!(engine.state(), EngineState::HardwareActive);

    let resumed = rendered(engine.render_frame(&mut scene, &mut layers, &metrics(60.0)).unwrap());
    assert_eq!(resumed.backend, BackendChoice::Hardware);
    assert!(!engine.status().pinned_software);
}

// ─── Hybrid layer cache ──────────────────────────────────────────────────

#[test]
fn hybrid_reencodes_only_dirty_layers() {
    init_logs();
    let (mut scene, root) = busy_scene(800);
    let mut layers = LayerManager::new();
    let overlay = layers.create_layer("overlay", 10);
    let marker = scene
        .add_node(filled_rect(10.0, 10.0, Color::BLACK).at(150.0, 150.0), Some(root))
        .unwrap();
    assert!(layers.assign(&mut scene, marker, overlay));

    let provider = ScriptedProvider::new(&[true]);
    let mut engine = RenderingEngine::new(config(RenderMode::Auto), Box::new(provider));
    let slow = metrics(20.0);

    let first = rendered(engine.render_frame(&mut scene, &mut layers, &slow).unwrap());
    assert_eq!(first.backend, BackendChoice::Hybrid);
    assert_eq!((first.layers_rendered, first.layers_cached), (2, 0));
    assert_eq!(first.nodes_painted, 801);

    let idle = rendered(engine.render_frame(&mut scene, &mut layers, &slow).unwrap());
    assert_eq!((idle.layers_rendered, idle.layers_cached), (0, 2));
    assert_eq!(idle.nodes_painted, 0);

    scene.translate_node(marker, 5.0, 0.0);
    let moved = rendered(engine.render_frame(&mut scene, &mut layers, &slow).unwrap());
    assert_eq!((moved.layers_rendered, moved.layers_cached), (1, 1));
    assert_eq!(moved.nodes_painted, 1);

    // Panning invalidates every cached layer.
    engine.set_view(kurbo::Affine::translate((10.0, 0.0)));
    let panned = rendered(engine.render_frame(&mut scene, &mut layers, &slow).unwrap());
    assert_eq!((panned.layers_rendered, panned.layers_cached), (2, 0));
}

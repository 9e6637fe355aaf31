//! Backend selection and the render state machine.
//!
//! ```text
//! NoBackend ──initialize──▶ HardwareActive ──context lost──▶ Recovering
//!     │                          ▲                               │
//!     └──(no context)──▶ SoftwareActive ◀──(reinit failed, pinned)┘
//! ```
//!
//! In `Auto` mode the backend is re-chosen every frame from the scene's
//! complexity score and the measured frame rate. `Hybrid` renders through
//! the hardware backend with one cached render target per layer; only
//! layers whose membership changed or that contain dirty nodes re-encode.

use crate::backend::{Quad, RendererBackend, TextureId, check_texture_len};
use crate::error::RenderError;
use crate::hardware::{HardwareContextProvider, HardwareRenderer, HardwareSurface, Headless};
use crate::paint::{LayerTreatment, PaintContext, layer_treatments, paint_batches, paint_overlay};
use crate::perf::PerformanceMetrics;
use crate::software::SoftwareRenderer;
use kurbo::Affine;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use vd_core::{Color, LayerId, LayerManager, NodeIndex, RenderBatch, Scene, Viewport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    #[default]
    Auto,
    Hardware,
    Software,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendChoice {
    Hardware,
    /// Hardware backend with per-layer render-target caching.
    Hybrid,
    Software,
}

impl BackendChoice {
    /// The per-frame heuristic for `Auto` mode.
    pub fn select(complexity: f64, fps: f64, hardware_available: bool, config: &EngineConfig) -> Self {
        if hardware_available && complexity > config.hardware_complexity && fps > config.min_hardware_fps {
            Self::Hardware
        } else if hardware_available && complexity > config.hybrid_complexity {
            Self::Hybrid
        } else {
            Self::Software
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    NoBackend,
    HardwareActive,
    SoftwareActive,
    /// Context lost; the next frame attempts one reinitialization.
    Recovering,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub mode: RenderMode,
    /// Complexity above which full hardware rendering is considered.
    pub hardware_complexity: f64,
    /// Complexity above which the hybrid path is considered.
    pub hybrid_complexity: f64,
    /// Hardware is only chosen while the frame rate stays above this.
    pub min_hardware_fps: f64,
    pub viewport: Viewport,
    pub clear_color: Color,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: RenderMode::Auto,
            hardware_complexity: 1000.0,
            hybrid_complexity: 500.0,
            min_hardware_fps: 30.0,
            viewport: Viewport::default(),
            clear_color: Color::WHITE,
        }
    }
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON override.
    pub fn from_json(text: &str) -> Result<Self, RenderError> {
        Ok(serde_json::from_str(text)?)
    }

    fn surface_size(&self) -> (u32, u32) {
        let dim = |v: f64| v.round().max(1.0) as u32;
        (dim(self.viewport.width), dim(self.viewport.height))
    }
}

/// Snapshot for a status indicator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineStatus {
    pub state: EngineState,
    pub mode: RenderMode,
    pub hardware_available: bool,
    pub pinned_software: bool,
    pub last_choice: Option<BackendChoice>,
    pub context_losses: u32,
    pub frames_rendered: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub backend: BackendChoice,
    pub nodes_painted: usize,
    pub layers_rendered: usize,
    pub layers_cached: usize,
    pub draw_calls: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Rendered(FrameReport),
    /// No frame produced (backend reinitialization in flight).
    Skipped,
}

// ─── Caches ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ImageStore {
    pixels: HashMap<String, (u32, u32, Vec<u8>)>,
    software: HashMap<String, TextureId>,
    hardware: HashMap<String, TextureId>,
}

impl ImageStore {
    fn upload_all(&mut self, backend: &mut dyn RendererBackend) {
        self.hardware.clear();
        for (src, (w, h, rgba)) in &self.pixels {
            match backend.create_texture(*w, *h, rgba) {
                Ok(id) => {
                    self.hardware.insert(src.clone(), id);
                }
                Err(err) => log::warn!("render: image {src:?} not uploaded: {err}"),
            }
        }
    }
}

#[derive(Debug)]
struct CachedLayer {
    target: TextureId,
    nodes: Vec<NodeIndex>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CacheEpoch {
    layers_version: u64,
    view: [f64; 6],
    size: (u32, u32),
}

#[derive(Debug, Default)]
struct LayerCache {
    entries: HashMap<LayerId, CachedLayer>,
    epoch: Option<CacheEpoch>,
}

impl LayerCache {
    /// Everything re-encodes next hybrid frame.
    fn invalidate(&mut self) {
        self.epoch = None;
    }

    fn release_all(&mut self, backend: &mut dyn RendererBackend) {
        for (_, cached) in self.entries.drain() {
            backend.release(cached.target);
        }
    }

    /// The targets died with their context.
    fn forget(&mut self) {
        self.entries.clear();
        self.epoch = None;
    }
}

// ─── Engine ──────────────────────────────────────────────────────────────

pub struct RenderingEngine {
    config: EngineConfig,
    provider: Box<dyn HardwareContextProvider>,
    software: SoftwareRenderer,
    hardware: Option<HardwareRenderer>,
    state: EngineState,
    mode: RenderMode,
    pinned_software: bool,
    last_choice: Option<BackendChoice>,
    view: Affine,
    layer_cache: LayerCache,
    images: ImageStore,
    overlay: Vec<Quad>,
    context_losses: u32,
    frames_rendered: u64,
}

impl std::fmt::Debug for RenderingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderingEngine")
            .field("status", &self.status())
            .field("config", &self.config)
            .finish()
    }
}

impl RenderingEngine {
    pub fn new(config: EngineConfig, provider: Box<dyn HardwareContextProvider>) -> Self {
        let (w, h) = config.surface_size();
        Self {
            mode: config.mode,
            software: SoftwareRenderer::new(w, h),
            config,
            provider,
            hardware: None,
            state: EngineState::NoBackend,
            pinned_software: false,
            last_choice: None,
            view: Affine::IDENTITY,
            layer_cache: LayerCache::default(),
            images: ImageStore::default(),
            overlay: Vec::new(),
            context_losses: 0,
            frames_rendered: 0,
        }
    }

    /// Engine for hosts without a GPU.
    pub fn headless(config: EngineConfig) -> Self {
        Self::new(config, Box::new(Headless))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn view(&self) -> Affine {
        self.view
    }

    pub fn software(&self) -> &SoftwareRenderer {
        &self.software
    }

    pub fn hardware(&self) -> Option<&HardwareRenderer> {
        self.hardware.as_ref()
    }

    pub fn hardware_available(&self) -> bool {
        self.hardware.is_some() && !self.pinned_software
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            state: self.state,
            mode: self.mode,
            hardware_available: self.hardware_available(),
            pinned_software: self.pinned_software,
            last_choice: self.last_choice,
            context_losses: self.context_losses,
            frames_rendered: self.frames_rendered,
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────────────

    /// Try to bring up the hardware backend; fall back to software.
    pub fn initialize(&mut self) -> EngineState {
        if self.mode == RenderMode::Software || self.pinned_software {
            log::info!("render: software backend active");
            self.state = EngineState::SoftwareActive;
            return self.state;
        }
        let (w, h) = self.config.surface_size();
        match self.provider.create_context(w, h) {
            Ok(surface) => self.install_hardware(surface),
            Err(err) => {
                log::warn!("render: {err}; falling back to software");
                self.state = EngineState::SoftwareActive;
            }
        }
        self.state
    }

    fn install_hardware(&mut self, surface: Box<dyn HardwareSurface>) {
        let (w, h) = self.config.surface_size();
        let mut hw = HardwareRenderer::new(surface, w, h);
        self.images.upload_all(&mut hw);
        self.hardware = Some(hw);
        self.layer_cache.forget();
        self.state = EngineState::HardwareActive;
        log::info!("render: hardware backend active ({w}x{h})");
    }

    /// React to an asynchronous context loss. Rendering pauses; the next
    /// frame makes one reinitialization attempt.
    pub fn handle_context_lost(&mut self) {
        log::warn!("render: hardware context lost; pausing for reinitialization");
        self.context_losses += 1;
        if let Some(mut hw) = self.hardware.take() {
            hw.dispose();
        }
        self.layer_cache.forget();
        self.images.hardware.clear();
        self.state = EngineState::Recovering;
    }

    fn reinitialize(&mut self) {
        let (w, h) = self.config.surface_size();
        match self.provider.create_context(w, h) {
            Ok(surface) => {
                self.install_hardware(surface);
                log::info!("render: hardware context restored");
            }
            Err(err) => {
                log::warn!("render: reinitialization failed ({err}); pinning software rendering");
                self.pinned_software = true;
                self.mode = RenderMode::Software;
                self.state = EngineState::SoftwareActive;
            }
        }
    }

    /// Returns `false` when hardware modes are requested after the
    /// engine was pinned to software.
    pub fn set_render_mode(&mut self, mode: RenderMode) -> bool {
        if self.pinned_software && mode != RenderMode::Software {
            log::warn!("render: pinned to software, ignoring {mode:?}");
            return false;
        }
        self.mode = mode;
        if mode != RenderMode::Software
            && self.hardware.is_none()
            && self.state != EngineState::Recovering
        {
            self.initialize();
        }
        true
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.config.viewport = Viewport { width, height };
        let (w, h) = self.config.surface_size();
        self.software.resize(w, h);
        if let Some(hw) = self.hardware.as_mut() {
            hw.resize(w, h);
        }
        self.layer_cache.invalidate();
    }

    /// Canvas pan/zoom.
    pub fn set_view(&mut self, view: Affine) {
        self.view = view;
    }

    /// Register decoded straight-alpha RGBA8 pixels for image nodes with `src`.
    pub fn register_image(
        &mut self,
        src: impl Into<String>,
        width: u32,
        height: u32,
        rgba: Vec<u8>,
    ) -> Result<(), RenderError> {
        check_texture_len(width, height, &rgba)?;
        let src = src.into();
        let id = self.software.create_texture(width, height, &rgba)?;
        if let Some(old) = self.images.software.insert(src.clone(), id) {
            self.software.release(old);
        }
        if let Some(hw) = self.hardware.as_mut() {
            let id = hw.create_texture(width, height, &rgba)?;
            if let Some(old) = self.images.hardware.insert(src.clone(), id) {
                hw.release(old);
            }
        }
        self.images.pixels.insert(src, (width, height, rgba));
        self.layer_cache.invalidate();
        Ok(())
    }

    /// Quads drawn on top of every following frame, in document space.
    /// Overlay changes never invalidate cached layers.
    pub fn set_overlay(&mut self, quads: Vec<Quad>) {
        self.overlay = quads;
    }

    pub fn dispose(&mut self) {
        self.software.dispose();
        if let Some(mut hw) = self.hardware.take() {
            hw.dispose();
        }
        self.layer_cache.forget();
        self.images.software.clear();
        self.images.hardware.clear();
        self.state = EngineState::NoBackend;
    }

    // ─── Frames ──────────────────────────────────────────────────────

    /// Backend for a frame with the given load, honoring the render mode.
    pub fn choose_backend(&self, complexity: f64, fps: f64) -> BackendChoice {
        let hardware = self.hardware_available();
        match self.mode {
            RenderMode::Software => BackendChoice::Software,
            RenderMode::Hardware if hardware => BackendChoice::Hardware,
            RenderMode::Hardware => BackendChoice::Software,
            RenderMode::Auto => BackendChoice::select(complexity, fps, hardware, &self.config),
        }
    }

    /// Render one frame. Drains the scene's dirty set.
    pub fn render_frame(
        &mut self,
        scene: &mut Scene,
        layers: &mut LayerManager,
        metrics: &PerformanceMetrics,
    ) -> Result<FrameOutcome, RenderError> {
        match self.state {
            EngineState::NoBackend => {
                self.initialize();
            }
            EngineState::Recovering => {
                self.reinitialize();
                return Ok(FrameOutcome::Skipped);
            }
            EngineState::HardwareActive | EngineState::SoftwareActive => {}
        }

        scene.refresh();
        let treatments = layer_treatments(scene, layers);
        let dirty_layers = collect_dirty_layers(scene, layers, &treatments);
        let complexity = scene.get_complexity_score();
        let choice = self.choose_backend(complexity, metrics.fps);
        if self.last_choice != Some(choice) {
            log::info!(
                "render: {:?} -> {choice:?} (complexity {complexity:.0}, fps {:.1})",
                self.last_choice,
                metrics.fps
            );
            if choice == BackendChoice::Hybrid {
                self.layer_cache.invalidate();
            }
        }
        self.last_choice = Some(choice);

        let layers_version = layers.version();
        let batches = layers.get_batched_nodes(scene);
        let clear = self.config.clear_color;
        let view = self.view;

        let result = match (choice, self.hardware.as_mut()) {
            (BackendChoice::Hardware, Some(hw)) => {
                let cx = PaintContext {
                    view,
                    textures: &self.images.hardware,
                    composited_layers: false,
                    treatments: &treatments,
                };
                render_direct(hw, scene, batches, &cx, &self.overlay, clear, choice)
            }
            (BackendChoice::Hybrid, Some(hw)) => {
                let cx = PaintContext {
                    view,
                    textures: &self.images.hardware,
                    composited_layers: true,
                    treatments: &treatments,
                };
                let epoch = CacheEpoch {
                    layers_version,
                    view: view.as_coeffs(),
                    size: hw.size(),
                };
                render_hybrid(
                    hw,
                    &mut self.layer_cache,
                    epoch,
                    scene,
                    batches,
                    &dirty_layers,
                    &cx,
                    &self.overlay,
                    clear,
                )
            }
            _ => {
                let cx = PaintContext {
                    view,
                    textures: &self.images.software,
                    composited_layers: false,
                    treatments: &treatments,
                };
                render_direct(
                    &mut self.software,
                    scene,
                    batches,
                    &cx,
                    &self.overlay,
                    clear,
                    BackendChoice::Software,
                )
            }
        };

        match result {
            Ok(report) => {
                self.frames_rendered += 1;
                log::trace!("render: {report:?}");
                Ok(FrameOutcome::Rendered(report))
            }
            Err(RenderError::ContextLost) => {
                self.handle_context_lost();
                Ok(FrameOutcome::Skipped)
            }
            Err(err) => Err(err),
        }
    }
}

/// Layers touched by dirty nodes or anything beneath them, plus layers
/// masked by a dirty node.
fn collect_dirty_layers(
    scene: &mut Scene,
    layers: &LayerManager,
    treatments: &HashMap<LayerId, LayerTreatment>,
) -> HashSet<LayerId> {
    let mut out = HashSet::new();
    for idx in scene.get_dirty_nodes() {
        for node in scene.subtree(idx) {
            if let Some(layer) = layers.layer_of(scene, node) {
                out.insert(layer);
            }
            out.extend(
                treatments
                    .iter()
                    .filter(|(_, t)| t.mask == Some(node))
                    .map(|(layer, _)| *layer),
            );
        }
    }
    out
}

fn render_direct(
    backend: &mut dyn RendererBackend,
    scene: &Scene,
    batches: &[RenderBatch],
    cx: &PaintContext,
    overlay: &[Quad],
    clear: Color,
    choice: BackendChoice,
) -> Result<FrameReport, RenderError> {
    backend.begin_frame(clear);
    let nodes_painted = paint_batches(backend, scene, batches, cx);
    paint_overlay(backend, overlay, cx.view);
    let draw_calls = backend.stats().draw_calls;
    backend.end_frame()?;
    Ok(FrameReport {
        backend: choice,
        nodes_painted,
        layers_rendered: 0,
        layers_cached: 0,
        draw_calls,
    })
}

#[allow(clippy::too_many_arguments)]
fn render_hybrid(
    hw: &mut HardwareRenderer,
    cache: &mut LayerCache,
    epoch: CacheEpoch,
    scene: &Scene,
    batches: &[RenderBatch],
    dirty: &HashSet<LayerId>,
    cx: &PaintContext,
    overlay: &[Quad],
    clear: Color,
) -> Result<FrameReport, RenderError> {
    if cache.epoch != Some(epoch) {
        cache.release_all(hw);
        cache.epoch = Some(epoch);
    }
    let (w, h) = hw.size();
    let mut report = FrameReport {
        backend: BackendChoice::Hybrid,
        nodes_painted: 0,
        layers_rendered: 0,
        layers_cached: 0,
        draw_calls: 0,
    };
    let mut seen = HashSet::new();

    hw.begin_frame(clear);
    for run in batches.chunk_by(|a, b| a.key.layer == b.key.layer) {
        let head = &run[0];
        let layer = head.key.layer;
        seen.insert(layer);
        let nodes: Vec<NodeIndex> = run.iter().flat_map(|b| b.nodes.iter().copied()).collect();

        let (target, fresh) = match cache.entries.get(&layer) {
            Some(cached) => (cached.target, cached.nodes == nodes && !dirty.contains(&layer)),
            None => (hw.create_render_target(w, h)?, false),
        };
        if fresh {
            report.layers_cached += 1;
        } else {
            hw.begin_render_target(target);
            hw.clear(Color::TRANSPARENT);
            report.nodes_painted += paint_batches(hw, scene, run, cx);
            hw.end_render_target();
            report.layers_rendered += 1;
        }
        cache.entries.insert(layer, CachedLayer { target, nodes });

        hw.set_blend_mode(head.key.blend_mode);
        hw.draw_textured_quad(&Quad::fullscreen(w, h), target, head.opacity);
    }
    paint_overlay(hw, overlay, cx.view);

    let gone: Vec<LayerId> = cache.entries.keys().filter(|l| !seen.contains(*l)).copied().collect();
    for layer in gone {
        if let Some(cached) = cache.entries.remove(&layer) {
            hw.release(cached.target);
        }
    }

    report.draw_calls = hw.stats().draw_calls;
    hw.end_frame()?;
    Ok(report)
}

//! Vello-encoded GPU backend.
//!
//! Draw calls are encoded into a `vello::Scene`; the host-provided
//! [`HardwareSurface`] turns the finished scene into pixels (wgpu device,
//! WebGPU canvas, ...). Render targets are recorded sub-scenes that get
//! appended when composited, so caching a layer costs one encoding.
//!
//! Groups become vello layers clipped to their path. Blurred fills use
//! `draw_blurred_rounded_rect` over the path's bounding box. vello has no
//! filter pass, so group blur, group shadows and backdrop blur are not
//! encoded here.

use crate::backend::{
    BackendKind, BackendStats, GroupStyle, Quad, RendererBackend, TextureId, check_texture_len, to_mix,
    to_peniko_color,
};
use crate::error::RenderError;
use kurbo::{Affine, BezPath, Rect, Shape};
use peniko::{Fill, Image, ImageFormat, Mix};
use std::collections::HashMap;
use vd_core::{BlendMode, Color};
use vello::Scene;

/// A live GPU context able to present encoded scenes.
pub trait HardwareSurface {
    /// Rasterize and present `scene`. A lost device reports
    /// [`RenderError::ContextLost`].
    fn present(&mut self, scene: &Scene, width: u32, height: u32) -> Result<(), RenderError>;

    fn resize(&mut self, _width: u32, _height: u32) {}
}

/// Creates hardware contexts on demand. Supplied by the host.
pub trait HardwareContextProvider {
    fn create_context(&mut self, width: u32, height: u32) -> Result<Box<dyn HardwareSurface>, RenderError>;
}

/// Provider for hosts without a GPU. Always fails, so the engine runs
/// on the software backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct Headless;

impl HardwareContextProvider for Headless {
    fn create_context(&mut self, _width: u32, _height: u32) -> Result<Box<dyn HardwareSurface>, RenderError> {
        Err(RenderError::ContextUnavailable("no GPU adapter on this host".into()))
    }
}

struct EncodedTarget {
    scene: Scene,
    width: u32,
    height: u32,
}

pub struct HardwareRenderer {
    surface: Box<dyn HardwareSurface>,
    width: u32,
    height: u32,
    frame: Scene,
    targets: HashMap<TextureId, EncodedTarget>,
    textures: HashMap<TextureId, Image>,
    /// Targets being recorded, innermost last.
    recording: Vec<(TextureId, Scene)>,
    blend: BlendMode,
    blend_layer_open: bool,
    /// Groups pushed and not yet popped.
    open_groups: u32,
    next_texture: u32,
    stats: BackendStats,
}

impl std::fmt::Debug for HardwareRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareRenderer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("targets", &self.targets.len())
            .field("textures", &self.textures.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl HardwareRenderer {
    pub fn new(surface: Box<dyn HardwareSurface>, width: u32, height: u32) -> Self {
        log::debug!("hardware renderer: {width}x{height}");
        Self {
            surface,
            width,
            height,
            frame: Scene::new(),
            targets: HashMap::new(),
            textures: HashMap::new(),
            recording: Vec::new(),
            blend: BlendMode::Normal,
            blend_layer_open: false,
            open_groups: 0,
            next_texture: 1,
            stats: BackendStats::default(),
        }
    }

    /// The scene encoded for the current (or last) frame.
    pub fn encoded_frame(&self) -> &Scene {
        &self.frame
    }

    fn current(&mut self) -> &mut Scene {
        match self.recording.last_mut() {
            Some((_, scene)) => scene,
            None => &mut self.frame,
        }
    }

    fn viewport_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width as f64, self.height as f64)
    }

    fn close_blend_layer(&mut self) {
        if self.blend_layer_open {
            self.current().pop_layer();
            self.blend_layer_open = false;
        }
    }

    fn alloc_id(&mut self) -> TextureId {
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        id
    }
}

impl RendererBackend for HardwareRenderer {
    fn kind(&self) -> BackendKind {
        BackendKind::Hardware
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn begin_frame(&mut self, clear: Color) {
        if !self.recording.is_empty() {
            log::warn!("hardware renderer: {} render targets left recording", self.recording.len());
            self.recording.clear();
        }
        self.frame.reset();
        self.blend = BlendMode::Normal;
        self.blend_layer_open = false;
        self.open_groups = 0;
        self.stats = BackendStats {
            frames: self.stats.frames,
            textures: self.textures.len() + self.targets.len(),
            ..Default::default()
        };
        let rect = self.viewport_rect();
        self.frame
            .fill(Fill::NonZero, Affine::IDENTITY, to_peniko_color(clear), None, &rect);
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        while self.pop_group() {}
        while !self.recording.is_empty() {
            self.end_render_target();
        }
        self.close_blend_layer();
        self.surface.present(&self.frame, self.width, self.height)?;
        self.stats.frames += 1;
        Ok(())
    }

    fn clear(&mut self, color: Color) {
        self.blend_layer_open = false;
        let rect = match self.recording.last() {
            Some((id, _)) => self
                .targets
                .get(id)
                .map(|t| Rect::new(0.0, 0.0, t.width as f64, t.height as f64))
                .unwrap_or_else(|| self.viewport_rect()),
            None => self.viewport_rect(),
        };
        let scene = self.current();
        scene.reset();
        if color.a > 0.0 {
            scene.fill(Fill::NonZero, Affine::IDENTITY, to_peniko_color(color), None, &rect);
        }
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        if self.blend == mode {
            return;
        }
        self.close_blend_layer();
        if mode != BlendMode::Normal {
            let clip = self.viewport_rect();
            self.current()
                .push_layer(to_mix(mode), 1.0, Affine::IDENTITY, &clip);
            self.blend_layer_open = true;
        }
        self.blend = mode;
        self.stats.blend_changes += 1;
    }

    fn draw_quad(&mut self, quad: &Quad) {
        let rect = quad.local_rect();
        self.current()
            .fill(Fill::NonZero, quad.transform, to_peniko_color(quad.color), None, &rect);
        self.stats.draw_calls += 1;
    }

    fn draw_textured_quad(&mut self, quad: &Quad, texture: TextureId, opacity: f32) {
        let opacity = opacity.clamp(0.0, 1.0);
        if let Some(image) = self.textures.get(&texture) {
            let fit = Affine::scale_non_uniform(
                quad.width / image.width.max(1) as f64,
                quad.height / image.height.max(1) as f64,
            );
            let image = image.clone().with_alpha(opacity);
            self.current().draw_image(&image, quad.transform * fit);
        } else if let Some(target) = self.targets.get(&texture) {
            let fit = quad.transform
                * Affine::scale_non_uniform(
                    quad.width / target.width.max(1) as f64,
                    quad.height / target.height.max(1) as f64,
                );
            let clip = Rect::new(0.0, 0.0, target.width as f64, target.height as f64);
            let scene = match self.recording.last_mut() {
                Some((_, scene)) => scene,
                None => &mut self.frame,
            };
            scene.push_layer(Mix::Normal, opacity, fit, &clip);
            scene.append(&target.scene, Some(fit));
            scene.pop_layer();
        } else {
            log::trace!("hardware renderer: unknown texture {texture:?}");
            return;
        }
        self.stats.draw_calls += 1;
    }

    fn fill_path(&mut self, path: &BezPath, transform: Affine, color: Color, rule: Fill) {
        self.current()
            .fill(rule, transform, to_peniko_color(color), None, path);
        self.stats.draw_calls += 1;
    }

    fn stroke_path(&mut self, path: &BezPath, transform: Affine, stroke: &kurbo::Stroke, color: Color) {
        self.current()
            .stroke(stroke, transform, to_peniko_color(color), None, path);
        self.stats.draw_calls += 1;
    }

    fn fill_blurred(&mut self, path: &BezPath, transform: Affine, color: Color, rule: Fill, blur: f64) {
        if blur <= 0.0 || rule == Fill::EvenOdd {
            self.fill_path(path, transform, color, rule);
            return;
        }
        let rect = path.bounding_box();
        self.current()
            .draw_blurred_rounded_rect(transform, rect, to_peniko_color(color), 0.0, blur / 2.0);
        self.stats.draw_calls += 1;
    }

    fn blur_backdrop(&mut self, _path: &BezPath, _transform: Affine, radius: f64) {
        log::trace!("hardware renderer: backdrop blur {radius:.1} not encoded");
    }

    fn push_group(&mut self, style: GroupStyle) {
        self.close_blend_layer();
        self.blend = BlendMode::Normal;
        if style.blur > 0.0 || style.shadow.is_some() {
            log::trace!("hardware renderer: group blur/shadow not encoded");
        }
        let mix = to_mix(style.blend);
        let alpha = style.opacity.clamp(0.0, 1.0);
        let viewport = self.viewport_rect();
        let scene = self.current();
        match &style.clip {
            Some(clip) => scene.push_layer(mix, alpha, Affine::IDENTITY, clip),
            None => scene.push_layer(mix, alpha, Affine::IDENTITY, &viewport),
        }
        self.open_groups += 1;
    }

    fn pop_group(&mut self) -> bool {
        if self.open_groups == 0 {
            return false;
        }
        self.close_blend_layer();
        self.blend = BlendMode::Normal;
        self.current().pop_layer();
        self.open_groups -= 1;
        self.stats.draw_calls += 1;
        true
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<TextureId, RenderError> {
        check_texture_len(width, height, rgba)?;
        let id = self.alloc_id();
        let image = Image::new(rgba.to_vec().into(), ImageFormat::Rgba8, width, height);
        self.textures.insert(id, image);
        Ok(id)
    }

    fn create_render_target(&mut self, width: u32, height: u32) -> Result<TextureId, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::IncompleteTarget(format!("{width}x{height}")));
        }
        let id = self.alloc_id();
        self.targets.insert(
            id,
            EncodedTarget {
                scene: Scene::new(),
                width,
                height,
            },
        );
        Ok(id)
    }

    fn begin_render_target(&mut self, target: TextureId) -> bool {
        if !self.targets.contains_key(&target) || self.recording.iter().any(|(id, _)| *id == target) {
            return false;
        }
        self.close_blend_layer();
        self.blend = BlendMode::Normal;
        self.recording.push((target, Scene::new()));
        self.stats.target_switches += 1;
        true
    }

    fn end_render_target(&mut self) -> bool {
        if self.recording.is_empty() {
            return false;
        }
        self.close_blend_layer();
        self.blend = BlendMode::Normal;
        let Some((id, scene)) = self.recording.pop() else {
            return false;
        };
        if let Some(target) = self.targets.get_mut(&id) {
            target.scene = scene;
        }
        true
    }

    fn release(&mut self, texture: TextureId) -> bool {
        self.recording.retain(|(id, _)| *id != texture);
        self.textures.remove(&texture).is_some() | self.targets.remove(&texture).is_some()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.surface.resize(width, height);
    }

    fn dispose(&mut self) {
        self.frame.reset();
        self.recording.clear();
        self.targets.clear();
        self.textures.clear();
    }

    fn stats(&self) -> BackendStats {
        BackendStats {
            textures: self.textures.len() + self.targets.len(),
            ..self.stats
        }
    }
}

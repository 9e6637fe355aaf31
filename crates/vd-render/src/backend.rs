//! The renderer backend seam.
//!
//! Exactly two implementors exist: [`crate::software::SoftwareRenderer`]
//! and [`crate::hardware::HardwareRenderer`]. The engine picks one per
//! frame and the painter talks to it only through this trait.

use crate::error::RenderError;
use kurbo::{Affine, BezPath, Rect, Vec2};
use peniko::{Fill, Mix};
use vd_core::{BlendMode, Color};

/// Handle to a texture or a render target owned by a backend.
/// Render targets are textures too, so a finished target can be drawn
/// with [`RendererBackend::draw_textured_quad`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Software,
    Hardware,
}

/// An axis-aligned `width × height` box placed by `transform`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub transform: Affine,
    pub width: f64,
    pub height: f64,
    pub color: Color,
}

impl Quad {
    pub fn new(transform: Affine, width: f64, height: f64, color: Color) -> Self {
        Self {
            transform,
            width,
            height,
            color,
        }
    }

    /// A quad covering the whole `width × height` output.
    pub fn fullscreen(width: u32, height: u32) -> Self {
        Self::new(Affine::IDENTITY, width as f64, height as f64, Color::WHITE)
    }

    pub fn local_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    /// Device-space bounding box of the transformed quad.
    pub fn device_bounds(&self) -> Rect {
        self.transform.transform_rect_bbox(self.local_rect())
    }
}

/// Shadow cast by the finished contents of a group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupShadow {
    /// Device-space offset.
    pub offset: Vec2,
    /// Device-space blur radius.
    pub blur: f64,
    pub color: Color,
}

/// How an offscreen group lands on the surface below it.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStyle {
    /// Device-space clip. Group contents outside it are discarded.
    pub clip: Option<BezPath>,
    pub opacity: f32,
    pub blend: BlendMode,
    /// Device-space blur radius applied to the contents.
    pub blur: f64,
    pub shadow: Option<GroupShadow>,
}

impl Default for GroupStyle {
    fn default() -> Self {
        Self {
            clip: None,
            opacity: 1.0,
            blend: BlendMode::Normal,
            blur: 0.0,
            shadow: None,
        }
    }
}

impl GroupStyle {
    pub fn clipped(clip: BezPath) -> Self {
        Self {
            clip: Some(clip),
            ..Self::default()
        }
    }

    /// Nothing here needs an offscreen pass.
    pub fn is_plain(&self) -> bool {
        self.clip.is_none()
            && self.opacity >= 1.0
            && self.blend == BlendMode::Normal
            && self.blur <= 0.0
            && self.shadow.is_none()
    }
}

/// Per-frame counters. Reset by `begin_frame`, except `frames`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub frames: u64,
    pub draw_calls: u32,
    pub blend_changes: u32,
    pub target_switches: u32,
    pub textures: usize,
}

pub trait RendererBackend {
    fn kind(&self) -> BackendKind;

    fn size(&self) -> (u32, u32);

    /// Start a frame on the main surface, cleared to `clear`.
    fn begin_frame(&mut self, clear: Color);

    /// Finish the frame. Hardware backends present here and report a lost
    /// context as [`RenderError::ContextLost`].
    fn end_frame(&mut self) -> Result<(), RenderError>;

    /// Clear the current surface (main surface or bound render target).
    fn clear(&mut self, color: Color);

    fn set_blend_mode(&mut self, mode: BlendMode);

    fn draw_quad(&mut self, quad: &Quad);

    /// Draw `texture` stretched over `quad`. The quad color is ignored.
    fn draw_textured_quad(&mut self, quad: &Quad, texture: TextureId, opacity: f32);

    fn fill_path(&mut self, path: &BezPath, transform: Affine, color: Color, rule: Fill);

    fn stroke_path(&mut self, path: &BezPath, transform: Affine, stroke: &kurbo::Stroke, color: Color);

    /// Fill with a gaussian falloff of device-space radius `blur`
    /// (standard deviation `blur / 2`). A zero radius is a plain fill.
    fn fill_blurred(&mut self, path: &BezPath, transform: Affine, color: Color, rule: Fill, blur: f64);

    /// Blur what is already drawn under `path` by device-space `radius`.
    fn blur_backdrop(&mut self, path: &BezPath, transform: Affine, radius: f64);

    /// Redirect drawing into an offscreen group until `pop_group`, which
    /// composites it with `style`. Groups nest.
    fn push_group(&mut self, style: GroupStyle);

    fn pop_group(&mut self) -> bool;

    /// Upload straight-alpha RGBA8 pixels.
    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<TextureId, RenderError>;

    fn create_render_target(&mut self, width: u32, height: u32) -> Result<TextureId, RenderError>;

    /// Redirect drawing into `target` until the matching `end_render_target`.
    fn begin_render_target(&mut self, target: TextureId) -> bool;

    fn end_render_target(&mut self) -> bool;

    /// Free a texture or render target.
    fn release(&mut self, texture: TextureId) -> bool;

    fn resize(&mut self, width: u32, height: u32);

    /// Drop every GPU/CPU resource. The backend is unusable afterwards.
    fn dispose(&mut self);

    fn stats(&self) -> BackendStats;
}

// ─── Shared helpers ──────────────────────────────────────────────────────

pub fn to_mix(mode: BlendMode) -> Mix {
    match mode {
        BlendMode::Normal => Mix::Normal,
        BlendMode::Multiply => Mix::Multiply,
        BlendMode::Screen => Mix::Screen,
        BlendMode::Overlay => Mix::Overlay,
        BlendMode::Darken => Mix::Darken,
        BlendMode::Lighten => Mix::Lighten,
        BlendMode::ColorDodge => Mix::ColorDodge,
        BlendMode::ColorBurn => Mix::ColorBurn,
        BlendMode::HardLight => Mix::HardLight,
        BlendMode::SoftLight => Mix::SoftLight,
        BlendMode::Difference => Mix::Difference,
        BlendMode::Exclusion => Mix::Exclusion,
    }
}

pub fn to_peniko_color(color: Color) -> peniko::Color {
    let [r, g, b, a] = color.to_rgba8();
    peniko::Color::from_rgba8(r, g, b, a)
}

/// Radius of each of three box passes approximating a gaussian of
/// standard deviation `sigma`.
pub(crate) fn box_radius(sigma: f64) -> usize {
    if sigma <= 0.0 {
        return 0;
    }
    let width = (4.0 * sigma * sigma + 1.0).sqrt();
    ((width - 1.0) / 2.0).round().max(1.0) as usize
}

pub(crate) fn check_texture_len(width: u32, height: u32, rgba: &[u8]) -> Result<(), RenderError> {
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(RenderError::TextureSize {
            width,
            height,
            expected,
            got: rgba.len(),
        });
    }
    Ok(())
}

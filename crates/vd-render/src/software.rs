//! CPU rasterizer backend.
//!
//! Surfaces are premultiplied RGBA8. Paths are flattened with kurbo and
//! filled with a scanline pass sampling pixel centers; blend modes use the
//! separable W3C formulas on unpremultiplied channels.
//!
//! Blurs are three box passes per axis. Groups are full-size offscreen
//! surfaces composited through an optional clip coverage mask.

use crate::backend::{
    BackendKind, BackendStats, GroupShadow, GroupStyle, Quad, RendererBackend, TextureId, box_radius,
    check_texture_len,
};
use crate::error::RenderError;
use kurbo::{Affine, BezPath, PathEl, Point, StrokeOpts};
use peniko::Fill;
use std::collections::HashMap;
use vd_core::{BlendMode, Color};

const FLATTEN_TOLERANCE: f64 = 0.25;

// ─── Surface ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Surface {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    fn from_straight(width: u32, height: u32, rgba: &[u8]) -> Self {
        let mut data = rgba.to_vec();
        for px in data.chunks_exact_mut(4) {
            let a = u16::from(px[3]);
            for c in &mut px[..3] {
                *c = ((u16::from(*c) * a + 127) / 255) as u8;
            }
        }
        Self { width, height, data }
    }

    fn clear(&mut self, color: Color) {
        let px = premul_rgba8(color);
        for chunk in self.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&px);
        }
    }

    fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]])
    }

    fn blend_at(&mut self, x: u32, y: u32, src: [f32; 4], mode: BlendMode) {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        composite_px(&mut self.data[i..i + 4], src, mode);
    }

    /// Scanline fill of closed polygons in device space.
    fn fill_polygons(&mut self, polys: &[Vec<Point>], rule: Fill, color: Color, mode: BlendMode) {
        if color.a <= 0.0 {
            return;
        }
        let src = [color.r, color.g, color.b, color.a];
        let (width, height) = (self.width, self.height);
        scan_spans(width, height, polys, rule, |x, y| self.blend_at(x, y, src, mode));
    }

    /// Paint `color` through a per-pixel coverage mask.
    fn blend_mask(&mut self, mask: &[f32], color: Color, mode: BlendMode) {
        let width = self.width as usize;
        for (i, &m) in mask.iter().enumerate() {
            if m <= 1e-3 {
                continue;
            }
            let (x, y) = ((i % width) as u32, (i / width) as u32);
            self.blend_at(x, y, [color.r, color.g, color.b, color.a * m.min(1.0)], mode);
        }
    }

    fn blur(&mut self, radius: usize) {
        if radius == 0 {
            return;
        }
        let mut plane: Vec<f32> = self.data.iter().map(|&v| f32::from(v)).collect();
        box_blur(&mut plane, self.width as usize, self.height as usize, 4, radius);
        for (dst, v) in self.data.iter_mut().zip(plane) {
            *dst = v.round().clamp(0.0, 255.0) as u8;
        }
    }

    /// Source-over of a same-sized group surface, scaled by `opacity`
    /// and the optional clip coverage.
    fn composite_group(&mut self, src: &Surface, clip: Option<&[f32]>, opacity: f32, mode: BlendMode) {
        let stride = self.width;
        let width = self.width.min(src.width);
        let height = self.height.min(src.height);
        for y in 0..height {
            for x in 0..width {
                let cover = clip.map_or(1.0, |c| c[(y * stride + x) as usize]);
                if cover <= 0.0 {
                    continue;
                }
                let Some(texel) = src.pixel(x, y) else {
                    continue;
                };
                if let Some(mut straight) = unpremultiply(texel) {
                    straight[3] *= opacity * cover;
                    self.blend_at(x, y, straight, mode);
                }
            }
        }
    }

    /// Offset, blurred copy of `src`'s alpha painted in the shadow color.
    fn cast_shadow(&mut self, src: &Surface, shadow: &GroupShadow, clip: Option<&[f32]>, opacity: f32) {
        let (w, h) = (self.width as usize, self.height as usize);
        let (ox, oy) = (shadow.offset.x.round() as i64, shadow.offset.y.round() as i64);
        let mut plane = vec![0.0f32; w * h];
        for y in 0..h {
            for x in 0..w {
                let (sx, sy) = (x as i64 - ox, y as i64 - oy);
                if sx < 0 || sy < 0 {
                    continue;
                }
                if let Some(texel) = src.pixel(sx as u32, sy as u32) {
                    plane[y * w + x] = f32::from(texel[3]) / 255.0;
                }
            }
        }
        box_blur(&mut plane, w, h, 1, box_radius(shadow.blur / 2.0));
        if let Some(clip) = clip {
            for (m, c) in plane.iter_mut().zip(clip) {
                *m *= c;
            }
        }
        self.blend_mask(&plane, shadow.color.with_alpha(shadow.color.a * opacity), BlendMode::Normal);
    }

    /// Nearest-neighbour sample of `src` stretched over `quad`.
    fn draw_surface(&mut self, src: &Surface, quad: &Quad, opacity: f32, mode: BlendMode) {
        if quad.transform.determinant().abs() < 1e-12 || quad.width <= 0.0 || quad.height <= 0.0 {
            return;
        }
        let inv = quad.transform.inverse();
        let bbox = quad.device_bounds();
        let x0 = bbox.x0.floor().max(0.0) as u32;
        let y0 = bbox.y0.floor().max(0.0) as u32;
        let x1 = bbox.x1.ceil().min(self.width as f64).max(0.0) as u32;
        let y1 = bbox.y1.ceil().min(self.height as f64).max(0.0) as u32;
        let sx = src.width as f64 / quad.width;
        let sy = src.height as f64 / quad.height;

        for y in y0..y1 {
            for x in x0..x1 {
                let local = inv * Point::new(x as f64 + 0.5, y as f64 + 0.5);
                if local.x < 0.0 || local.y < 0.0 || local.x >= quad.width || local.y >= quad.height {
                    continue;
                }
                let tx = ((local.x * sx) as u32).min(src.width.saturating_sub(1));
                let ty = ((local.y * sy) as u32).min(src.height.saturating_sub(1));
                let Some(texel) = src.pixel(tx, ty) else {
                    continue;
                };
                if let Some(mut straight) = unpremultiply(texel) {
                    straight[3] *= opacity;
                    self.blend_at(x, y, straight, mode);
                }
            }
        }
    }
}

// ─── Compositing ─────────────────────────────────────────────────────────

fn unpremultiply(texel: [u8; 4]) -> Option<[f32; 4]> {
    if texel[3] == 0 {
        return None;
    }
    let a = f32::from(texel[3]) / 255.0;
    Some([
        f32::from(texel[0]) / 255.0 / a,
        f32::from(texel[1]) / 255.0 / a,
        f32::from(texel[2]) / 255.0 / a,
        a,
    ])
}

fn premul_rgba8(color: Color) -> [u8; 4] {
    let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    let a = color.a.clamp(0.0, 1.0);
    [q(color.r * a), q(color.g * a), q(color.b * a), q(a)]
}

fn blend_channel(mode: BlendMode, s: f32, d: f32) -> f32 {
    match mode {
        BlendMode::Normal => s,
        BlendMode::Multiply => s * d,
        BlendMode::Screen => s + d - s * d,
        BlendMode::Overlay => blend_channel(BlendMode::HardLight, d, s),
        BlendMode::Darken => s.min(d),
        BlendMode::Lighten => s.max(d),
        BlendMode::ColorDodge => {
            if d <= 0.0 {
                0.0
            } else if s >= 1.0 {
                1.0
            } else {
                (d / (1.0 - s)).min(1.0)
            }
        }
        BlendMode::ColorBurn => {
            if d >= 1.0 {
                1.0
            } else if s <= 0.0 {
                0.0
            } else {
                1.0 - ((1.0 - d) / s).min(1.0)
            }
        }
        BlendMode::HardLight => {
            if s <= 0.5 {
                2.0 * s * d
            } else {
                1.0 - 2.0 * (1.0 - s) * (1.0 - d)
            }
        }
        BlendMode::SoftLight => {
            if s <= 0.5 {
                d - (1.0 - 2.0 * s) * d * (1.0 - d)
            } else {
                let g = if d <= 0.25 {
                    ((16.0 * d - 12.0) * d + 4.0) * d
                } else {
                    d.sqrt()
                };
                d + (2.0 * s - 1.0) * (g - d)
            }
        }
        BlendMode::Difference => (d - s).abs(),
        BlendMode::Exclusion => d + s - 2.0 * d * s,
    }
}

/// Source-over with a separable blend: straight `src` onto premultiplied `dst`.
fn composite_px(dst: &mut [u8], src: [f32; 4], mode: BlendMode) {
    let sa = src[3].clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for c in 0..3 {
        let sc = src[c].clamp(0.0, 1.0);
        let dp = dst[c] as f32 / 255.0;
        let dc = if da > 0.0 { (dp / da).min(1.0) } else { 0.0 };
        let out = sc * sa * (1.0 - da) + dp * (1.0 - sa) + blend_channel(mode, sc, dc) * sa * da;
        dst[c] = (out.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
    dst[3] = (out_a.clamp(0.0, 1.0) * 255.0).round() as u8;
}

// ─── Rasterization ───────────────────────────────────────────────────────

/// Visit every pixel whose center lies inside `polys` under `rule`.
fn scan_spans(width: u32, height: u32, polys: &[Vec<Point>], rule: Fill, mut visit: impl FnMut(u32, u32)) {
    let (min_y, max_y) = polys
        .iter()
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
    if !min_y.is_finite() {
        return;
    }
    let y0 = min_y.floor().max(0.0) as u32;
    let y1 = max_y.ceil().min(height as f64).max(0.0) as u32;
    let mut crossings: Vec<(f64, i32)> = Vec::new();

    for y in y0..y1 {
        let cy = y as f64 + 0.5;
        crossings.clear();
        for poly in polys {
            let n = poly.len();
            if n < 2 {
                continue;
            }
            for i in 0..n {
                let a = poly[i];
                let b = poly[(i + 1) % n];
                if (a.y <= cy && b.y > cy) || (b.y <= cy && a.y > cy) {
                    let t = (cy - a.y) / (b.y - a.y);
                    let dir = if b.y > a.y { 1 } else { -1 };
                    crossings.push((a.x + t * (b.x - a.x), dir));
                }
            }
        }
        crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut winding = 0;
        for i in 0..crossings.len().saturating_sub(1) {
            winding += crossings[i].1;
            let inside = match rule {
                Fill::NonZero => winding != 0,
                Fill::EvenOdd => winding % 2 != 0,
            };
            if !inside {
                continue;
            }
            let xa = (crossings[i].0 - 0.5).ceil().max(0.0);
            let xb = (crossings[i + 1].0 - 0.5).ceil().min(width as f64);
            if xb <= xa {
                continue;
            }
            for x in xa as u32..xb as u32 {
                visit(x, y);
            }
        }
    }
}

/// Full-surface coverage plane: 1.0 inside `polys`, 0.0 elsewhere.
fn coverage_mask(width: u32, height: u32, polys: &[Vec<Point>], rule: Fill) -> Vec<f32> {
    let mut mask = vec![0.0; width as usize * height as usize];
    scan_spans(width, height, polys, rule, |x, y| {
        mask[(y * width + x) as usize] = 1.0;
    });
    mask
}

/// Three box passes per axis over an interleaved plane of `channels`.
/// Samples past the edges count as zero.
fn box_blur(data: &mut [f32], width: usize, height: usize, channels: usize, radius: usize) {
    if radius == 0 || width == 0 || height == 0 {
        return;
    }
    let mut scratch = Vec::new();
    for _ in 0..3 {
        for y in 0..height {
            blur_line(data, y * width * channels, channels, width, channels, radius, &mut scratch);
        }
        for x in 0..width {
            blur_line(data, x * channels, width * channels, height, channels, radius, &mut scratch);
        }
    }
}

fn blur_line(
    data: &mut [f32],
    start: usize,
    stride: usize,
    len: usize,
    channels: usize,
    radius: usize,
    scratch: &mut Vec<f32>,
) {
    let norm = 1.0 / (2 * radius + 1) as f32;
    for c in 0..channels {
        scratch.clear();
        scratch.extend((0..len).map(|i| data[start + i * stride + c]));
        let mut sum: f32 = scratch[..radius.min(len)].iter().sum();
        for i in 0..len {
            if i + radius < len {
                sum += scratch[i + radius];
            }
            data[start + i * stride + c] = sum * norm;
            if i >= radius {
                sum -= scratch[i - radius];
            }
        }
    }
}

/// Flatten `path` under `transform` into closed device-space polygons.
fn flatten(path: &BezPath, transform: Affine) -> Vec<Vec<Point>> {
    let mut polys = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    kurbo::flatten(path.iter().map(|el| transform * el), FLATTEN_TOLERANCE, |el| match el {
        PathEl::MoveTo(p) => {
            if current.len() > 1 {
                polys.push(std::mem::take(&mut current));
            }
            current.clear();
            current.push(p);
        }
        PathEl::LineTo(p) => current.push(p),
        PathEl::ClosePath => {
            if current.len() > 1 {
                polys.push(std::mem::take(&mut current));
            }
            current.clear();
        }
        _ => {}
    });
    if current.len() > 1 {
        polys.push(current);
    }
    polys
}

// ─── Renderer ────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Group {
    surface: Surface,
    style: GroupStyle,
    /// Blend mode in force when the group was pushed.
    outer_blend: BlendMode,
}

#[derive(Debug)]
enum Bound {
    Target(TextureId),
    Group(Box<Group>),
}

#[derive(Debug)]
pub struct SoftwareRenderer {
    frame: Surface,
    surfaces: HashMap<TextureId, Surface>,
    /// Render targets and groups currently bound, innermost last.
    stack: Vec<Bound>,
    next_texture: u32,
    blend: BlendMode,
    stats: BackendStats,
}

impl SoftwareRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        log::debug!("software renderer: {width}x{height}");
        Self {
            frame: Surface::new(width, height),
            surfaces: HashMap::new(),
            stack: Vec::new(),
            next_texture: 1,
            blend: BlendMode::Normal,
            stats: BackendStats::default(),
        }
    }

    /// Premultiplied RGBA8 of the main surface.
    pub fn pixels(&self) -> &[u8] {
        &self.frame.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.frame.pixel(x, y)
    }

    /// Premultiplied RGBA8 of a texture or render target.
    pub fn texture_pixel(&self, texture: TextureId, x: u32, y: u32) -> Option<[u8; 4]> {
        self.surfaces.get(&texture)?.pixel(x, y)
    }

    fn current_mut(&mut self) -> Option<&mut Surface> {
        match self.stack.last_mut() {
            Some(Bound::Target(id)) => {
                let id = *id;
                self.surfaces.get_mut(&id)
            }
            Some(Bound::Group(group)) => Some(&mut group.surface),
            None => Some(&mut self.frame),
        }
    }

    fn is_bound(&self, texture: TextureId) -> bool {
        self.stack
            .iter()
            .any(|b| matches!(b, Bound::Target(t) if *t == texture))
    }

    fn alloc_id(&mut self) -> TextureId {
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        id
    }
}

impl RendererBackend for SoftwareRenderer {
    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn size(&self) -> (u32, u32) {
        (self.frame.width, self.frame.height)
    }

    fn begin_frame(&mut self, clear: Color) {
        if !self.stack.is_empty() {
            log::warn!("software renderer: {} render targets left bound", self.stack.len());
            self.stack.clear();
        }
        self.stats = BackendStats {
            frames: self.stats.frames,
            textures: self.surfaces.len(),
            ..Default::default()
        };
        self.blend = BlendMode::Normal;
        self.frame.clear(clear);
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        while matches!(self.stack.last(), Some(Bound::Group(_))) {
            self.pop_group();
        }
        self.stack.clear();
        self.stats.frames += 1;
        Ok(())
    }

    fn clear(&mut self, color: Color) {
        if let Some(surface) = self.current_mut() {
            surface.clear(color);
        }
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        if self.blend != mode {
            self.blend = mode;
            self.stats.blend_changes += 1;
        }
    }

    fn draw_quad(&mut self, quad: &Quad) {
        let mut path = BezPath::new();
        for (i, p) in [(0.0, 0.0), (quad.width, 0.0), (quad.width, quad.height), (0.0, quad.height)]
            .into_iter()
            .enumerate()
        {
            let p = quad.transform * Point::new(p.0, p.1);
            if i == 0 {
                path.move_to(p);
            } else {
                path.line_to(p);
            }
        }
        path.close_path();
        self.fill_path(&path, Affine::IDENTITY, quad.color, Fill::NonZero);
    }

    fn draw_textured_quad(&mut self, quad: &Quad, texture: TextureId, opacity: f32) {
        if self.is_bound(texture) {
            log::warn!("software renderer: texture {texture:?} drawn into itself");
            return;
        }
        let Some(src) = self.surfaces.remove(&texture) else {
            log::trace!("software renderer: unknown texture {texture:?}");
            return;
        };
        let mode = self.blend;
        if let Some(dst) = self.current_mut() {
            dst.draw_surface(&src, quad, opacity.clamp(0.0, 1.0), mode);
        }
        self.surfaces.insert(texture, src);
        self.stats.draw_calls += 1;
    }

    fn fill_path(&mut self, path: &BezPath, transform: Affine, color: Color, rule: Fill) {
        let polys = flatten(path, transform);
        let mode = self.blend;
        if let Some(surface) = self.current_mut() {
            surface.fill_polygons(&polys, rule, color, mode);
        }
        self.stats.draw_calls += 1;
    }

    fn stroke_path(&mut self, path: &BezPath, transform: Affine, stroke: &kurbo::Stroke, color: Color) {
        let outline = kurbo::stroke(path.iter(), stroke, &StrokeOpts::default(), FLATTEN_TOLERANCE);
        self.fill_path(&outline, transform, color, Fill::NonZero);
    }

    fn fill_blurred(&mut self, path: &BezPath, transform: Affine, color: Color, rule: Fill, blur: f64) {
        let radius = box_radius(blur / 2.0);
        if radius == 0 {
            self.fill_path(path, transform, color, rule);
            return;
        }
        let polys = flatten(path, transform);
        let mode = self.blend;
        if let Some(surface) = self.current_mut() {
            let mut mask = coverage_mask(surface.width, surface.height, &polys, rule);
            box_blur(&mut mask, surface.width as usize, surface.height as usize, 1, radius);
            surface.blend_mask(&mask, color, mode);
        }
        self.stats.draw_calls += 1;
    }

    fn blur_backdrop(&mut self, path: &BezPath, transform: Affine, radius: f64) {
        let radius = box_radius(radius / 2.0);
        if radius == 0 {
            return;
        }
        let polys = flatten(path, transform);
        if let Some(surface) = self.current_mut() {
            let mask = coverage_mask(surface.width, surface.height, &polys, Fill::NonZero);
            let mut blurred = surface.clone();
            blurred.blur(radius);
            for (i, &m) in mask.iter().enumerate() {
                if m > 0.0 {
                    surface.data[i * 4..i * 4 + 4].copy_from_slice(&blurred.data[i * 4..i * 4 + 4]);
                }
            }
        }
        self.stats.draw_calls += 1;
    }

    fn push_group(&mut self, style: GroupStyle) {
        let (width, height) = match self.current_mut() {
            Some(surface) => (surface.width, surface.height),
            None => (self.frame.width, self.frame.height),
        };
        self.stack.push(Bound::Group(Box::new(Group {
            surface: Surface::new(width, height),
            style,
            outer_blend: self.blend,
        })));
        self.blend = BlendMode::Normal;
    }

    fn pop_group(&mut self) -> bool {
        if !matches!(self.stack.last(), Some(Bound::Group(_))) {
            return false;
        }
        let Some(Bound::Group(group)) = self.stack.pop() else {
            return false;
        };
        let Group {
            mut surface,
            style,
            outer_blend,
        } = *group;
        self.blend = outer_blend;
        surface.blur(box_radius(style.blur / 2.0));
        let clip = style
            .clip
            .as_ref()
            .map(|c| coverage_mask(surface.width, surface.height, &flatten(c, Affine::IDENTITY), Fill::NonZero));
        if let Some(dst) = self.current_mut() {
            if let Some(shadow) = &style.shadow {
                dst.cast_shadow(&surface, shadow, clip.as_deref(), style.opacity);
            }
            dst.composite_group(&surface, clip.as_deref(), style.opacity, style.blend);
        }
        self.stats.draw_calls += 1;
        true
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<TextureId, RenderError> {
        check_texture_len(width, height, rgba)?;
        let id = self.alloc_id();
        self.surfaces.insert(id, Surface::from_straight(width, height, rgba));
        Ok(id)
    }

    fn create_render_target(&mut self, width: u32, height: u32) -> Result<TextureId, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::IncompleteTarget(format!("{width}x{height}")));
        }
        let id = self.alloc_id();
        self.surfaces.insert(id, Surface::new(width, height));
        Ok(id)
    }

    fn begin_render_target(&mut self, target: TextureId) -> bool {
        if !self.surfaces.contains_key(&target) || self.is_bound(target) {
            return false;
        }
        self.stack.push(Bound::Target(target));
        self.stats.target_switches += 1;
        true
    }

    fn end_render_target(&mut self) -> bool {
        if !matches!(self.stack.last(), Some(Bound::Target(_))) {
            return false;
        }
        self.stack.pop().is_some()
    }

    fn release(&mut self, texture: TextureId) -> bool {
        self.stack.retain(|b| !matches!(b, Bound::Target(t) if *t == texture));
        self.surfaces.remove(&texture).is_some()
    }

    fn resize(&mut self, width: u32, height: u32) {
        if (width, height) != self.size() {
            self.frame = Surface::new(width, height);
        }
    }

    fn dispose(&mut self) {
        self.surfaces.clear();
        self.stack.clear();
        self.frame = Surface::new(0, 0);
    }

    fn stats(&self) -> BackendStats {
        BackendStats {
            textures: self.surfaces.len(),
            ..self.stats
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Ellipse, Line, Rect, Shape};
    use pretty_assertions::assert_eq;

    const RED: Color = Color::rgba(1.0, 0.0, 0.0, 1.0);

    fn white(w: u32, h: u32) -> SoftwareRenderer {
        let mut r = SoftwareRenderer::new(w, h);
        r.begin_frame(Color::WHITE);
        r
    }

    #[test]
    fn quad_covers_pixel_centers() {
        let mut r = white(20, 20);
        r.draw_quad(&Quad::new(Affine::translate((5.0, 5.0)), 10.0, 10.0, RED));
        assert_eq!(r.pixel(5, 5), Some([255, 0, 0, 255]));
        assert_eq!(r.pixel(14, 14), Some([255, 0, 0, 255]));
        assert_eq!(r.pixel(15, 15), Some([255, 255, 255, 255]));
        assert_eq!(r.pixel(4, 10), Some([255, 255, 255, 255]));
        assert_eq!(r.stats().draw_calls, 1);
    }

    #[test]
    fn translucent_source_over() {
        let mut r = white(4, 4);
        r.draw_quad(&Quad::new(Affine::IDENTITY, 4.0, 4.0, RED.with_alpha(0.5)));
        assert_eq!(r.pixel(1, 1), Some([255, 128, 128, 255]));
    }

    #[test]
    fn multiply_darkens() {
        let mut r = SoftwareRenderer::new(4, 4);
        r.begin_frame(Color::rgba(0.5, 0.5, 0.5, 1.0));
        r.set_blend_mode(BlendMode::Multiply);
        r.draw_quad(&Quad::new(Affine::IDENTITY, 4.0, 4.0, RED));
        assert_eq!(r.pixel(0, 0), Some([128, 0, 0, 255]));
        assert_eq!(r.stats().blend_changes, 1);
    }

    #[test]
    fn ellipse_fill_misses_corners() {
        let mut r = white(20, 20);
        let path = Ellipse::new((10.0, 10.0), (10.0, 10.0), 0.0).to_path(0.1);
        r.fill_path(&path, Affine::IDENTITY, RED, Fill::NonZero);
        assert_eq!(r.pixel(10, 10), Some([255, 0, 0, 255]));
        assert_eq!(r.pixel(0, 0), Some([255, 255, 255, 255]));
    }

    #[test]
    fn even_odd_leaves_hole() {
        let mut r = white(20, 20);
        let mut path = Rect::new(0.0, 0.0, 20.0, 20.0).to_path(0.1);
        path.extend(Rect::new(5.0, 5.0, 15.0, 15.0).to_path(0.1));
        r.fill_path(&path, Affine::IDENTITY, RED, Fill::EvenOdd);
        assert_eq!(r.pixel(2, 2), Some([255, 0, 0, 255]));
        assert_eq!(r.pixel(10, 10), Some([255, 255, 255, 255]));
    }

    #[test]
    fn stroke_has_width() {
        let mut r = white(20, 20);
        let path = Line::new((0.0, 10.0), (20.0, 10.0)).to_path(0.1);
        r.stroke_path(&path, Affine::IDENTITY, &kurbo::Stroke::new(4.0), RED);
        assert_eq!(r.pixel(10, 9), Some([255, 0, 0, 255]));
        assert_eq!(r.pixel(10, 15), Some([255, 255, 255, 255]));
    }

    #[test]
    fn render_target_composites_back() {
        let mut r = white(8, 8);
        let target = r.create_render_target(8, 8).unwrap();
        assert!(r.begin_render_target(target));
        r.clear(Color::TRANSPARENT);
        r.draw_quad(&Quad::new(Affine::IDENTITY, 4.0, 8.0, RED));
        assert!(r.end_render_target());
        assert_eq!(r.pixel(1, 1), Some([255, 255, 255, 255]));

        r.draw_textured_quad(&Quad::fullscreen(8, 8), target, 1.0);
        assert_eq!(r.pixel(1, 1), Some([255, 0, 0, 255]));
        assert_eq!(r.pixel(6, 1), Some([255, 255, 255, 255]));
    }

    #[test]
    fn texture_upload_validates_and_samples() {
        let mut r = white(4, 4);
        assert!(r.create_texture(2, 2, &[0; 8]).is_err());
        let tex = r.create_texture(1, 1, &[0, 0, 255, 255]).unwrap();
        r.draw_textured_quad(&Quad::new(Affine::IDENTITY, 2.0, 2.0, Color::WHITE), tex, 1.0);
        assert_eq!(r.pixel(1, 1), Some([0, 0, 255, 255]));
        assert_eq!(r.pixel(3, 3), Some([255, 255, 255, 255]));
    }

    #[test]
    fn group_clip_and_opacity() {
        let mut r = white(20, 20);
        r.push_group(GroupStyle {
            clip: Some(Rect::new(0.0, 0.0, 10.0, 20.0).to_path(0.1)),
            opacity: 0.5,
            ..GroupStyle::default()
        });
        r.draw_quad(&Quad::new(Affine::IDENTITY, 20.0, 20.0, RED));
        assert_eq!(r.pixel(5, 5), Some([255, 255, 255, 255]));
        assert!(r.pop_group());
        assert!(!r.pop_group());
        assert_eq!(r.pixel(5, 5), Some([255, 128, 128, 255]));
        assert_eq!(r.pixel(15, 5), Some([255, 255, 255, 255]));
    }

    #[test]
    fn group_shadow_follows_contents() {
        let mut r = white(20, 20);
        r.push_group(GroupStyle {
            shadow: Some(GroupShadow {
                offset: kurbo::Vec2::new(5.0, 0.0),
                blur: 0.0,
                color: Color::BLACK,
            }),
            ..GroupStyle::default()
        });
        r.draw_quad(&Quad::new(Affine::IDENTITY, 10.0, 10.0, RED));
        r.pop_group();
        assert_eq!(r.pixel(5, 5), Some([255, 0, 0, 255]));
        assert_eq!(r.pixel(12, 5), Some([0, 0, 0, 255]));
        assert_eq!(r.pixel(17, 5), Some([255, 255, 255, 255]));
    }

    #[test]
    fn blurred_fill_reaches_past_the_edge() {
        let mut r = white(30, 30);
        let path = Rect::new(10.0, 10.0, 20.0, 20.0).to_path(0.1);
        r.fill_blurred(&path, Affine::IDENTITY, Color::BLACK, Fill::NonZero, 4.0);
        let inside = r.pixel(15, 15).unwrap();
        let outside = r.pixel(21, 15).unwrap();
        assert!(inside[0] < outside[0]);
        assert!(outside[0] < 255);
        assert_eq!(r.pixel(1, 1), Some([255, 255, 255, 255]));
    }

    #[test]
    fn zero_sized_target_is_incomplete() {
        let mut r = SoftwareRenderer::new(4, 4);
        assert!(matches!(
            r.create_render_target(0, 4),
            Err(RenderError::IncompleteTarget(_))
        ));
    }
}

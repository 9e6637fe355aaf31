//! Batched draw list → backend calls.
//!
//! Walks the layer manager's batches in order and emits fills, strokes,
//! textured quads and effects. Geometry is built in node-local space and
//! placed with `view · world`.
//!
//! Node effects: drop shadows are blurred fills of the (spread) outline,
//! inner shadows are a blurred inverse outline clipped to the shape,
//! layer blur paints the node into a blurred group and background blur
//! blurs the backdrop under the outline. A layer with a mask or effects
//! is painted as one group clipped to the mask node; the mask node itself
//! is not painted. Layer-level inner shadows are not drawn, and layer
//! background blur needs a mask to bound it.
//!
//! Text is not shaped here. Each line paints as a bar of its estimated
//! advance in the text fill, which keeps layout and hit areas visible.

use crate::backend::{GroupShadow, GroupStyle, Quad, RendererBackend, TextureId};
use kurbo::{
    Affine, BezPath, Cap, Ellipse as KurboEllipse, Join, Point, Rect, RoundedRect, Shape, Stroke as KurboStroke,
    StrokeOpts,
};
use peniko::Fill;
use std::collections::HashMap;
use vd_core::model::{
    NodeKind, Paint, PathCmd, ShapeGeometry, ShapeProps, Stroke, StrokeCap, StrokeJoin, TextAlign, TextProps,
};
use vd_core::{BlendMode, Color, Effect, LayerId, LayerManager, NodeIndex, RenderBatch, Scene, SceneNode};

const SHAPE_TOLERANCE: f64 = 0.1;

/// Flat color for images whose pixels were never registered.
const IMAGE_PLACEHOLDER: Color = Color::rgba(0.56, 0.56, 0.58, 0.15);

/// Glyph x-height band as a fraction of the font size.
const TEXT_BAR: f64 = 0.5;
const TEXT_ADVANCE: f64 = 0.6;

/// Mask and effects of one layer, resolved against the scene.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerTreatment {
    pub mask: Option<NodeIndex>,
    pub effects: Vec<Effect>,
}

/// Layers that need more than plain painting, keyed by id.
pub fn layer_treatments(scene: &Scene, layers: &LayerManager) -> HashMap<LayerId, LayerTreatment> {
    let mut out = HashMap::new();
    for layer in layers.ordered() {
        let mask = layer.mask.and_then(|id| {
            let idx = scene.index_of(id);
            if idx.is_none() {
                log::trace!("paint: layer {:?} mask {} not in scene", layer.id, id.as_str());
            }
            idx
        });
        let effects: Vec<Effect> = layer.effects.iter().filter(|e| e.is_enabled()).cloned().collect();
        if mask.is_some() || !effects.is_empty() {
            out.insert(layer.id, LayerTreatment { mask, effects });
        }
    }
    out
}

#[derive(Debug, Clone, Copy)]
pub struct PaintContext<'a> {
    /// Canvas pan/zoom applied on top of world transforms.
    pub view: Affine,
    /// Uploaded images by `src`.
    pub textures: &'a HashMap<String, TextureId>,
    /// Layer opacity and blend are applied by a compositor, not per node.
    pub composited_layers: bool,
    /// Masks and effects per layer, from [`layer_treatments`].
    pub treatments: &'a HashMap<LayerId, LayerTreatment>,
}

/// Paint `batches` in order. Returns how many nodes were drawn.
pub fn paint_batches(
    backend: &mut dyn RendererBackend,
    scene: &Scene,
    batches: &[RenderBatch],
    cx: &PaintContext,
) -> usize {
    let mut painted = 0;
    for run in batches.chunk_by(|a, b| a.key.layer == b.key.layer) {
        match cx.treatments.get(&run[0].key.layer) {
            Some(treatment) => {
                let style = treated_layer_style(backend, scene, treatment, cx);
                backend.push_group(style);
                painted += paint_run(backend, scene, run, cx, treatment.mask);
                backend.pop_group();
            }
            None => painted += paint_run(backend, scene, run, cx, None),
        }
    }
    backend.set_blend_mode(BlendMode::Normal);
    painted
}

/// Group style for a treated layer. Backdrop blur is applied right away.
fn treated_layer_style(
    backend: &mut dyn RendererBackend,
    scene: &Scene,
    treatment: &LayerTreatment,
    cx: &PaintContext,
) -> GroupStyle {
    let scale = device_scale(cx.view);
    let clip = treatment.mask.and_then(|idx| {
        let node = scene.get(idx)?;
        let mut path = silhouette(&node.kind);
        path.apply_affine(cx.view * node.world_transform().to_affine());
        Some(path)
    });
    let mut style = GroupStyle {
        clip,
        ..GroupStyle::default()
    };
    for effect in &treatment.effects {
        match *effect {
            Effect::LayerBlur { radius, .. } => style.blur = radius * scale,
            Effect::DropShadow {
                offset_x,
                offset_y,
                blur,
                color,
                ..
            } => {
                style.shadow = Some(GroupShadow {
                    offset: cx.view * Point::new(offset_x, offset_y) - cx.view * Point::ZERO,
                    blur: blur * scale,
                    color,
                });
            }
            Effect::BackgroundBlur { radius, .. } => match &style.clip {
                Some(clip) => backend.blur_backdrop(clip, Affine::IDENTITY, radius * scale),
                None => log::trace!("paint: layer background blur without a mask"),
            },
            Effect::InnerShadow { .. } => log::trace!("paint: layer inner shadow not drawn"),
        }
    }
    style
}

fn paint_run(
    backend: &mut dyn RendererBackend,
    scene: &Scene,
    run: &[RenderBatch],
    cx: &PaintContext,
    mask: Option<NodeIndex>,
) -> usize {
    let mut painted = 0;
    for batch in run {
        let layer_opacity = if cx.composited_layers { 1.0 } else { batch.opacity };
        for &idx in &batch.nodes {
            if Some(idx) == mask {
                continue;
            }
            let Some(node) = scene.get(idx) else {
                continue;
            };
            let blend = match node.blend_mode {
                BlendMode::Normal if !cx.composited_layers => batch.key.blend_mode,
                mode => mode,
            };
            backend.set_blend_mode(blend);
            let opacity = inherited_opacity(scene, idx) * layer_opacity;
            if opacity <= 0.0 {
                continue;
            }
            let world = node.world_transform().to_affine();
            paint_node(backend, node, cx, world, opacity);
            painted += 1;
        }
    }
    painted
}

/// Node opacity times every ancestor's.
pub fn inherited_opacity(scene: &Scene, idx: NodeIndex) -> f32 {
    let mut opacity = 1.0;
    let mut cur = Some(idx);
    while let Some(i) = cur {
        if let Some(node) = scene.get(i) {
            opacity *= node.opacity.clamp(0.0, 1.0);
        }
        cur = scene.parent(i);
    }
    opacity
}

/// Editor chrome drawn above the document in screen space. Quad
/// transforms are in document space, so the view is applied here.
pub fn paint_overlay(backend: &mut dyn RendererBackend, quads: &[Quad], view: Affine) {
    backend.set_blend_mode(BlendMode::Normal);
    for quad in quads {
        backend.draw_quad(&Quad {
            transform: view * quad.transform,
            ..*quad
        });
    }
}

fn paint_node(backend: &mut dyn RendererBackend, node: &SceneNode, cx: &PaintContext, world: Affine, opacity: f32) {
    let transform = cx.view * world;
    let scale = device_scale(transform);
    let effects: Vec<&Effect> = node.effects.iter().filter(|e| e.is_enabled()).collect();

    let layer_blur = effects.iter().find_map(|e| match e {
        Effect::LayerBlur { radius, .. } if *radius > 0.0 => Some(*radius),
        _ => None,
    });
    if let Some(radius) = layer_blur {
        backend.push_group(GroupStyle {
            blur: radius * scale,
            ..GroupStyle::default()
        });
    }

    for effect in &effects {
        match **effect {
            Effect::DropShadow {
                offset_x,
                offset_y,
                blur,
                spread,
                color,
                ..
            } => {
                let shadow = cx.view * Affine::translate((offset_x, offset_y)) * world;
                let color = color.with_alpha(color.a * opacity);
                let outline = spread_silhouette(&node.kind, spread);
                backend.fill_blurred(&outline, shadow, color, Fill::NonZero, blur * scale);
            }
            Effect::BackgroundBlur { radius, .. } => {
                backend.blur_backdrop(&silhouette(&node.kind), transform, radius * scale);
            }
            Effect::InnerShadow { .. } | Effect::LayerBlur { .. } => {}
        }
    }

    paint_body(backend, node, cx, transform, opacity);

    for effect in &effects {
        if let Effect::InnerShadow {
            offset_x,
            offset_y,
            blur,
            color,
            ..
        } = **effect
        {
            let color = color.with_alpha(color.a * opacity);
            paint_inner_shadow(backend, &node.kind, transform, (offset_x, offset_y), blur, color);
        }
    }

    if layer_blur.is_some() {
        backend.pop_group();
    }
}

fn paint_body(backend: &mut dyn RendererBackend, node: &SceneNode, cx: &PaintContext, transform: Affine, opacity: f32) {
    match &node.kind {
        NodeKind::Shape(props) => paint_shape(backend, props, transform, opacity),

        NodeKind::Image(img) => {
            let quad = Quad::new(transform, img.width, img.height, IMAGE_PLACEHOLDER);
            match cx.textures.get(&img.src) {
                Some(&texture) => backend.draw_textured_quad(&quad, texture, opacity),
                None => backend.draw_quad(&Quad {
                    color: IMAGE_PLACEHOLDER.with_alpha(IMAGE_PLACEHOLDER.a * opacity),
                    ..quad
                }),
            }
        }

        NodeKind::Text(text) => paint_text(backend, text, transform, opacity),

        NodeKind::Artboard(board) => {
            if let Some(bg) = board.background {
                backend.draw_quad(&Quad::new(
                    transform,
                    board.width,
                    board.height,
                    bg.with_alpha(bg.a * opacity),
                ));
            }
        }

        NodeKind::Group(_) | NodeKind::Component(_) => {}
    }
}

/// Shadow cast inward from the edges, offset by `offset` in local units.
fn paint_inner_shadow(
    backend: &mut dyn RendererBackend,
    kind: &NodeKind,
    transform: Affine,
    offset: (f64, f64),
    blur: f64,
    color: Color,
) {
    let outline = silhouette(kind);
    let mut clip = outline.clone();
    clip.apply_affine(transform);
    backend.push_group(GroupStyle::clipped(clip));

    // Frame around the offset outline; even-odd leaves the shape as a hole.
    let margin = offset.0.abs().max(offset.1.abs()) + blur * 2.0 + 1.0;
    let mut ring = outline.bounding_box().inflate(margin, margin).to_path(SHAPE_TOLERANCE);
    ring.extend(outline);
    let shifted = transform * Affine::translate(offset);
    backend.fill_blurred(&ring, shifted, color, Fill::EvenOdd, blur * device_scale(transform));
    backend.pop_group();
}

/// One bar per line: estimated advance wide, x-height tall.
fn paint_text(backend: &mut dyn RendererBackend, text: &TextProps, transform: Affine, opacity: f32) {
    let color = text.fill.as_ref().map_or(Color::BLACK.with_alpha(opacity), |p| paint_color(p, opacity));
    let size = text.font.size;
    let (box_width, _) = text.measure();
    let line_height = size * text.line_height;
    for (i, line) in text.content.split('\n').enumerate() {
        let advance = (line.chars().count() as f64 * size * TEXT_ADVANCE).min(box_width);
        if advance <= 0.0 {
            continue;
        }
        let x = match text.align {
            TextAlign::Left => 0.0,
            TextAlign::Center => (box_width - advance) / 2.0,
            TextAlign::Right => box_width - advance,
        };
        let y = i as f64 * line_height + (line_height - size * TEXT_BAR) / 2.0;
        backend.draw_quad(&Quad::new(
            transform * Affine::translate((x, y)),
            advance,
            size * TEXT_BAR,
            color,
        ));
    }
}

// ─── Shape painters ──────────────────────────────────────────────────────

fn paint_shape(backend: &mut dyn RendererBackend, props: &ShapeProps, transform: Affine, opacity: f32) {
    if let ShapeGeometry::Rect {
        width,
        height,
        corner_radius,
    } = props.geometry
        && corner_radius <= 0.0
        && props.stroke.is_none()
    {
        if let Some(paint) = &props.fill {
            backend.draw_quad(&Quad::new(transform, width, height, paint_color(paint, opacity)));
        }
        return;
    }

    let path = geometry_path(&props.geometry);
    if let Some(paint) = &props.fill {
        backend.fill_path(&path, transform, paint_color(paint, opacity), Fill::NonZero);
    }
    if let Some(stroke) = &props.stroke
        && stroke.width > 0.0
    {
        backend.stroke_path(&path, transform, &to_kurbo_stroke(stroke), paint_color(&stroke.paint, opacity));
    }
}

/// Local-space outline of a shape geometry.
pub fn geometry_path(geometry: &ShapeGeometry) -> BezPath {
    match geometry {
        ShapeGeometry::Rect {
            width,
            height,
            corner_radius,
        } => RoundedRect::from_rect(Rect::new(0.0, 0.0, *width, *height), *corner_radius)
            .to_path(SHAPE_TOLERANCE),
        ShapeGeometry::Ellipse { width, height } => {
            KurboEllipse::new((width / 2.0, height / 2.0), (width / 2.0, height / 2.0), 0.0)
                .to_path(SHAPE_TOLERANCE)
        }
        ShapeGeometry::Polygon { points } => {
            let mut bez = BezPath::new();
            for (i, &p) in points.iter().enumerate() {
                if i == 0 {
                    bez.move_to(p);
                } else {
                    bez.line_to(p);
                }
            }
            if !points.is_empty() {
                bez.close_path();
            }
            bez
        }
        ShapeGeometry::Line { x1, y1, x2, y2 } => {
            let mut bez = BezPath::new();
            bez.move_to((*x1, *y1));
            bez.line_to((*x2, *y2));
            bez
        }
        ShapeGeometry::Path { commands } => {
            let mut bez = BezPath::new();
            for cmd in commands {
                match *cmd {
                    PathCmd::MoveTo(x, y) => bez.move_to((x, y)),
                    PathCmd::LineTo(x, y) => bez.line_to((x, y)),
                    PathCmd::QuadTo(cx, cy, ex, ey) => bez.quad_to((cx, cy), (ex, ey)),
                    PathCmd::CubicTo(c1x, c1y, c2x, c2y, ex, ey) => {
                        bez.curve_to((c1x, c1y), (c2x, c2y), (ex, ey))
                    }
                    PathCmd::Close => bez.close_path(),
                }
            }
            bez
        }
    }
}

/// Outline used for shadows and masks: the shape itself, or the layout box.
fn silhouette(kind: &NodeKind) -> BezPath {
    match kind {
        NodeKind::Shape(props) => geometry_path(&props.geometry),
        other => other.local_bounds().to_kurbo_rect().to_path(SHAPE_TOLERANCE),
    }
}

/// Silhouette grown (or shrunk) by `spread` on every side.
fn spread_silhouette(kind: &NodeKind, spread: f64) -> BezPath {
    if spread == 0.0 {
        return silhouette(kind);
    }
    let geometry = match kind {
        NodeKind::Shape(props) => Some(&props.geometry),
        _ => None,
    };
    match geometry {
        Some(ShapeGeometry::Rect {
            width,
            height,
            corner_radius,
        }) => RoundedRect::from_rect(
            Rect::new(0.0, 0.0, *width, *height).inflate(spread, spread),
            (corner_radius + spread).max(0.0),
        )
        .to_path(SHAPE_TOLERANCE),
        Some(ShapeGeometry::Ellipse { width, height }) => KurboEllipse::new(
            (width / 2.0, height / 2.0),
            ((width / 2.0 + spread).max(0.0), (height / 2.0 + spread).max(0.0)),
            0.0,
        )
        .to_path(SHAPE_TOLERANCE),
        Some(_) if spread > 0.0 => {
            let mut outline = silhouette(kind);
            let stroke = KurboStroke::new(spread * 2.0).with_join(Join::Round);
            let grown = kurbo::stroke(outline.iter(), &stroke, &StrokeOpts::default(), SHAPE_TOLERANCE);
            outline.extend(grown);
            outline
        }
        Some(_) => silhouette(kind),
        None => kind
            .local_bounds()
            .to_kurbo_rect()
            .inflate(spread, spread)
            .to_path(SHAPE_TOLERANCE),
    }
}

/// Uniform scale factor of `t`, for turning local blur radii into pixels.
fn device_scale(t: Affine) -> f64 {
    t.determinant().abs().sqrt()
}

// ─── Helpers ─────────────────────────────────────────────────────────────

pub fn to_kurbo_stroke(stroke: &Stroke) -> KurboStroke {
    KurboStroke {
        width: stroke.width,
        join: match stroke.join {
            StrokeJoin::Miter => Join::Miter,
            StrokeJoin::Round => Join::Round,
            StrokeJoin::Bevel => Join::Bevel,
        },
        start_cap: map_cap(stroke.cap),
        end_cap: map_cap(stroke.cap),
        ..Default::default()
    }
}

fn map_cap(cap: StrokeCap) -> Cap {
    match cap {
        StrokeCap::Butt => Cap::Butt,
        StrokeCap::Round => Cap::Round,
        StrokeCap::Square => Cap::Square,
    }
}

/// Flat color for a paint. Gradients use their first stop.
fn paint_color(paint: &Paint, opacity: f32) -> Color {
    let base = paint.base_color();
    base.with_alpha(base.a * opacity.clamp(0.0, 1.0))
}

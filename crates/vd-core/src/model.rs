//! Document data model: paints, strokes, fonts, path data and node kinds.
//!
//! A node's kind is a closed sum type. Each variant carries only the
//! properties that kind needs, so bounds, complexity weighting and
//! serialization all match on it exhaustively.

use crate::aabb::Aabb;
use crate::id::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ─── Colors & Paint ──────────────────────────────────────────────────────

/// RGBA color. Stored as 4 × f32 [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// Helper to parse a single hex digit.
pub fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Color {
    pub const BLACK: Self = Self::rgba(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::rgba(1.0, 1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#RGB`, `#RRGGBB` or `#RRGGBBAA`. The `#` is optional.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let bytes = hex.as_bytes();
        let pair = |i: usize| -> Option<f32> {
            Some((hex_val(bytes[i])? << 4 | hex_val(bytes[i + 1])?) as f32 / 255.0)
        };

        match bytes.len() {
            3 => {
                let r = hex_val(bytes[0])?;
                let g = hex_val(bytes[1])?;
                let b = hex_val(bytes[2])?;
                Some(Self::rgba(
                    (r * 17) as f32 / 255.0,
                    (g * 17) as f32 / 255.0,
                    (b * 17) as f32 / 255.0,
                    1.0,
                ))
            }
            6 => Some(Self::rgba(pair(0)?, pair(2)?, pair(4)?, 1.0)),
            8 => Some(Self::rgba(pair(0)?, pair(2)?, pair(4)?, pair(6)?)),
            _ => None,
        }
    }

    /// `#RRGGBB`, or `#RRGGBBAA` when not fully opaque.
    pub fn to_hex(&self) -> String {
        let [r, g, b, a] = self.to_rgba8();
        if a == 255 {
            format!("#{r:02X}{g:02X}{b:02X}")
        } else {
            format!("#{r:02X}{g:02X}{b:02X}{a:02X}")
        }
    }

    pub fn to_rgba8(&self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }
}

/// A gradient stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    pub offset: f32, // 0.0 .. 1.0
    pub color: Color,
}

/// Fill or stroke paint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Paint {
    Solid { color: Color },
    LinearGradient {
        angle: f32, // degrees
        stops: Vec<GradientStop>,
    },
    RadialGradient { stops: Vec<GradientStop> },
}

impl Paint {
    pub fn solid(color: Color) -> Self {
        Self::Solid { color }
    }

    /// Representative flat color (first stop for gradients).
    pub fn base_color(&self) -> Color {
        match self {
            Self::Solid { color } => *color,
            Self::LinearGradient { stops, .. } | Self::RadialGradient { stops } => {
                stops.first().map(|s| s.color).unwrap_or(Color::BLACK)
            }
        }
    }
}

// ─── Stroke ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub paint: Paint,
    pub width: f64,
    pub cap: StrokeCap,
    pub join: StrokeJoin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrokeCap {
    Butt,
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrokeJoin {
    Miter,
    Round,
    Bevel,
}

impl Default for Stroke {
    fn default() -> Self {
        Self {
            paint: Paint::solid(Color::BLACK),
            width: 1.0,
            cap: StrokeCap::Butt,
            join: StrokeJoin::Miter,
        }
    }
}

// ─── Blending ────────────────────────────────────────────────────────────

/// Compositing mode for nodes and layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
}

// ─── Font / Text ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    pub family: String,
    pub weight: u16, // 100..900
    pub size: f64,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: "Inter".into(),
            weight: 400,
            size: 14.0,
        }
    }
}

/// Horizontal text alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

// ─── Path data ───────────────────────────────────────────────────────────

/// A single path command (SVG-like but simplified).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PathCmd {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    QuadTo(f64, f64, f64, f64),            // control, end
    CubicTo(f64, f64, f64, f64, f64, f64), // c1, c2, end
    Close,
}

impl PathCmd {
    /// Every coordinate the command mentions, control points included.
    fn points(&self) -> impl Iterator<Item = (f64, f64)> {
        let pts: [Option<(f64, f64)>; 3] = match *self {
            Self::MoveTo(x, y) | Self::LineTo(x, y) => [Some((x, y)), None, None],
            Self::QuadTo(cx, cy, x, y) => [Some((cx, cy)), Some((x, y)), None],
            Self::CubicTo(c1x, c1y, c2x, c2y, x, y) => {
                [Some((c1x, c1y)), Some((c2x, c2y)), Some((x, y))]
            }
            Self::Close => [None, None, None],
        };
        pts.into_iter().flatten()
    }
}

// ─── Node kinds ──────────────────────────────────────────────────────────

/// Vector geometry of a shape node, in local coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapeGeometry {
    Rect {
        width: f64,
        height: f64,
        #[serde(default)]
        corner_radius: f64,
    },
    Ellipse { width: f64, height: f64 },
    Polygon { points: Vec<(f64, f64)> },
    Line { x1: f64, y1: f64, x2: f64, y2: f64 },
    Path { commands: Vec<PathCmd> },
}

/// Segments used when an ellipse is flattened for rendering and complexity.
pub const ELLIPSE_SEGMENTS: usize = 32;

impl ShapeGeometry {
    pub fn bounds(&self) -> Aabb {
        match self {
            Self::Rect { width, height, .. } | Self::Ellipse { width, height } => {
                Aabb::new(0.0, 0.0, *width, *height)
            }
            Self::Polygon { points } => Aabb::from_points(points),
            Self::Line { x1, y1, x2, y2 } => Aabb::from_points(&[(*x1, *y1), (*x2, *y2)]),
            Self::Path { commands } => {
                let pts: Vec<(f64, f64)> = commands.iter().flat_map(PathCmd::points).collect();
                Aabb::from_points(&pts)
            }
        }
    }

    pub fn vertex_count(&self) -> usize {
        match self {
            Self::Rect { .. } => 4,
            Self::Ellipse { .. } => ELLIPSE_SEGMENTS,
            Self::Polygon { points } => points.len(),
            Self::Line { .. } => 2,
            Self::Path { commands } => commands.iter().map(|c| c.points().count()).sum(),
        }
    }

    /// Resize to a `width × height` box, keeping the geometry's kind.
    pub fn resize(&mut self, new_width: f64, new_height: f64) {
        let old = self.bounds();
        let sx = if old.width.abs() > f64::EPSILON { new_width / old.width } else { 1.0 };
        let sy = if old.height.abs() > f64::EPSILON { new_height / old.height } else { 1.0 };
        let map = |x: f64, y: f64| (old.x + (x - old.x) * sx, old.y + (y - old.y) * sy);
        match self {
            Self::Rect { width, height, .. } | Self::Ellipse { width, height } => {
                *width = new_width;
                *height = new_height;
            }
            Self::Polygon { points } => {
                for p in points.iter_mut() {
                    *p = map(p.0, p.1);
                }
            }
            Self::Line { x1, y1, x2, y2 } => {
                (*x1, *y1) = map(*x1, *y1);
                (*x2, *y2) = map(*x2, *y2);
            }
            Self::Path { commands } => {
                for cmd in commands.iter_mut() {
                    *cmd = match *cmd {
                        PathCmd::MoveTo(x, y) => {
                            let (x, y) = map(x, y);
                            PathCmd::MoveTo(x, y)
                        }
                        PathCmd::LineTo(x, y) => {
                            let (x, y) = map(x, y);
                            PathCmd::LineTo(x, y)
                        }
                        PathCmd::QuadTo(cx, cy, x, y) => {
                            let (cx, cy) = map(cx, cy);
                            let (x, y) = map(x, y);
                            PathCmd::QuadTo(cx, cy, x, y)
                        }
                        PathCmd::CubicTo(ax, ay, bx, by, x, y) => {
                            let (ax, ay) = map(ax, ay);
                            let (bx, by) = map(bx, by);
                            let (x, y) = map(x, y);
                            PathCmd::CubicTo(ax, ay, bx, by, x, y)
                        }
                        PathCmd::Close => PathCmd::Close,
                    };
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeProps {
    pub geometry: ShapeGeometry,
    #[serde(default)]
    pub fill: Option<Paint>,
    #[serde(default)]
    pub stroke: Option<Stroke>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageProps {
    pub src: String,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub natural_width: Option<u32>,
    #[serde(default)]
    pub natural_height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextProps {
    pub content: String,
    #[serde(default)]
    pub font: FontSpec,
    #[serde(default)]
    pub align: TextAlign,
    /// Fixed box width; `None` means auto-width.
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default = "default_line_height")]
    pub line_height: f64,
    #[serde(default)]
    pub fill: Option<Paint>,
}

fn default_line_height() -> f64 {
    1.2
}

/// Average glyph advance as a fraction of the font size.
const GLYPH_ADVANCE: f64 = 0.6;

impl TextProps {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            font: FontSpec::default(),
            align: TextAlign::default(),
            width: None,
            line_height: default_line_height(),
            fill: None,
        }
    }

    /// Estimated layout box. Real shaping happens in the renderer.
    pub fn measure(&self) -> (f64, f64) {
        let lines: Vec<&str> = self.content.split('\n').collect();
        let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let width = self
            .width
            .unwrap_or(longest as f64 * self.font.size * GLYPH_ADVANCE);
        let height = lines.len() as f64 * self.font.size * self.line_height;
        (width, height)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupProps {
    #[serde(default)]
    pub clip: bool,
    /// Composite children in their own layer before blending.
    #[serde(default)]
    pub isolate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtboardProps {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub background: Option<Color>,
    #[serde(default = "default_true")]
    pub clip_content: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentProps {
    /// The master this instance follows; `None` for a master itself.
    #[serde(default)]
    pub master: Option<NodeId>,
    #[serde(default)]
    pub overrides: BTreeMap<String, serde_json::Value>,
    pub width: f64,
    pub height: f64,
}

/// The node kinds in the scene.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Shape(ShapeProps),
    Image(ImageProps),
    Text(TextProps),
    Group(GroupProps),
    Artboard(ArtboardProps),
    Component(ComponentProps),
}

/// Payload-free discriminant of [`NodeKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindTag {
    Shape,
    Image,
    Text,
    Group,
    Artboard,
    Component,
}

impl KindTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shape => "shape",
            Self::Image => "image",
            Self::Text => "text",
            Self::Group => "group",
            Self::Artboard => "artboard",
            Self::Component => "component",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "shape" => Self::Shape,
            "image" => Self::Image,
            "text" => Self::Text,
            "group" => Self::Group,
            "artboard" => Self::Artboard,
            "component" => Self::Component,
            _ => return None,
        })
    }
}

impl NodeKind {
    pub fn rect(width: f64, height: f64) -> Self {
        Self::Shape(ShapeProps {
            geometry: ShapeGeometry::Rect {
                width,
                height,
                corner_radius: 0.0,
            },
            fill: None,
            stroke: None,
        })
    }

    pub fn ellipse(width: f64, height: f64) -> Self {
        Self::Shape(ShapeProps {
            geometry: ShapeGeometry::Ellipse { width, height },
            fill: None,
            stroke: None,
        })
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(TextProps::new(content))
    }

    pub fn group() -> Self {
        Self::Group(GroupProps::default())
    }

    pub fn artboard(width: f64, height: f64) -> Self {
        Self::Artboard(ArtboardProps {
            width,
            height,
            background: Some(Color::WHITE),
            clip_content: true,
        })
    }

    pub fn tag(&self) -> KindTag {
        match self {
            Self::Shape(_) => KindTag::Shape,
            Self::Image(_) => KindTag::Image,
            Self::Text(_) => KindTag::Text,
            Self::Group(_) => KindTag::Group,
            Self::Artboard(_) => KindTag::Artboard,
            Self::Component(_) => KindTag::Component,
        }
    }

    /// Kind-specific geometry in local space, before effects.
    /// Groups have no geometry of their own.
    pub fn local_bounds(&self) -> Aabb {
        match self {
            Self::Shape(props) => {
                let bounds = props.geometry.bounds();
                match &props.stroke {
                    Some(stroke) if stroke.width > 0.0 => bounds.expand(stroke.width / 2.0),
                    _ => bounds,
                }
            }
            Self::Image(img) => Aabb::new(0.0, 0.0, img.width, img.height),
            Self::Text(text) => {
                let (w, h) = text.measure();
                Aabb::new(0.0, 0.0, w, h)
            }
            Self::Group(_) => Aabb::EMPTY,
            Self::Artboard(board) => Aabb::new(0.0, 0.0, board.width, board.height),
            Self::Component(comp) => Aabb::new(0.0, 0.0, comp.width, comp.height),
        }
    }

    /// Complexity contribution excluding the per-node base and child counts.
    pub fn complexity_weight(&self) -> f64 {
        match self {
            Self::Shape(props) => props.geometry.vertex_count() as f64 * 0.1,
            Self::Image(img) => img.width.abs() * img.height.abs() * 0.0001,
            Self::Text(text) => text.content.chars().count() as f64 * 0.5,
            Self::Group(_) | Self::Artboard(_) | Self::Component(_) => 0.0,
        }
    }

    pub fn fill(&self) -> Option<&Paint> {
        match self {
            Self::Shape(props) => props.fill.as_ref(),
            Self::Text(text) => text.fill.as_ref(),
            _ => None,
        }
    }

    pub fn stroke(&self) -> Option<&Stroke> {
        match self {
            Self::Shape(props) => props.stroke.as_ref(),
            _ => None,
        }
    }

    /// Resize the kind's intrinsic box. Groups and text without a fixed
    /// width ignore the request for the dimension they size automatically.
    pub fn resize(&mut self, width: f64, height: f64) {
        match self {
            Self::Shape(props) => props.geometry.resize(width, height),
            Self::Image(img) => {
                img.width = width;
                img.height = height;
            }
            Self::Text(text) => text.width = Some(width),
            Self::Group(_) => {}
            Self::Artboard(board) => {
                board.width = width;
                board.height = height;
            }
            Self::Component(comp) => {
                comp.width = width;
                comp.height = height;
            }
        }
    }

    /// Split into the serialized `(kind, properties)` pair.
    pub fn to_parts(&self) -> Result<(KindTag, serde_json::Value), serde_json::Error> {
        let props = match self {
            Self::Shape(p) => serde_json::to_value(p)?,
            Self::Image(p) => serde_json::to_value(p)?,
            Self::Text(p) => serde_json::to_value(p)?,
            Self::Group(p) => serde_json::to_value(p)?,
            Self::Artboard(p) => serde_json::to_value(p)?,
            Self::Component(p) => serde_json::to_value(p)?,
        };
        Ok((self.tag(), props))
    }

    /// Rebuild from a serialized `(kind, properties)` pair.
    pub fn from_parts(tag: KindTag, props: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(match tag {
            KindTag::Shape => Self::Shape(serde_json::from_value(props)?),
            KindTag::Image => Self::Image(serde_json::from_value(props)?),
            KindTag::Text => Self::Text(serde_json::from_value(props)?),
            KindTag::Group => Self::Group(serde_json::from_value(props)?),
            KindTag::Artboard => Self::Artboard(serde_json::from_value(props)?),
            KindTag::Component => Self::Component(serde_json::from_value(props)?),
        })
    }
}

//! 2D affine transforms.
//!
//! A `Transform` is the 2×3 matrix
//!
//! ```text
//! | a c e |
//! | b d f |
//! | 0 0 1 |
//! ```
//!
//! Points are column vectors, so `t.transform_point(p) = (a·x + c·y + e, b·x + d·y + f)`.
//! Mutating builders (`translate`, `scale`, `rotate`, `skew`) right-multiply,
//! which applies the new operation in the transform's current local frame.

use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// Result of [`Transform::decompose`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decomposed {
    pub x: f64,
    pub y: f64,
    /// Radians.
    pub rotation: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    /// Radians.
    pub skew_x: f64,
    /// Radians.
    pub skew_y: f64,
}

/// 2D affine transform. Cloning carries the decomposition cache along.
#[derive(Clone)]
pub struct Transform {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
    decomposed: Cell<Option<Decomposed>>,
}

impl Transform {
    pub const fn from_components(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self {
            a,
            b,
            c,
            d,
            e,
            f,
            decomposed: Cell::new(None),
        }
    }

    pub const fn identity() -> Self {
        Self::from_components(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    pub const fn from_translation(dx: f64, dy: f64) -> Self {
        Self::from_components(1.0, 0.0, 0.0, 1.0, dx, dy)
    }

    pub const fn from_scale(sx: f64, sy: f64) -> Self {
        Self::from_components(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    pub fn from_rotation(radians: f64) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self::from_components(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// Translation part `(e, f)`.
    pub fn translation(&self) -> (f64, f64) {
        (self.e, self.f)
    }

    /// The six components in `[a, b, c, d, e, f]` order.
    pub fn components(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    pub fn is_identity(&self) -> bool {
        self.components() == [1.0, 0.0, 0.0, 1.0, 0.0, 0.0]
    }

    pub fn set(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> &mut Self {
        *self = Self::from_components(a, b, c, d, e, f);
        self
    }

    pub fn reset(&mut self) -> &mut Self {
        *self = Self::identity();
        self
    }

    pub fn translate(&mut self, dx: f64, dy: f64) -> &mut Self {
        self.multiply(&Self::from_translation(dx, dy))
    }

    pub fn scale(&mut self, sx: f64, sy: f64) -> &mut Self {
        self.multiply(&Self::from_scale(sx, sy))
    }

    /// Rotate in the current local frame (right-multiply).
    pub fn rotate(&mut self, radians: f64) -> &mut Self {
        self.multiply(&Self::from_rotation(radians))
    }

    /// Skew by the given angles (radians) in the current local frame.
    pub fn skew(&mut self, skew_x: f64, skew_y: f64) -> &mut Self {
        let skew = Self::from_components(1.0, skew_y.tan(), skew_x.tan(), 1.0, 0.0, 0.0);
        self.multiply(&skew)
    }

    /// `self = self · other`: `other` is applied in the space produced by `self`.
    pub fn multiply(&mut self, other: &Self) -> &mut Self {
        *self = self.then_local(other);
        self
    }

    /// `self = other · self`: `other` is applied on top of `self`, in parent space.
    pub fn pre_multiply(&mut self, other: &Self) -> &mut Self {
        *self = other.then_local(self);
        self
    }

    /// Non-mutating `self · other`.
    pub fn then_local(&self, other: &Self) -> Self {
        Self::from_components(
            self.a * other.a + self.c * other.b,
            self.b * other.a + self.d * other.b,
            self.a * other.c + self.c * other.d,
            self.b * other.c + self.d * other.d,
            self.a * other.e + self.c * other.f + self.e,
            self.b * other.e + self.d * other.f + self.f,
        )
    }

    /// Inverse matrix. A singular matrix (determinant 0) inverts to identity.
    pub fn invert(&self) -> Self {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            log::trace!("invert: singular transform {:?}, using identity", self.components());
            return Self::identity();
        }
        let inv = 1.0 / det;
        Self::from_components(
            self.d * inv,
            -self.b * inv,
            -self.c * inv,
            self.a * inv,
            (self.c * self.f - self.d * self.e) * inv,
            (self.b * self.e - self.a * self.f) * inv,
        )
    }

    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Map a direction vector (ignores translation).
    pub fn transform_vector(&self, x: f64, y: f64) -> (f64, f64) {
        (self.a * x + self.c * y, self.b * x + self.d * y)
    }

    /// QR-style decomposition into translation, rotation, scale and skew.
    ///
    /// Memoized until the next mutation.
    pub fn decompose(&self) -> Decomposed {
        if let Some(cached) = self.decomposed.get() {
            return cached;
        }
        let [a, b, c, d, e, f] = self.components();
        let det = a * d - b * c;
        let mut out = Decomposed {
            x: e,
            y: f,
            rotation: 0.0,
            scale_x: 0.0,
            scale_y: 0.0,
            skew_x: 0.0,
            skew_y: 0.0,
        };
        if a != 0.0 || b != 0.0 {
            let r = a.hypot(b);
            out.rotation = if b > 0.0 { (a / r).acos() } else { -(a / r).acos() };
            out.scale_x = r;
            out.scale_y = det / r;
            out.skew_x = ((a * c + b * d) / (r * r)).atan();
        } else if c != 0.0 || d != 0.0 {
            let s = c.hypot(d);
            out.rotation = std::f64::consts::FRAC_PI_2
                - if d > 0.0 { (-c / s).acos() } else { -(c / s).acos() };
            out.scale_x = det / s;
            out.scale_y = s;
            out.skew_y = ((a * c + b * d) / (s * s)).atan();
        }
        self.decomposed.set(Some(out));
        out
    }

    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.components()
            .iter()
            .zip(other.components())
            .all(|(l, r)| (l - r).abs() <= epsilon)
    }

    pub fn to_affine(&self) -> kurbo::Affine {
        kurbo::Affine::new(self.components())
    }

    pub fn from_affine(affine: kurbo::Affine) -> Self {
        let [a, b, c, d, e, f] = affine.as_coeffs();
        Self::from_components(a, b, c, d, e, f)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        self.components() == other.components()
    }
}

impl std::fmt::Debug for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transform")
            .field("a", &self.a)
            .field("b", &self.b)
            .field("c", &self.c)
            .field("d", &self.d)
            .field("e", &self.e)
            .field("f", &self.f)
            .finish_non_exhaustive()
    }
}

/// Serialized shape: `{a, b, c, d, e, f}`.
#[derive(Serialize, Deserialize)]
struct TransformRepr {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl Serialize for Transform {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TransformRepr {
            a: self.a,
            b: self.b,
            c: self.c,
            d: self.d,
            e: self.e,
            f: self.f,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Transform {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let r = TransformRepr::deserialize(deserializer)?;
        Ok(Self::from_components(r.a, r.b, r.c, r.d, r.e, r.f))
    }
}

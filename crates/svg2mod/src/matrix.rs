//! 2D affine transforms.
//!
//! A [`Matrix`] stores `[a, b, c, d, e, f]`, the SVG convention for
//!
//! ```text
//! | a c e |
//! | b d f |
//! | 0 0 1 |
//! ```
//!
//! Composition is plain matrix multiplication. A node's effective matrix is
//! `parent * local`, so the local transform is applied to a point first.

use std::ops::Mul;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::geometry::Point;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Matrix::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Matrix::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Rotation by `angle` radians.
    pub fn rotate(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Matrix::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// `parent * local`: the transform that applies `local` first, then `parent`.
    pub fn compose(parent: &Matrix, local: &Matrix) -> Matrix {
        let m = parent;
        let n = local;
        Matrix::new(
            m.a * n.a + m.c * n.b,
            m.b * n.a + m.d * n.b,
            m.a * n.c + m.c * n.d,
            m.b * n.c + m.d * n.d,
            m.a * n.e + m.c * n.f + m.e,
            m.b * n.e + m.d * n.f + m.f,
        )
    }

    #[inline]
    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }

    pub fn is_identity(&self) -> bool {
        *self == Matrix::IDENTITY
    }

    /// Horizontal scale, signed by `a` (positive when `a` is zero).
    pub fn x_scale(&self) -> f64 {
        let sign = if self.a < 0.0 { -1.0 } else { 1.0 };
        sign * (self.a * self.a + self.c * self.c).sqrt()
    }

    /// Vertical scale, signed by `d` (positive when `d` is zero).
    pub fn y_scale(&self) -> f64 {
        let sign = if self.d < 0.0 { -1.0 } else { 1.0 };
        sign * (self.b * self.b + self.d * self.d).sqrt()
    }

    /// Mean absolute scale, what a stroke width gets multiplied by.
    pub fn mean_scale(&self) -> f64 {
        (self.x_scale().abs() + self.y_scale().abs()) / 2.0
    }

    /// Rotation in radians. Falls back to the `b`/`d` column when `a` is
    /// zero, and to 0 when `a` and `d` are both zero.
    ///
    /// The exporter flattens arcs before transforming them, so it never
    /// needs this itself; it is here for callers that place rotated
    /// geometry of their own.
    pub fn rotation(&self) -> f64 {
        if self.a != 0.0 {
            (-self.c).atan2(self.a)
        } else if self.d != 0.0 {
            self.b.atan2(self.d)
        } else {
            0.0
        }
    }

    /// Parse an SVG `transform` attribute.
    ///
    /// Tokens are composed left to right, which is exactly what svgtypes
    /// does when folding a transform list into one matrix.
    pub fn parse(text: &str) -> Result<Matrix> {
        let ts = svgtypes::Transform::from_str(text)
            .map_err(|_| Error::attribute("transform", text))?;
        Ok(Matrix::new(ts.a, ts.b, ts.c, ts.d, ts.e, ts.f))
    }
}

impl Mul for Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Matrix) -> Matrix {
        Matrix::compose(&self, &rhs)
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! 2D affine matrices and their decomposition into animatable parts.
//!
//! `Matrix2D` is the 2×3 affine form used for every geometric computation in
//! the crate: composing an element's transform chain up to the root,
//! inverting a parent's chain to express a global box in local space, and
//! mapping points between elements.
//!
//! # Conventions
//!
//! ```text
//! | a  c  e |     x' = a·x + c·y + e
//! | b  d  f |     y' = b·x + d·y + f
//! | 0  0  1 |
//! ```
//!
//! `TransformParts` compose as `T(x, y) · R(rotation) · K(skew_x) · S(scale_x, scale_y)`
//! where `K(k) = [[1, -tan k], [0, 1]]`. Rotation turns +x toward +y; skew is
//! the angle the y axis leans counter-clockwise past perpendicular. Angles are
//! degrees. With these conventions the rotation-first QR decomposition
//!
//! ```text
//! rotation = atan2(b, a)
//! scale_x  = sqrt(a² + b²)
//! scale_y  = det / scale_x
//! skew_x   = atan2(d, c) - 90° - rotation
//! ```
//!
//! is the exact inverse of composition, including mirrored elements
//! (`scale_y < 0`).

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Magnitudes below this are treated as zero; determinants below it are singular.
pub const ZERO_EPSILON: f64 = 1e-6;

/// A 2D affine transformation matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix2D {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Matrix2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix2D {
    pub const IDENTITY: Matrix2D = Matrix2D {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(x: f64, y: f64) -> Self {
        Self {
            e: x,
            f: y,
            ..Self::IDENTITY
        }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            a: sx,
            d: sy,
            ..Self::IDENTITY
        }
    }

    pub fn rotate_deg(angle: f64) -> Self {
        let (sin, cos) = angle.to_radians().sin_cos();
        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            ..Self::IDENTITY
        }
    }

    /// Skew of the y axis by `angle` degrees (see module docs for the sign).
    pub fn skew_deg(angle: f64) -> Self {
        Self {
            c: -angle.to_radians().tan(),
            ..Self::IDENTITY
        }
    }

    /// Compose this transform with another (`self · other`).
    ///
    /// The result applies `other` first, then `self`.
    pub fn then(&self, other: &Self) -> Self {
        Self {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    /// Express `child` (a transform in `parent`'s local space) in the space `parent` maps into.
    pub fn compose(parent: &Self, child: &Self) -> Self {
        parent.then(child)
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    pub fn is_invertible(&self) -> bool {
        self.determinant().abs() > ZERO_EPSILON
    }

    /// Compute the inverse transform.
    ///
    /// Returns `None` when the determinant is within `ZERO_EPSILON` of zero.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() <= ZERO_EPSILON {
            return None;
        }
        Some(self.inverse_with_det(det))
    }

    /// Inverse with the determinant clamped away from zero.
    ///
    /// Used while animating, where a collapsed ancestor must not turn every
    /// downstream value into NaN.
    pub fn inverse_clamped(&self) -> Self {
        let det = self.determinant();
        if det.abs() > ZERO_EPSILON {
            return self.inverse_with_det(det);
        }
        let det = if det.is_sign_negative() {
            -ZERO_EPSILON
        } else {
            ZERO_EPSILON
        };
        self.inverse_with_det(det)
    }

    fn inverse_with_det(&self, det: f64) -> Self {
        let inv = 1.0 / det;
        Self {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            e: (self.c * self.f - self.d * self.e) * inv,
            f: (self.b * self.e - self.a * self.f) * inv,
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }

    /// Apply the linear part only (ignores translation).
    pub fn apply_vector(&self, x: f64, y: f64) -> (f64, f64) {
        (self.a * x + self.c * y, self.b * x + self.d * y)
    }

    /// The same matrix with its translation removed.
    pub fn linear(&self) -> Self {
        Self {
            e: 0.0,
            f: 0.0,
            ..*self
        }
    }

    /// Rotation-first QR decomposition.
    ///
    /// Magnitudes below `ZERO_EPSILON` decompose to zero instead of NaN: a
    /// collapsed x axis reports zero rotation and skew.
    pub fn decompose(&self) -> TransformParts {
        let mut parts = TransformParts {
            x: self.e,
            y: self.f,
            ..TransformParts::IDENTITY
        };

        let scale_x = (self.a * self.a + self.b * self.b).sqrt();
        if scale_x < ZERO_EPSILON {
            parts.scale_x = 0.0;
            parts.scale_y = clamp_zero((self.c * self.c + self.d * self.d).sqrt());
            return parts;
        }
        parts.scale_x = scale_x;
        parts.rotation = clamp_zero(self.b.atan2(self.a).to_degrees());

        let scale_y = clamp_zero(self.determinant() / scale_x);
        parts.scale_y = scale_y;
        if scale_y != 0.0 {
            // A mirrored y axis points the second column the other way round.
            let sign = scale_y.signum();
            let column = (self.d * sign).atan2(self.c * sign).to_degrees();
            parts.skew_x = clamp_zero(normalize_angle(column - 90.0 - parts.rotation));
        }
        parts
    }

    /// Decompose a matrix whose linear part is applied about `(ox, oy)`.
    ///
    /// Inverse of [`TransformParts::about_origin`].
    pub fn decompose_about(&self, ox: f64, oy: f64) -> TransformParts {
        let mut parts = self.linear().decompose();
        let (lx, ly) = self.apply_vector(ox, oy);
        parts.x = clamp_zero(self.e - ox + lx);
        parts.y = clamp_zero(self.f - oy + ly);
        parts
    }

    pub fn is_identity(&self, epsilon: f64) -> bool {
        self.approx_eq(&Self::IDENTITY, epsilon)
    }

    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        (self.a - other.a).abs() < epsilon
            && (self.b - other.b).abs() < epsilon
            && (self.c - other.c).abs() < epsilon
            && (self.d - other.d).abs() < epsilon
            && (self.e - other.e).abs() < epsilon
            && (self.f - other.f).abs() < epsilon
    }
}

/// Decomposed element transform, the unit the animation tweens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformParts {
    pub x: f64,
    pub y: f64,
    /// Degrees.
    pub rotation: f64,
    /// Degrees.
    pub skew_x: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Default for TransformParts {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl TransformParts {
    pub const IDENTITY: TransformParts = TransformParts {
        x: 0.0,
        y: 0.0,
        rotation: 0.0,
        skew_x: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
    };

    pub fn translate(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::IDENTITY
        }
    }

    /// `T(x, y) · R · K · S`.
    pub fn to_matrix(&self) -> Matrix2D {
        Matrix2D::translate(self.x, self.y)
            .then(&Matrix2D::rotate_deg(self.rotation))
            .then(&Matrix2D::skew_deg(self.skew_x))
            .then(&Matrix2D::scale(self.scale_x, self.scale_y))
    }

    /// The transform applied about `(ox, oy)` instead of the local origin.
    pub fn about_origin(&self, ox: f64, oy: f64) -> Matrix2D {
        Matrix2D::translate(ox, oy)
            .then(&self.to_matrix())
            .then(&Matrix2D::translate(-ox, -oy))
    }

    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        (self.x - other.x).abs() < epsilon
            && (self.y - other.y).abs() < epsilon
            && normalize_angle(self.rotation - other.rotation).abs() < epsilon
            && normalize_angle(self.skew_x - other.skew_x).abs() < epsilon
            && (self.scale_x - other.scale_x).abs() < epsilon
            && (self.scale_y - other.scale_y).abs() < epsilon
    }
}

/// Normalize an angle in degrees to `(-180, 180]`.
pub fn normalize_angle(degrees: f64) -> f64 {
    let mut a = degrees % 360.0;
    if a > 180.0 {
        a -= 360.0;
    } else if a <= -180.0 {
        a += 360.0;
    }
    a
}

/// The angle equivalent to `to` that is at most 180° away from `from`.
pub fn shortest_angle(from: f64, to: f64) -> f64 {
    from + normalize_angle(to - from)
}

fn clamp_zero(v: f64) -> f64 {
    if v.abs() < ZERO_EPSILON { 0.0 } else { v }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_identity() {
        let m = Matrix2D::IDENTITY;
        assert!(m.is_identity(EPSILON));
        let p = m.apply(Point::new(100.0, 200.0));
        assert!(p.approx_eq(&Point::new(100.0, 200.0), EPSILON));
    }

    #[test]
    fn test_rotate_90_turns_x_toward_y() {
        let p = Matrix2D::rotate_deg(90.0).apply(Point::new(1.0, 0.0));
        assert!(p.approx_eq(&Point::new(0.0, 1.0), 1e-9));
    }

    #[test]
    fn test_composition_order() {
        let t = Matrix2D::translate(10.0, 20.0).then(&Matrix2D::scale(2.0, 2.0));
        assert!(t.apply(Point::ZERO).approx_eq(&Point::new(10.0, 20.0), EPSILON));

        let t2 = Matrix2D::scale(2.0, 2.0).then(&Matrix2D::translate(10.0, 20.0));
        assert!(t2.apply(Point::ZERO).approx_eq(&Point::new(20.0, 40.0), EPSILON));

        assert_eq!(Matrix2D::compose(&Matrix2D::scale(2.0, 2.0), &Matrix2D::translate(10.0, 20.0)), t2);
    }

    #[test]
    fn test_compose_is_associative() {
        let a = Matrix2D::rotate_deg(30.0);
        let b = Matrix2D::translate(5.0, -3.0);
        let c = Matrix2D::scale(2.0, 0.5);
        let left = a.then(&b).then(&c);
        let right = a.then(&b.then(&c));
        assert!(left.approx_eq(&right, EPSILON));
    }

    #[test]
    fn test_inverse() {
        let t = Matrix2D::translate(50.0, 100.0)
            .then(&Matrix2D::scale(2.0, 3.0))
            .then(&Matrix2D::rotate_deg(45.0));
        let inv = t.inverse().unwrap();
        assert!(t.then(&inv).is_identity(1e-10));
        assert!(inv.then(&t).is_identity(1e-10));
    }

    #[test]
    fn test_singular_inverse_is_none() {
        assert!(Matrix2D::scale(0.0, 1.0).inverse().is_none());
        assert!(!Matrix2D::scale(1e-9, 1.0).is_invertible());
    }

    #[test]
    fn test_inverse_clamped_stays_finite() {
        let inv = Matrix2D::scale(0.0, 0.0).inverse_clamped();
        for v in [inv.a, inv.b, inv.c, inv.d, inv.e, inv.f] {
            assert!(v.is_finite());
        }
    }

    #[test]
    fn test_skew_sign() {
        // The y axis leans counter-clockwise: (0, 1) moves toward -x.
        let p = Matrix2D::skew_deg(45.0).apply(Point::new(0.0, 1.0));
        assert!(p.approx_eq(&Point::new(-1.0, 1.0), 1e-9));
    }

    #[test]
    fn test_decompose_identity() {
        let parts = Matrix2D::IDENTITY.decompose();
        assert!(parts.approx_eq(&TransformParts::IDENTITY, EPSILON));
    }

    #[test]
    fn test_decompose_follows_qr_formulas() {
        let m = Matrix2D::new(1.2, 0.4, -0.7, 1.9, 3.0, 4.0);
        let parts = m.decompose();
        let rotation = 0.4f64.atan2(1.2).to_degrees();
        let scale_x = (1.2f64 * 1.2 + 0.4 * 0.4).sqrt();
        assert!(approx_eq(parts.rotation, rotation));
        assert!(approx_eq(parts.scale_x, scale_x));
        assert!(approx_eq(parts.scale_y, m.determinant() / scale_x));
        assert!(approx_eq(
            parts.skew_x,
            normalize_angle(1.9f64.atan2(-0.7).to_degrees() - 90.0 - rotation)
        ));
        assert!(approx_eq(parts.x, 3.0));
        assert!(approx_eq(parts.y, 4.0));
    }

    #[test]
    fn test_decompose_roundtrip() {
        let cases = [
            TransformParts {
                x: 50.0,
                y: 100.0,
                rotation: 30.0,
                skew_x: 0.0,
                scale_x: 2.0,
                scale_y: 1.5,
            },
            TransformParts {
                x: -4.0,
                y: 7.5,
                rotation: -120.0,
                skew_x: 15.0,
                scale_x: 0.5,
                scale_y: 3.0,
            },
            TransformParts {
                x: 0.0,
                y: 0.0,
                rotation: 30.0,
                skew_x: 10.0,
                scale_x: 2.0,
                scale_y: -3.0,
            },
        ];
        for parts in cases {
            let back = parts.to_matrix().decompose();
            assert!(back.approx_eq(&parts, 1e-6), "{parts:?} -> {back:?}");
        }
    }

    #[test]
    fn test_decompose_about_origin_roundtrip() {
        let parts = TransformParts {
            x: 12.0,
            y: -8.0,
            rotation: 45.0,
            skew_x: 5.0,
            scale_x: 1.25,
            scale_y: 0.75,
        };
        let back = parts.about_origin(50.0, 25.0).decompose_about(50.0, 25.0);
        assert!(back.approx_eq(&parts, 1e-6));
    }

    #[test]
    fn test_decompose_zero_scale_is_not_nan() {
        let parts = Matrix2D::scale(0.0, 0.0).decompose();
        assert_eq!(parts.scale_x, 0.0);
        assert_eq!(parts.scale_y, 0.0);
        assert_eq!(parts.rotation, 0.0);
        assert_eq!(parts.skew_x, 0.0);

        let parts = Matrix2D::scale(2.0, 0.0).decompose();
        assert!(approx_eq(parts.scale_x, 2.0));
        assert_eq!(parts.scale_y, 0.0);
        assert_eq!(parts.skew_x, 0.0);
    }

    #[test]
    fn test_normalize_angle() {
        assert!(approx_eq(normalize_angle(190.0), -170.0));
        assert!(approx_eq(normalize_angle(-190.0), 170.0));
        assert!(approx_eq(normalize_angle(180.0), 180.0));
        assert!(approx_eq(normalize_angle(-180.0), 180.0));
        assert!(approx_eq(normalize_angle(720.0 + 45.0), 45.0));
    }

    #[test]
    fn test_shortest_angle() {
        // From 350 to 10 goes forward through 360, not backward through 180.
        assert!(approx_eq(shortest_angle(350.0, 10.0), 370.0));
        assert!(approx_eq(shortest_angle(10.0, 350.0), -10.0));
        assert!(approx_eq(shortest_angle(0.0, 90.0), 90.0));
    }
}

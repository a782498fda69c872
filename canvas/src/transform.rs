//! Projective transformations of the plane.
use crate::math;

/// A 3×3 matrix acting on row vectors `[x, y, 1]`.
///
/// A point maps to `x' = m11 x + m21 y + dx`, `y' = m12 x + m22 y + dy` and
/// `w' = m13 x + m23 y + m33`, divided by `w'` for projective matrices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub m11: f64,
    pub m12: f64,
    pub m13: f64,
    pub m21: f64,
    pub m22: f64,
    pub m23: f64,
    pub dx: f64,
    pub dy: f64,
    pub m33: f64,
}

/// The most general class of a [`Transform`], ordered by generality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransformKind {
    Identity,
    Translate,
    Scale,
    Rotate,
    Shear,
    Project,
}

impl Default for Transform {
    fn default() -> Self {
        Transform::IDENTITY
    }
}

#[rustfmt::skip]
impl Transform {
    pub const IDENTITY: Transform = Transform::new(
        1.0, 0.0, 0.0,
        0.0, 1.0, 0.0,
        0.0, 0.0, 1.0,
    );

    /// A matrix from its rows.
    pub const fn new(
        m11: f64, m12: f64, m13: f64,
        m21: f64, m22: f64, m23: f64,
        dx: f64, dy: f64, m33: f64,
    ) -> Self {
        Transform { m11, m12, m13, m21, m22, m23, dx, dy, m33 }
    }

    pub const fn identity() -> Self {
        Transform::IDENTITY
    }

    pub const fn translate(dx: f64, dy: f64) -> Self {
        Transform::new(
            1.0, 0.0, 0.0,
            0.0, 1.0, 0.0,
            dx, dy, 1.0,
        )
    }

    pub const fn scale(sx: f64, sy: f64) -> Self {
        Transform::new(
            sx, 0.0, 0.0,
            0.0, sy, 0.0,
            0.0, 0.0, 1.0,
        )
    }

    /// A rotation by `radians`, clockwise on a raster where y points down.
    pub fn rotate(radians: f64) -> Self {
        let (sin, cos) = (math::sin(radians), math::cos(radians));
        Transform::new(
            cos, sin, 0.0,
            -sin, cos, 0.0,
            0.0, 0.0, 1.0,
        )
    }

    /// First apply `self`, then `next`.
    pub fn then(&self, next: &Transform) -> Transform {
        let a = self.rows();
        let b = next.rows();
        let cell = |r: usize, c: usize| a[r][0] * b[0][c] + a[r][1] * b[1][c] + a[r][2] * b[2][c];

        Transform::new(
            cell(0, 0), cell(0, 1), cell(0, 2),
            cell(1, 0), cell(1, 1), cell(1, 2),
            cell(2, 0), cell(2, 1), cell(2, 2),
        )
    }

    pub fn determinant(&self) -> f64 {
        let det2 = |ma: f64, mb: f64, na: f64, nb: f64| ma * nb - na * mb;
        let [x, y, z] = self.rows();
        x[0] * det2(y[1], y[2], z[1], z[2])
            - x[1] * det2(y[0], y[2], z[0], z[2])
            + x[2] * det2(y[0], y[1], z[0], z[1])
    }

    /// The inverse matrix, `None` when the matrix is singular.
    pub fn invert(&self) -> Option<Transform> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }

        let m = self.rows();
        let minor = |r1: usize, r2: usize, c1: usize, c2: usize| {
            m[r1][c1] * m[r2][c2] - m[r1][c2] * m[r2][c1]
        };

        // Transposed cofactors over the determinant.
        Some(Transform::new(
            minor(1, 2, 1, 2) / det, -minor(0, 2, 1, 2) / det, minor(0, 1, 1, 2) / det,
            -minor(1, 2, 0, 2) / det, minor(0, 2, 0, 2) / det, -minor(0, 1, 0, 2) / det,
            minor(1, 2, 0, 1) / det, -minor(0, 2, 0, 1) / det, minor(0, 1, 0, 1) / det,
        ))
    }

    /// Map a point, dividing by the projective coordinate unless it is zero.
    pub fn map(&self, x: f64, y: f64) -> (f64, f64) {
        let fx = self.m11 * x + self.m21 * y + self.dx;
        let fy = self.m12 * x + self.m22 * y + self.dy;
        if !self.is_affine() {
            let w = self.m13 * x + self.m23 * y + self.m33;
            if w != 0.0 {
                return (fx / w, fy / w);
            }
        }
        (fx, fy)
    }

    /// Whether the projective row is trivial.
    pub fn is_affine(&self) -> bool {
        self.m13 == 0.0 && self.m23 == 0.0
    }

    pub fn kind(&self) -> TransformKind {
        if self.m13 != 0.0 || self.m23 != 0.0 || self.m33 != 1.0 {
            TransformKind::Project
        } else if self.m12 != 0.0 || self.m21 != 0.0 {
            let dot = self.m11 * self.m12 + self.m21 * self.m22;
            if math::fuzzy_is_null(dot, 1e-12) {
                TransformKind::Rotate
            } else {
                TransformKind::Shear
            }
        } else if self.m11 != 1.0 || self.m22 != 1.0 {
            TransformKind::Scale
        } else if self.dx != 0.0 || self.dy != 0.0 {
            TransformKind::Translate
        } else {
            TransformKind::Identity
        }
    }

    const fn rows(&self) -> [[f64; 3]; 3] {
        [
            [self.m11, self.m12, self.m13],
            [self.m21, self.m22, self.m23],
            [self.dx, self.dy, self.m33],
        ]
    }
}

//! 2D affine transforms in 3×3 homogeneous form.
//!
//! Points are column vectors: `p' = M · [x, y, 1]ᵀ`. The bottom row of `M` is
//! `(0, 0, 1)`; constructing a transform from a raw matrix checks this within
//! [`HOMOGENEOUS_TOL`] and snaps the row to exact values.
//!
//! Persistence uses the nine matrix entries in row-major order.
use crate::error::RefinementError;
use nalgebra::{Matrix2, Matrix3, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// Tolerance on the homogeneous bottom row / right column.
pub const HOMOGENEOUS_TOL: f64 = 1e-7;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 9]", into = "[f64; 9]")]
pub struct AffineTransform {
    m: Matrix3<f64>,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineTransform {
    pub fn identity() -> Self {
        Self {
            m: Matrix3::identity(),
        }
    }

    pub fn from_scale(s: f64) -> Self {
        Self::from_scale_xy(s, s)
    }

    pub fn from_scale_xy(sx: f64, sy: f64) -> Self {
        Self::from_parts(Matrix2::new(sx, 0.0, 0.0, sy), Vector2::zeros())
    }

    pub fn from_translation(tx: f64, ty: f64) -> Self {
        Self::from_parts(Matrix2::identity(), Vector2::new(tx, ty))
    }

    /// Counter-clockwise rotation by `angle` radians in a y-up frame.
    pub fn from_rotation(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_parts(Matrix2::new(c, -s, s, c), Vector2::zeros())
    }

    pub fn from_parts(linear: Matrix2<f64>, translation: Vector2<f64>) -> Self {
        Self {
            m: Matrix3::new(
                linear[(0, 0)],
                linear[(0, 1)],
                translation[0],
                linear[(1, 0)],
                linear[(1, 1)],
                translation[1],
                0.0,
                0.0,
                1.0,
            ),
        }
    }

    /// Validate a raw homogeneous matrix.
    pub fn try_from_matrix(m: Matrix3<f64>) -> Result<Self, RefinementError> {
        if m.iter().any(|v| !v.is_finite()) {
            return Err(RefinementError::Precondition(
                "transform contains non-finite entries".into(),
            ));
        }
        let dev = (m[(2, 0)].abs())
            .max(m[(2, 1)].abs())
            .max((m[(2, 2)] - 1.0).abs());
        if dev >= HOMOGENEOUS_TOL {
            return Err(RefinementError::Precondition(format!(
                "bottom row ({}, {}, {}) is not (0, 0, 1)",
                m[(2, 0)],
                m[(2, 1)],
                m[(2, 2)]
            )));
        }
        let mut snapped = m;
        snapped[(2, 0)] = 0.0;
        snapped[(2, 1)] = 0.0;
        snapped[(2, 2)] = 1.0;
        Ok(Self { m: snapped })
    }

    /// Parse the nine-element row-major persistence format.
    pub fn try_from_row_major(values: &[f64]) -> Result<Self, RefinementError> {
        if values.len() != 9 {
            return Err(RefinementError::Precondition(format!(
                "expected 9 matrix entries, got {}",
                values.len()
            )));
        }
        Self::try_from_matrix(Matrix3::from_row_slice(values))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.m
    }

    pub fn to_row_major(&self) -> [f64; 9] {
        let mut out = [0.0; 9];
        for i in 0..3 {
            for j in 0..3 {
                out[i * 3 + j] = self.m[(i, j)];
            }
        }
        out
    }

    pub fn linear(&self) -> Matrix2<f64> {
        self.m.fixed_view::<2, 2>(0, 0).into_owned()
    }

    pub fn translation(&self) -> Vector2<f64> {
        Vector2::new(self.m[(0, 2)], self.m[(1, 2)])
    }

    pub fn with_translation(&self, t: Vector2<f64>) -> Self {
        Self::from_parts(self.linear(), t)
    }

    /// Same linear part, translation dropped.
    pub fn linear_only(&self) -> Self {
        self.with_translation(Vector2::zeros())
    }

    /// Determinant of the 2×2 linear part.
    pub fn determinant(&self) -> f64 {
        self.linear().determinant()
    }

    /// Geometric-mean scale of the linear part.
    pub fn uniform_scale(&self) -> f64 {
        self.determinant().abs().sqrt()
    }

    /// `true` when the translation column is `(0, 0)` within `tol`, i.e. the
    /// right column of the homogeneous matrix is `(0, 0, 1)`.
    pub fn has_identity_right_column(&self, tol: f64) -> bool {
        self.m[(0, 2)].abs() < tol && self.m[(1, 2)].abs() < tol
    }

    pub fn apply(&self, p: [f64; 2]) -> [f64; 2] {
        let v = self.m * Vector3::new(p[0], p[1], 1.0);
        [v[0], v[1]]
    }

    pub fn apply_vector(&self, v: Vector2<f64>) -> Vector2<f64> {
        self.linear() * v
    }

    pub fn apply_points(&self, pts: &[[f64; 2]]) -> Vec<[f64; 2]> {
        pts.iter().map(|&p| self.apply(p)).collect()
    }

    pub fn inverse(&self) -> Option<Self> {
        let inv = self.linear().try_inverse()?;
        if inv.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let t = -(inv * self.translation());
        Some(Self::from_parts(inv, t))
    }

    /// `self ∘ inner`: apply `inner` first, then `self`.
    pub fn compose(&self, inner: &Self) -> Self {
        Self { m: self.m * inner.m }
    }

    /// Multiply the linear part by `k`, keeping the translation.
    pub fn scale_linear(&self, k: f64) -> Self {
        Self::from_parts(self.linear() * k, self.translation())
    }

    /// Negate the output y axis (y-down scene ↔ y-up world).
    pub fn flip_y(&self) -> Self {
        AffineTransform::from_scale_xy(1.0, -1.0).compose(self)
    }

    pub fn max_abs_diff(&self, other: &Self) -> f64 {
        (self.m - other.m).amax()
    }
}

impl Mul for AffineTransform {
    type Output = AffineTransform;

    fn mul(self, rhs: AffineTransform) -> AffineTransform {
        self.compose(&rhs)
    }
}

impl TryFrom<[f64; 9]> for AffineTransform {
    type Error = RefinementError;

    fn try_from(values: [f64; 9]) -> Result<Self, Self::Error> {
        Self::try_from_row_major(&values)
    }
}

impl From<AffineTransform> for [f64; 9] {
    fn from(t: AffineTransform) -> Self {
        t.to_row_major()
    }
}

/// Map pixel coordinates of a `dst_w × dst_h` resampled raster back to the
/// `src_w × src_h` original. Pixel coordinates are corner based, so the map is
/// a pure scale.
pub fn pixel_frame_rescale(
    src_w: usize,
    src_h: usize,
    dst_w: usize,
    dst_h: usize,
) -> AffineTransform {
    if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
        return AffineTransform::identity();
    }
    AffineTransform::from_scale_xy(src_w as f64 / dst_w as f64, src_h as f64 / dst_h as f64)
}

/// Least-squares-free exact affine from three correspondences `src → dst`.
/// Returns `None` for (near) collinear input.
pub fn affine_from_three(src: &[[f64; 2]; 3], dst: &[[f64; 2]; 3]) -> Option<AffineTransform> {
    let s = Matrix3::new(
        src[0][0], src[1][0], src[2][0], src[0][1], src[1][1], src[2][1], 1.0, 1.0, 1.0,
    );
    let area = s.determinant();
    let scale = ((src[1][0] - src[0][0]).powi(2) + (src[1][1] - src[0][1]).powi(2))
        .max((src[2][0] - src[0][0]).powi(2) + (src[2][1] - src[0][1]).powi(2));
    if !area.is_finite() || area.abs() <= 1e-9 * scale.max(1e-12) {
        return None;
    }
    let d = Matrix3::new(
        dst[0][0], dst[1][0], dst[2][0], dst[0][1], dst[1][1], dst[2][1], 1.0, 1.0, 1.0,
    );
    let m = d * s.try_inverse()?;
    AffineTransform::try_from_matrix(m).ok()
}

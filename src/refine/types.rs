use crate::affine::AffineTransform;
use crate::diagnostics::TimingBreakdown;
use crate::matching::HomologousPointPair;
use crate::DISPLAY_WIDTH;
use nalgebra::Vector2;
use serde::Serialize;

/// Successful refinement of an aerial pixel → world transform.
#[derive(Clone, Debug, Serialize)]
pub struct RefinedTransform {
    pub transform: AffineTransform,
    /// Translation component of `transform`.
    pub translation: [f64; 2],
    pub pairs: Vec<HomologousPointPair>,
    /// Distance between the old and new translation components.
    pub shift: f64,
    /// `sqrt(det(new linear) / det(old linear))`.
    pub scale_ratio: f64,
    pub point_count: usize,
    /// RMS residual of the supporting pairs, in world units.
    pub rmse: f64,
    pub timing: TimingBreakdown,
}

impl RefinedTransform {
    /// Pairs rescaled from native raster pixels to display pixels.
    pub fn display_pairs(&self, native_width: usize) -> Vec<HomologousPointPair> {
        let k = display_scale(native_width);
        self.pairs.iter().map(|p| p.scaled(k)).collect()
    }
}

/// Display pixels per native pixel for a raster `native_width` pixels wide.
pub fn display_scale(native_width: usize) -> f64 {
    if native_width == 0 {
        return 1.0;
    }
    DISPLAY_WIDTH as f64 / native_width as f64
}

/// Euclidean distance between two translations.
pub fn shift_magnitude(old: Vector2<f64>, new: Vector2<f64>) -> f64 {
    (new - old).norm()
}

/// Uniform scale change between two linear parts. Returns `None` when either
/// determinant is zero or their signs differ.
pub fn scale_ratio(old: &AffineTransform, new: &AffineTransform) -> Option<f64> {
    let ratio = new.determinant() / old.determinant();
    (ratio.is_finite() && ratio > 0.0).then(|| ratio.sqrt())
}

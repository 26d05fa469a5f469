use serde::{Deserialize, Serialize};

/// Acceptance gates applied to the matcher's fit before it is returned.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineOptions {
    /// Minimum number of supporting point pairs.
    pub min_points: usize,
    /// Largest accepted RMS residual in world units. `None` disables the gate.
    pub max_rmse: Option<f64>,
    /// Accepted range of `sqrt(det(new) / det(old))`.
    pub scale_ratio_bounds: [f64; 2],
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            min_points: 6,
            max_rmse: None,
            scale_ratio_bounds: [0.5, 2.0],
        }
    }
}

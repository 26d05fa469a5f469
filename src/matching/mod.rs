//! Homologous-point finding between an aerial raster and a reference.
//!
//! The refiner only depends on the [`Georeferencer`] trait. [`OrthoMatcher`]
//! is the default implementation: Harris corners on the orthophoto, NCC
//! template search in the aerial warped through the initial transform, then a
//! RANSAC affine fit from aerial pixels to world coordinates.
mod ortho;
pub mod warp;

pub use ortho::{MatcherOptions, OrthoMatcher};

use crate::affine::AffineTransform;
use crate::diagnostics::TimingBreakdown;
use crate::error::MatchError;
use crate::raster::RasterDataset;
use serde::{Deserialize, Serialize};

/// One matched feature.
///
/// - `aerial`: position in the aerial's native pixel frame.
/// - `ortho`: the reference feature mapped into the aerial pixel frame through
///   the *initial* transform; `aerial − ortho` is the correction at this point.
/// - `world`: the reference feature in world coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HomologousPointPair {
    pub aerial: [f64; 2],
    pub ortho: [f64; 2],
    pub world: [f64; 2],
}

impl HomologousPointPair {
    /// Same pair with both image-frame points multiplied by `k`.
    pub fn scaled(&self, k: f64) -> Self {
        Self {
            aerial: [self.aerial[0] * k, self.aerial[1] * k],
            ortho: [self.ortho[0] * k, self.ortho[1] * k],
            world: self.world,
        }
    }
}

/// Output of a [`Georeferencer`].
#[derive(Clone, Debug)]
pub struct Georeferencing {
    /// Aerial native pixel → world.
    pub transform: AffineTransform,
    /// Inlier pairs supporting `transform`.
    pub pairs: Vec<HomologousPointPair>,
    /// RMS transfer error of the inliers, in world units.
    pub rmse: f64,
    /// Correspondences before robust fitting.
    pub candidates: usize,
    pub timing: TimingBreakdown,
}

/// Finds homologous points and fits an aerial pixel → world affine.
pub trait Georeferencer: Send + Sync {
    fn georeference(
        &self,
        aerial: &dyn RasterDataset,
        initial: &AffineTransform,
    ) -> Result<Georeferencing, MatchError>;
}

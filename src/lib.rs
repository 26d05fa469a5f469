#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod aerial;
pub mod affine;
pub mod decode;
pub mod diagnostics;
pub mod error;
pub mod image;
pub mod raster;
pub mod refine;

// Building blocks of the default matcher. Public, but considered internals.
pub mod config;
pub mod estimate;
pub mod features;
pub mod matching;
pub mod pyramid;

/// Width in pixels of the display pixmap of every aerial.
pub const DISPLAY_WIDTH: usize = 3000;

// --- High-level re-exports -------------------------------------------------

pub use crate::aerial::{AerialImage, GeorefOutcome, GeorefPreview, Placement, TransformState};
pub use crate::affine::AffineTransform;
pub use crate::error::{MatchError, RasterError, RefinementError};
pub use crate::matching::{Georeferencer, HomologousPointPair, OrthoMatcher};
pub use crate::refine::{RefinedTransform, Refiner};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use aerial_georef::prelude::*;
/// use std::path::Path;
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let reference = ReferenceRaster::open(Path::new("ortho.png"))?;
/// let aerial = Raster::open(Path::new("aerial.tif"))?;
/// let refiner = Refiner::new(Arc::new(OrthoMatcher::new(reference, MatcherOptions::default())));
///
/// let initial = AffineTransform::from_scale(0.5);
/// let refined = refiner.refine(&aerial, initial.matrix())?;
/// println!("points={} shift={:.2} scale={:.3}", refined.point_count, refined.shift, refined.scale_ratio);
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::matching::MatcherOptions;
    pub use crate::raster::{Raster, RasterDataset, ReferenceRaster};
    pub use crate::{AffineTransform, OrthoMatcher, RefinedTransform, RefinementError, Refiner};
}

//! Affine georeference refinement.
//!
//! [`Refiner::refine`] takes a raster and the current aerial pixel → world
//! transform, checks the preconditions, delegates homologous-point finding to
//! a [`Georeferencer`] and validates what comes back:
//!
//! - the initial matrix must satisfy the homogeneous bottom-row invariant and
//!   the raster must be the full image, not a preview crop; both are
//!   [`RefinementError::Precondition`] and nothing is read;
//! - matcher failures become [`RefinementError::MatchingFailure`] or
//!   [`RefinementError::Io`]; the caller keeps its transform;
//! - a returned transform always satisfies the invariant and passes the
//!   [`RefineOptions`] gates.
//!
//! The refiner runs on the calling thread and holds no caller state.

mod options;
mod types;

pub use options::RefineOptions;
pub use types::{display_scale, scale_ratio, shift_magnitude, RefinedTransform};

use crate::affine::AffineTransform;
use crate::error::{RasterError, RefinementError};
use crate::matching::Georeferencer;
use crate::raster::RasterDataset;
use log::{info, warn};
use nalgebra::Matrix3;
use std::sync::Arc;
use std::time::Instant;

pub struct Refiner {
    georeferencer: Arc<dyn Georeferencer>,
    options: RefineOptions,
}

impl Refiner {
    pub fn new(georeferencer: Arc<dyn Georeferencer>) -> Self {
        Self::with_options(georeferencer, RefineOptions::default())
    }

    pub fn with_options(georeferencer: Arc<dyn Georeferencer>, options: RefineOptions) -> Self {
        Self {
            georeferencer,
            options,
        }
    }

    pub fn options(&self) -> &RefineOptions {
        &self.options
    }

    /// Refine a raw homogeneous matrix.
    pub fn refine(
        &self,
        dataset: &dyn RasterDataset,
        initial: &Matrix3<f64>,
    ) -> Result<RefinedTransform, RefinementError> {
        let initial = AffineTransform::try_from_matrix(*initial)?;
        self.refine_transform(dataset, &initial)
    }

    pub fn refine_transform(
        &self,
        dataset: &dyn RasterDataset,
        initial: &AffineTransform,
    ) -> Result<RefinedTransform, RefinementError> {
        if dataset.is_preview() {
            return Err(RefinementError::Precondition(
                "automatic georeferencing requires the full raster, not a preview crop".into(),
            ));
        }
        if initial.inverse().is_none() {
            return Err(RefinementError::Precondition(
                "initial transform is singular".into(),
            ));
        }
        let bands = dataset.band_count();
        if bands != 1 && bands != 3 {
            return Err(RasterError::UnsupportedBands(bands).into());
        }

        let start = Instant::now();
        let found = self
            .georeferencer
            .georeference(dataset, initial)
            .map_err(|err| {
                warn!("georeferencing failed: {err}");
                RefinementError::from(err)
            })?;

        let transform = AffineTransform::try_from_matrix(*found.transform.matrix())
            .map_err(|e| self.reject(format!("matcher returned a malformed transform: {e}")))?;
        let point_count = found.pairs.len();
        if point_count < self.options.min_points {
            return Err(self.reject(format!(
                "{point_count} supporting points, need {}",
                self.options.min_points
            )));
        }
        let ratio = scale_ratio(initial, &transform)
            .ok_or_else(|| self.reject("fit is singular or mirrored".into()))?;
        let [lo, hi] = self.options.scale_ratio_bounds;
        if !(lo..=hi).contains(&ratio) {
            return Err(self.reject(format!(
                "scale ratio {ratio:.3} outside [{lo}, {hi}]"
            )));
        }
        if let Some(max_rmse) = self.options.max_rmse {
            if found.rmse > max_rmse {
                return Err(self.reject(format!(
                    "rms residual {:.3} exceeds {max_rmse}",
                    found.rmse
                )));
            }
        }

        let shift = shift_magnitude(initial.translation(), transform.translation());
        let t = transform.translation();
        let mut timing = found.timing;
        timing.total_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(
            "georeferenced {}x{}: points={} rmse={:.3} shift={:.3} scale={:.4} ({:.1} ms)",
            dataset.width(),
            dataset.height(),
            point_count,
            found.rmse,
            shift,
            ratio,
            timing.total_ms
        );
        Ok(RefinedTransform {
            transform,
            translation: [t[0], t[1]],
            pairs: found.pairs,
            shift,
            scale_ratio: ratio,
            point_count,
            rmse: found.rmse,
            timing,
        })
    }

    fn reject(&self, reason: String) -> RefinementError {
        warn!("georeferencing rejected: {reason}");
        RefinementError::MatchingFailure(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::TimingBreakdown;
    use crate::error::MatchError;
    use crate::matching::{Georeferencing, HomologousPointPair};
    use crate::raster::{PixelRect, PreviewRect, Raster, RasterBuffer};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed correction and counts calls.
    struct Fixed {
        correction: AffineTransform,
        points: usize,
        calls: AtomicUsize,
    }

    impl Georeferencer for Fixed {
        fn georeference(
            &self,
            _aerial: &dyn RasterDataset,
            initial: &AffineTransform,
        ) -> Result<Georeferencing, MatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let pair = HomologousPointPair {
                aerial: [1.0, 2.0],
                ortho: [1.0, 2.0],
                world: [3.0, 4.0],
            };
            Ok(Georeferencing {
                transform: self.correction.compose(initial),
                pairs: vec![pair; self.points],
                rmse: 0.1,
                candidates: self.points,
                timing: TimingBreakdown::default(),
            })
        }
    }

    struct Failing;

    impl Georeferencer for Failing {
        fn georeference(
            &self,
            _aerial: &dyn RasterDataset,
            _initial: &AffineTransform,
        ) -> Result<Georeferencing, MatchError> {
            Err(MatchError::TooFewMatches { needed: 6, found: 2 })
        }
    }

    fn fixed(correction: AffineTransform, points: usize) -> Arc<Fixed> {
        Arc::new(Fixed {
            correction,
            points,
            calls: AtomicUsize::new(0),
        })
    }

    fn raster() -> Raster {
        Raster::from_buffer(RasterBuffer::gray(40, 30, vec![0; 1200]).unwrap())
    }

    #[test]
    fn reports_shift_and_scale() {
        let matcher = fixed(AffineTransform::from_translation(3.0, -4.0), 8);
        let refiner = Refiner::new(matcher.clone());
        let initial = AffineTransform::from_scale(0.5).with_translation(nalgebra::Vector2::new(100.0, 200.0));
        let out = refiner.refine(&raster(), initial.matrix()).unwrap();
        assert!((out.shift - 5.0).abs() < 1e-9);
        assert!((out.scale_ratio - 1.0).abs() < 1e-9);
        assert_eq!(out.point_count, 8);
        assert_eq!(out.translation, [103.0, 196.0]);
        assert_eq!(matcher.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn projective_initial_is_a_precondition_error() {
        let matcher = fixed(AffineTransform::identity(), 8);
        let refiner = Refiner::new(matcher.clone());
        let mut m = Matrix3::identity();
        m[(2, 1)] = 0.01;
        assert!(matches!(
            refiner.refine(&raster(), &m),
            Err(RefinementError::Precondition(_))
        ));
        assert_eq!(matcher.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn preview_raster_is_a_precondition_error() {
        let matcher = fixed(AffineTransform::identity(), 8);
        let refiner = Refiner::new(matcher.clone());
        let preview = raster().into_preview(PreviewRect {
            rect: PixelRect::new(0, 0, 40, 30),
            rotation_ccw: 0,
        });
        let err = refiner
            .refine(&preview, AffineTransform::identity().matrix())
            .unwrap_err();
        assert!(matches!(err, RefinementError::Precondition(_)));
        assert!(!err.is_recoverable());
        assert_eq!(matcher.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn matcher_failure_is_recoverable() {
        let refiner = Refiner::new(Arc::new(Failing));
        let err = refiner
            .refine(&raster(), AffineTransform::identity().matrix())
            .unwrap_err();
        assert!(matches!(err, RefinementError::MatchingFailure(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn gates_reject_weak_fits() {
        let few = Refiner::new(fixed(AffineTransform::identity(), 3));
        assert!(matches!(
            few.refine(&raster(), AffineTransform::identity().matrix()),
            Err(RefinementError::MatchingFailure(_))
        ));
        let blown_up = Refiner::new(fixed(AffineTransform::from_scale(3.0), 8));
        assert!(matches!(
            blown_up.refine(&raster(), AffineTransform::identity().matrix()),
            Err(RefinementError::MatchingFailure(_))
        ));
        let strict = Refiner::with_options(
            fixed(AffineTransform::identity(), 8),
            RefineOptions {
                max_rmse: Some(0.01),
                ..RefineOptions::default()
            },
        );
        assert!(strict
            .refine(&raster(), AffineTransform::identity().matrix())
            .is_err());
    }

    #[test]
    fn unsupported_band_count_is_io() {
        struct FourBands;
        impl RasterDataset for FourBands {
            fn width(&self) -> usize {
                4
            }
            fn height(&self) -> usize {
                4
            }
            fn band_count(&self) -> usize {
                4
            }
            fn source(&self) -> crate::raster::RasterSource {
                crate::raster::RasterSource::Full
            }
            fn read(&self, _: PixelRect, _: usize, _: usize) -> Result<RasterBuffer, RasterError> {
                Err(RasterError::UnsupportedBands(4))
            }
        }
        let refiner = Refiner::new(fixed(AffineTransform::identity(), 8));
        assert!(matches!(
            refiner.refine(&FourBands, AffineTransform::identity().matrix()),
            Err(RefinementError::Io(RasterError::UnsupportedBands(4)))
        ));
    }
}

//! Grayscale image pyramid with configurable separable blur and 2× decimation.
//!
//! Level 0 is the input. Each further level optionally applies a separable
//! filter (Gaussian by default) and keeps every other pixel. The matcher uses
//! the pyramid to bring the reference orthophoto down to a working size; the
//! mapping from level coordinates back to level 0 is given by
//! [`Pyramid::level_to_base`].

pub mod filters;

use crate::affine::AffineTransform;
use crate::image::{ImageF32, ImageView, ImageViewMut};
use filters::{apply as apply_filter, SeparableFilter, GAUSSIAN_5TAP};

#[derive(Clone, Debug)]
pub struct Pyramid {
    pub levels: Vec<ImageF32>,
}

/// Options controlling pyramid construction.
#[derive(Clone, Copy)]
pub struct PyramidOptions<'a> {
    /// Number of pyramid levels (>= 1).
    pub levels: usize,
    /// Number of initial downscale steps that apply the separable filter.
    ///
    /// `None` applies the filter before every decimation. `Some(0)` skips blur
    /// entirely.
    pub blur_levels: Option<usize>,
    /// Filter used for the separable blur stage.
    pub filter: &'a dyn SeparableFilter,
}

impl<'a> PyramidOptions<'a> {
    pub fn new(levels: usize) -> Self {
        Self {
            levels,
            blur_levels: None,
            filter: &GAUSSIAN_5TAP,
        }
    }
}

impl std::fmt::Debug for PyramidOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PyramidOptions")
            .field("levels", &self.levels)
            .field("blur_levels", &self.blur_levels)
            .field("filter_taps", &self.filter.taps().len())
            .finish()
    }
}

impl Pyramid {
    /// Build a pyramid taking ownership of a float level 0.
    pub fn build_f32(base: ImageF32, options: PyramidOptions<'_>) -> Self {
        let count = options.levels.max(1);
        let mut levels = Vec::with_capacity(count);
        levels.push(base);

        let blur_limit = options.blur_levels.unwrap_or(usize::MAX);
        for lvl in 1..count {
            let prev = &levels[lvl - 1];
            if prev.w <= 1 && prev.h <= 1 {
                break;
            }
            let filtered = (lvl <= blur_limit).then(|| apply_filter(options.filter, prev));
            let src_img = filtered.as_ref().unwrap_or(prev);

            let (nw, nh) = (prev.w.div_ceil(2), prev.h.div_ceil(2));
            let mut down = ImageF32::new(nw, nh);
            for y in 0..nh {
                let sy = (y * 2).min(src_img.h - 1);
                let src_row = src_img.row(sy);
                let dst_row = down.row_mut(y);
                for (x, dst_px) in dst_row.iter_mut().enumerate() {
                    *dst_px = src_row[(x * 2).min(src_img.w - 1)];
                }
            }
            levels.push(down);
        }

        Self { levels }
    }

    /// Smallest number of levels whose coarsest level fits `max_size` on its
    /// longer side.
    pub fn levels_to_fit(width: usize, height: usize, max_size: usize) -> usize {
        let mut levels = 1;
        let mut side = width.max(height);
        while side > max_size.max(1) {
            side = side.div_ceil(2);
            levels += 1;
        }
        levels
    }

    /// Map corner-based coordinates of level `level` to level 0. Decimation
    /// keeps pixel `2i`, so the centre `i + 0.5` lands on `2i + 0.5`.
    pub fn level_to_base(level: usize) -> AffineTransform {
        let s = (1u64 << level.min(62)) as f64;
        let offset = -(s - 1.0) / 2.0;
        AffineTransform::from_translation(offset, offset).compose(&AffineTransform::from_scale(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_sizes_halve_with_ceil() {
        let base = ImageF32::new(33, 17);
        let pyr = Pyramid::build_f32(base, PyramidOptions::new(3));
        let sizes: Vec<_> = pyr.levels.iter().map(|l| (l.w, l.h)).collect();
        assert_eq!(sizes, vec![(33, 17), (17, 9), (9, 5)]);
    }

    #[test]
    fn levels_to_fit_counts_halvings() {
        assert_eq!(Pyramid::levels_to_fit(500, 300, 1024), 1);
        assert_eq!(Pyramid::levels_to_fit(2048, 300, 1024), 2);
        assert_eq!(Pyramid::levels_to_fit(4100, 300, 1024), 4);
    }

    #[test]
    fn level_to_base_maps_pixel_centres() {
        let t = Pyramid::level_to_base(2);
        // Level-2 pixel 3 picks base pixel 12.
        let p = t.apply([3.5, 3.5]);
        assert!((p[0] - 12.5).abs() < 1e-12 && (p[1] - 12.5).abs() < 1e-12);
        assert_eq!(Pyramid::level_to_base(0), AffineTransform::identity());
    }

    #[test]
    fn constant_image_stays_constant_under_blur() {
        let mut base = ImageF32::new(10, 10);
        base.data.iter_mut().for_each(|v| *v = 0.4);
        let pyr = Pyramid::build_f32(base, PyramidOptions::new(2));
        assert!(pyr.levels[1].data.iter().all(|&v| (v - 0.4).abs() < 1e-6));
    }
}

use super::warp::warp_into_grid;
use super::{Georeferencer, Georeferencing, HomologousPointPair};
use crate::affine::{pixel_frame_rescale, AffineTransform};
use crate::diagnostics::TimingBreakdown;
use crate::error::{MatchError, RasterError};
use crate::estimate::{fit_affine_ransac, RansacOptions};
use crate::features::{detect_corners, search_ncc, CornerOptions, Patch};
use crate::pyramid::{Pyramid, PyramidOptions};
use crate::raster::{PixelRect, RasterDataset, ReferenceRaster};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherOptions {
    /// Upper bound on the longer side of the working grid (px).
    pub max_working_size: usize,
    /// Template half-size (working px).
    pub patch_radius: usize,
    /// Search half-size around each corner (working px).
    pub search_radius: usize,
    /// Minimum NCC score for a match.
    pub min_ncc: f32,
    pub corners: CornerOptions,
    /// RANSAC settings; `inlier_threshold` is in working pixels and converted
    /// to world units with the working ground sample distance.
    pub ransac: RansacOptions,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self {
            max_working_size: 1024,
            patch_radius: 7,
            search_radius: 12,
            min_ncc: 0.7,
            corners: CornerOptions::default(),
            ransac: RansacOptions::default(),
        }
    }
}

/// Matches an aerial against a georeferenced orthophoto.
pub struct OrthoMatcher {
    reference: ReferenceRaster,
    pyramid: Pyramid,
    options: MatcherOptions,
}

/// Reference crop at the chosen pyramid level.
struct WorkingGrid {
    level: usize,
    image: crate::image::ImageF32,
    /// Working px → world.
    to_world: AffineTransform,
}

impl OrthoMatcher {
    pub fn new(reference: ReferenceRaster, options: MatcherOptions) -> Self {
        let levels = Pyramid::levels_to_fit(
            reference.image.w,
            reference.image.h,
            options.max_working_size,
        );
        let pyramid = Pyramid::build_f32(reference.image.clone(), PyramidOptions::new(levels));
        debug!(
            "OrthoMatcher: reference {}x{} gsd={:.4} pyramid_levels={}",
            reference.image.w,
            reference.image.h,
            reference.gsd(),
            pyramid.levels.len()
        );
        Self {
            reference,
            pyramid,
            options,
        }
    }

    pub fn reference(&self) -> &ReferenceRaster {
        &self.reference
    }

    pub fn options(&self) -> &MatcherOptions {
        &self.options
    }

    fn working_grid(&self, aerial_w: usize, aerial_h: usize, initial: &AffineTransform) -> Result<WorkingGrid, MatchError> {
        let world_to_ref = self
            .reference
            .geo
            .inverse()
            .ok_or_else(|| MatchError::Degenerate("reference transform is singular".into()))?;
        let (aw, ah) = (aerial_w as f64, aerial_h as f64);
        let corners = [[0.0, 0.0], [aw, 0.0], [0.0, ah], [aw, ah]];
        let in_ref = world_to_ref.compose(initial).apply_points(&corners);

        let (rw, rh) = (self.reference.image.w as f64, self.reference.image.h as f64);
        let x0 = in_ref.iter().map(|p| p[0]).fold(f64::INFINITY, f64::min).max(0.0);
        let y0 = in_ref.iter().map(|p| p[1]).fold(f64::INFINITY, f64::min).max(0.0);
        let x1 = in_ref.iter().map(|p| p[0]).fold(f64::NEG_INFINITY, f64::max).min(rw);
        let y1 = in_ref.iter().map(|p| p[1]).fold(f64::NEG_INFINITY, f64::max).min(rh);
        if !(x1 - x0 >= 1.0 && y1 - y0 >= 1.0) {
            return Err(MatchError::NoOverlap);
        }

        let roi_w = (x1 - x0).ceil() as usize;
        let roi_h = (y1 - y0).ceil() as usize;
        let level = (Pyramid::levels_to_fit(roi_w, roi_h, self.options.max_working_size) - 1)
            .min(self.pyramid.levels.len() - 1);
        let level_img = &self.pyramid.levels[level];
        let level_to_base = Pyramid::level_to_base(level);
        let base_to_level = level_to_base
            .inverse()
            .ok_or_else(|| MatchError::Degenerate("pyramid level mapping".into()))?;
        let [lx0, ly0] = base_to_level.apply([x0, y0]);
        let [lx1, ly1] = base_to_level.apply([x1, y1]);
        let lx0 = lx0.floor().max(0.0) as usize;
        let ly0 = ly0.floor().max(0.0) as usize;
        let lx1 = (lx1.ceil().max(0.0) as usize).min(level_img.w);
        let ly1 = (ly1.ceil().max(0.0) as usize).min(level_img.h);
        if lx1 <= lx0 || ly1 <= ly0 {
            return Err(MatchError::NoOverlap);
        }

        let image = level_img.crop(lx0, ly0, lx1 - lx0, ly1 - ly0);
        let to_world = self
            .reference
            .geo
            .compose(&level_to_base)
            .compose(&AffineTransform::from_translation(lx0 as f64, ly0 as f64));
        Ok(WorkingGrid {
            level,
            image,
            to_world,
        })
    }
}

impl Georeferencer for OrthoMatcher {
    fn georeference(
        &self,
        aerial: &dyn RasterDataset,
        initial: &AffineTransform,
    ) -> Result<Georeferencing, MatchError> {
        let total_start = Instant::now();
        let mut timing = TimingBreakdown::default();
        let opts = &self.options;
        let (aw, ah) = (aerial.width(), aerial.height());
        if aw == 0 || ah == 0 {
            return Err(MatchError::Degenerate("empty aerial raster".into()));
        }
        let bands = aerial.band_count();
        if bands != 1 && bands != 3 {
            return Err(RasterError::UnsupportedBands(bands).into());
        }
        let world_to_aerial = initial
            .inverse()
            .ok_or_else(|| MatchError::Degenerate("initial transform is singular".into()))?;

        let stage = Instant::now();
        let grid = self.working_grid(aw, ah, initial)?;
        let grid_to_aerial = world_to_aerial.compose(&grid.to_world);
        timing.push("working_grid", stage.elapsed().as_secs_f64() * 1000.0);
        debug!(
            "OrthoMatcher: level={} working={}x{}",
            grid.level, grid.image.w, grid.image.h
        );

        // Read the aerial close to the working resolution, never upsampled.
        let stage = Instant::now();
        let aerial_per_working = grid_to_aerial.determinant().abs().sqrt();
        let factor = aerial_per_working.floor().max(1.0);
        let rw = ((aw as f64 / factor).round() as usize).max(1);
        let rh = ((ah as f64 / factor).round() as usize).max(1);
        let reduced = aerial.read_gray(PixelRect::full(aw, ah), rw, rh)?;
        let native_to_reduced = pixel_frame_rescale(aw, ah, rw, rh)
            .inverse()
            .ok_or_else(|| MatchError::Degenerate("aerial rescale".into()))?;
        let warped = warp_into_grid(
            &reduced,
            &native_to_reduced.compose(&grid_to_aerial),
            grid.image.w,
            grid.image.h,
        );
        timing.push("aerial_warp", stage.elapsed().as_secs_f64() * 1000.0);
        debug!(
            "OrthoMatcher: aerial read {}x{} (factor {}), valid={:.2}",
            rw,
            rh,
            factor,
            warped.valid_fraction()
        );

        let stage = Instant::now();
        let border = opts.patch_radius + opts.search_radius + 1;
        let corners = detect_corners(&grid.image, &opts.corners, border);
        timing.push("corners", stage.elapsed().as_secs_f64() * 1000.0);

        let stage = Instant::now();
        let (pr, sr) = (opts.patch_radius, opts.search_radius);
        let candidates: Vec<HomologousPointPair> = corners
            .par_iter()
            .filter_map(|c| {
                let patch = Patch::extract(&grid.image, c.x, c.y, pr)?;
                let hit = search_ncc(&patch, &warped.image, &warped.valid, c.x, c.y, sr)?;
                if hit.score < opts.min_ncc {
                    return None;
                }
                let p = [c.x as f64 + 0.5, c.y as f64 + 0.5];
                Some(HomologousPointPair {
                    aerial: grid_to_aerial.apply([p[0] + hit.dx, p[1] + hit.dy]),
                    ortho: grid_to_aerial.apply(p),
                    world: grid.to_world.apply(p),
                })
            })
            .collect();
        timing.push("ncc_search", stage.elapsed().as_secs_f64() * 1000.0);
        debug!(
            "OrthoMatcher: corners={} matched={}",
            corners.len(),
            candidates.len()
        );

        let stage = Instant::now();
        let working_gsd = grid.to_world.determinant().abs().sqrt();
        let ransac = RansacOptions {
            inlier_threshold: opts.ransac.inlier_threshold * working_gsd,
            ..opts.ransac.clone()
        };
        let src: Vec<[f64; 2]> = candidates.iter().map(|p| p.aerial).collect();
        let dst: Vec<[f64; 2]> = candidates.iter().map(|p| p.world).collect();
        let fit = fit_affine_ransac(&src, &dst, &ransac)?;
        timing.push("ransac", stage.elapsed().as_secs_f64() * 1000.0);

        let pairs: Vec<HomologousPointPair> = fit.inlier_indices().map(|i| candidates[i]).collect();
        timing.total_ms = total_start.elapsed().as_secs_f64() * 1000.0;
        debug!(
            "OrthoMatcher: inliers={}/{} rmse={:.3} total_ms={:.1}",
            fit.n_inliers,
            candidates.len(),
            fit.rmse,
            timing.total_ms
        );
        Ok(Georeferencing {
            transform: fit.transform,
            pairs,
            rmse: fit.rmse,
            candidates: candidates.len(),
            timing,
        })
    }
}

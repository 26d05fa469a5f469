use super::lsq::{fit_affine_lsq, residual};
use crate::affine::{affine_from_three, AffineTransform};
use crate::error::MatchError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacOptions {
    pub max_iters: usize,
    /// Inlier threshold on the transfer error, in destination units.
    pub inlier_threshold: f64,
    pub min_inliers: usize,
    pub seed: u64,
}

impl Default for RansacOptions {
    fn default() -> Self {
        Self {
            max_iters: 1000,
            inlier_threshold: 2.0,
            min_inliers: 6,
            seed: 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RansacResult {
    pub transform: AffineTransform,
    pub inlier_mask: Vec<bool>,
    pub n_inliers: usize,
    /// Transfer error of every correspondence under the final transform.
    pub errors: Vec<f64>,
    /// RMS transfer error over the inliers.
    pub rmse: f64,
}

impl RansacResult {
    pub fn inlier_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.inlier_mask
            .iter()
            .enumerate()
            .filter_map(|(i, &m)| m.then_some(i))
    }
}

fn score(t: &AffineTransform, src: &[[f64; 2]], dst: &[[f64; 2]], thr: f64) -> (usize, Vec<bool>) {
    let mask: Vec<bool> = src
        .iter()
        .zip(dst)
        .map(|(s, d)| residual(t, s, d) < thr)
        .collect();
    (mask.iter().filter(|&&m| m).count(), mask)
}

/// Robust affine `dst ≈ A · src`.
pub fn fit_affine_ransac(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    options: &RansacOptions,
) -> Result<RansacResult, MatchError> {
    let n = src.len().min(dst.len());
    let needed = options.min_inliers.max(3);
    if n < needed {
        return Err(MatchError::TooFewMatches { needed, found: n });
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut best: Option<(usize, Vec<bool>)> = None;

    for _ in 0..options.max_iters {
        let i0 = rng.gen_range(0..n);
        let i1 = rng.gen_range(0..n);
        let i2 = rng.gen_range(0..n);
        if i0 == i1 || i0 == i2 || i1 == i2 {
            continue;
        }
        let s = [src[i0], src[i1], src[i2]];
        let d = [dst[i0], dst[i1], dst[i2]];
        let Some(model) = affine_from_three(&s, &d) else {
            continue;
        };
        let (count, mask) = score(&model, src, dst, options.inlier_threshold);
        if best.as_ref().map_or(true, |(c, _)| count > *c) {
            let done = count * 10 > n * 9;
            best = Some((count, mask));
            if done {
                break;
            }
        }
    }

    let (count, mask) = best.ok_or_else(|| {
        MatchError::Degenerate("no non-degenerate minimal sample".into())
    })?;
    if count < needed {
        return Err(MatchError::TooFewMatches {
            needed,
            found: count,
        });
    }

    let (in_src, in_dst): (Vec<[f64; 2]>, Vec<[f64; 2]>) = mask
        .iter()
        .enumerate()
        .filter(|(_, &m)| m)
        .map(|(i, _)| (src[i], dst[i]))
        .unzip();
    let transform = fit_affine_lsq(&in_src, &in_dst)?;

    let errors: Vec<f64> = src
        .iter()
        .zip(dst)
        .map(|(s, d)| residual(&transform, s, d))
        .collect();
    let inlier_mask: Vec<bool> = errors.iter().map(|&e| e < options.inlier_threshold).collect();
    let n_inliers = inlier_mask.iter().filter(|&&m| m).count();
    if n_inliers < needed {
        return Err(MatchError::TooFewMatches {
            needed,
            found: n_inliers,
        });
    }
    let sum_sq: f64 = errors
        .iter()
        .zip(&inlier_mask)
        .filter(|(_, &m)| m)
        .map(|(e, _)| e * e)
        .sum();
    Ok(RansacResult {
        transform,
        inlier_mask,
        n_inliers,
        errors,
        rmse: (sum_sq / n_inliers as f64).sqrt(),
    })
}

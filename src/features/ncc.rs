//! Normalized cross-correlation template search.
//!
//! A [`Patch`] is a zero-mean square template cut from the reference image.
//! [`search_ncc`] slides it over a target image inside a square search window
//! and returns the best integer displacement refined to sub-pixel by a 1D
//! parabola fit along each axis. Peaks on the window border are rejected
//! because the true maximum may lie outside the searched range.
use crate::image::ImageF32;

const FLAT_EPS: f32 = 1e-6;

#[derive(Clone, Debug)]
pub struct Patch {
    pub radius: usize,
    values: Vec<f32>,
    norm: f32,
}

impl Patch {
    /// Cut the `(2r+1)²` patch centred on pixel `(cx, cy)`. Returns `None` when
    /// the patch leaves the image or is flat.
    pub fn extract(img: &ImageF32, cx: usize, cy: usize, radius: usize) -> Option<Self> {
        if cx < radius || cy < radius || cx + radius >= img.w || cy + radius >= img.h {
            return None;
        }
        let side = 2 * radius + 1;
        let mut values = Vec::with_capacity(side * side);
        for y in cy - radius..=cy + radius {
            for x in cx - radius..=cx + radius {
                values.push(img.get(x, y));
            }
        }
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        values.iter_mut().for_each(|v| *v -= mean);
        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        (norm > FLAT_EPS).then_some(Self {
            radius,
            values,
            norm,
        })
    }

    /// NCC between this patch and the window of `img` centred on `(cx, cy)`.
    /// Every window pixel must be flagged valid in `valid` (row-major, same
    /// size as `img`).
    pub fn ncc_at(&self, img: &ImageF32, valid: &[bool], cx: isize, cy: isize) -> Option<f32> {
        let r = self.radius as isize;
        if cx < r || cy < r || cx + r >= img.w as isize || cy + r >= img.h as isize {
            return None;
        }
        let (x0, y0) = ((cx - r) as usize, (cy - r) as usize);
        let side = 2 * self.radius + 1;
        let mut sum = 0.0f32;
        let mut sum_sq = 0.0f32;
        let mut cross = 0.0f32;
        for dy in 0..side {
            let row = img.idx(x0, y0 + dy);
            for dx in 0..side {
                let i = row + dx;
                if !valid[i] {
                    return None;
                }
                let v = img.data[i];
                sum += v;
                sum_sq += v * v;
                cross += v * self.values[dy * side + dx];
            }
        }
        let n = (side * side) as f32;
        let var = (sum_sq - sum * sum / n).max(0.0);
        let norm = var.sqrt();
        if norm <= FLAT_EPS {
            return None;
        }
        // The template is zero-mean, so the target mean drops out of `cross`.
        Some((cross / (norm * self.norm)).clamp(-1.0, 1.0))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchHit {
    /// Sub-pixel displacement from the search centre.
    pub dx: f64,
    pub dy: f64,
    pub score: f32,
}

/// Search `img` for `patch` within `±radius` pixels of `(cx, cy)`.
pub fn search_ncc(
    patch: &Patch,
    img: &ImageF32,
    valid: &[bool],
    cx: usize,
    cy: usize,
    radius: usize,
) -> Option<SearchHit> {
    let side = 2 * radius + 1;
    let mut scores = vec![f32::NEG_INFINITY; side * side];
    let mut best: Option<(usize, usize, f32)> = None;
    for sy in 0..side {
        for sx in 0..side {
            let x = cx as isize + sx as isize - radius as isize;
            let y = cy as isize + sy as isize - radius as isize;
            if let Some(score) = patch.ncc_at(img, valid, x, y) {
                scores[sy * side + sx] = score;
                if best.map_or(true, |(_, _, b)| score > b) {
                    best = Some((sx, sy, score));
                }
            }
        }
    }
    let (bx, by, score) = best?;
    if bx == 0 || by == 0 || bx + 1 == side || by + 1 == side {
        return None;
    }
    let at = |x: usize, y: usize| scores[y * side + x];
    let ox = parabola_offset(at(bx - 1, by), score, at(bx + 1, by));
    let oy = parabola_offset(at(bx, by - 1), score, at(bx, by + 1));
    Some(SearchHit {
        dx: bx as f64 - radius as f64 + ox,
        dy: by as f64 - radius as f64 + oy,
        score,
    })
}

fn parabola_offset(left: f32, centre: f32, right: f32) -> f64 {
    if !left.is_finite() || !right.is_finite() {
        return 0.0;
    }
    let denom = left - 2.0 * centre + right;
    if denom >= -f32::EPSILON {
        return 0.0;
    }
    (0.5 * (left - right) / denom).clamp(-0.5, 0.5) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(w: usize, h: usize, cx: f32, cy: f32) -> ImageF32 {
        let mut img = ImageF32::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                img.set(x, y, (-(dx * dx + dy * dy) / 18.0).exp());
            }
        }
        img
    }

    #[test]
    fn finds_shifted_blob_with_subpixel_accuracy() {
        let reference = blob(40, 40, 20.0, 20.0);
        let target = blob(40, 40, 23.4, 18.7);
        let valid = vec![true; 40 * 40];
        let patch = Patch::extract(&reference, 20, 20, 6).unwrap();
        let hit = search_ncc(&patch, &target, &valid, 20, 20, 6).unwrap();
        assert!((hit.dx - 3.4).abs() < 0.25, "dx={}", hit.dx);
        assert!((hit.dy + 1.3).abs() < 0.25, "dy={}", hit.dy);
        assert!(hit.score > 0.95);
    }

    #[test]
    fn peak_outside_search_window_is_rejected() {
        let reference = blob(60, 40, 20.0, 20.0);
        let target = blob(60, 40, 32.0, 20.0);
        let valid = vec![true; 60 * 40];
        let patch = Patch::extract(&reference, 20, 20, 5).unwrap();
        assert!(search_ncc(&patch, &target, &valid, 20, 20, 4).is_none());
    }

    #[test]
    fn invalid_pixels_block_the_window() {
        let reference = blob(30, 30, 15.0, 15.0);
        let valid = vec![false; 30 * 30];
        let patch = Patch::extract(&reference, 15, 15, 4).unwrap();
        assert!(patch.ncc_at(&reference, &valid, 15, 15).is_none());
        let all = vec![true; 30 * 30];
        let self_score = patch.ncc_at(&reference, &all, 15, 15).unwrap();
        assert!((self_score - 1.0).abs() < 1e-4);
    }

    #[test]
    fn flat_patch_is_rejected() {
        let img = ImageF32::new(20, 20);
        assert!(Patch::extract(&img, 10, 10, 3).is_none());
    }
}

//! Harris corner detection with non-maximum suppression and grid bucketing.
//!
//! The structure tensor is built from Sobel gradients and windowed with the
//! 5-tap Gaussian from the pyramid filters. Corners are kept when their
//! response exceeds `rel_threshold · max_response`, is a strict local maximum
//! within `nms_radius`, and ranks among the `per_cell` strongest of its grid
//! cell. Bucketing spreads the corners over the footprint so that the affine
//! fit is well conditioned.
use super::grad::sobel_gradients;
use crate::image::{ImageF32, ImageView};
use crate::pyramid::filters::{apply as apply_filter, GAUSSIAN_5TAP};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CornerOptions {
    /// Harris trace weight `k` in `det − k·tr²`.
    pub harris_k: f32,
    /// Response threshold relative to the strongest response.
    pub rel_threshold: f32,
    /// Half-size of the suppression window (px).
    pub nms_radius: usize,
    /// Number of bucketing cells along each axis.
    pub grid_cells: usize,
    /// Corners kept per bucketing cell.
    pub per_cell: usize,
    /// Global cap on the number of corners.
    pub max_corners: usize,
}

impl Default for CornerOptions {
    fn default() -> Self {
        Self {
            harris_k: 0.04,
            rel_threshold: 0.01,
            nms_radius: 3,
            grid_cells: 8,
            per_cell: 4,
            max_corners: 256,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Corner {
    pub x: usize,
    pub y: usize,
    pub response: f32,
}

/// Per-pixel Harris response.
pub fn harris_response(img: &ImageF32, k: f32) -> ImageF32 {
    let grad = sobel_gradients(img);
    let mut ixx = ImageF32::new(img.w, img.h);
    let mut iyy = ImageF32::new(img.w, img.h);
    let mut ixy = ImageF32::new(img.w, img.h);
    for (i, (&gx, &gy)) in grad.gx.data.iter().zip(&grad.gy.data).enumerate() {
        ixx.data[i] = gx * gx;
        iyy.data[i] = gy * gy;
        ixy.data[i] = gx * gy;
    }
    let sxx = apply_filter(&GAUSSIAN_5TAP, &ixx);
    let syy = apply_filter(&GAUSSIAN_5TAP, &iyy);
    let sxy = apply_filter(&GAUSSIAN_5TAP, &ixy);
    let mut out = ImageF32::new(img.w, img.h);
    for i in 0..out.data.len() {
        let (a, b, c) = (sxx.data[i], syy.data[i], sxy.data[i]);
        let tr = a + b;
        out.data[i] = a * b - c * c - k * tr * tr;
    }
    out
}

/// Detect corners at least `border` pixels away from the image edges.
pub fn detect_corners(img: &ImageF32, options: &CornerOptions, border: usize) -> Vec<Corner> {
    if img.w <= 2 * border || img.h <= 2 * border {
        return Vec::new();
    }
    let response = harris_response(img, options.harris_k);
    let max_r = response.data.iter().copied().fold(0.0f32, f32::max);
    if max_r <= 0.0 {
        return Vec::new();
    }
    let threshold = options.rel_threshold * max_r;
    let r = options.nms_radius as isize;

    let cells = options.grid_cells.max(1);
    let mut buckets: Vec<Vec<Corner>> = vec![Vec::new(); cells * cells];
    for y in border..img.h - border {
        let row = response.row(y);
        for x in border..img.w - border {
            let v = row[x];
            if v <= threshold || !is_local_max(&response, x, y, r, v) {
                continue;
            }
            let cx = x * cells / img.w;
            let cy = y * cells / img.h;
            buckets[cy * cells + cx].push(Corner { x, y, response: v });
        }
    }

    let mut corners: Vec<Corner> = Vec::new();
    for mut bucket in buckets {
        bucket.sort_by(|a, b| b.response.total_cmp(&a.response));
        bucket.truncate(options.per_cell);
        corners.extend(bucket);
    }
    corners.sort_by(|a, b| b.response.total_cmp(&a.response));
    corners.truncate(options.max_corners);
    corners
}

fn is_local_max(response: &ImageF32, x: usize, y: usize, r: isize, v: f32) -> bool {
    let (w, h) = (response.w as isize, response.h as isize);
    for dy in -r..=r {
        let ny = y as isize + dy;
        if ny < 0 || ny >= h {
            continue;
        }
        for dx in -r..=r {
            let nx = x as isize + dx;
            if (dx == 0 && dy == 0) || nx < 0 || nx >= w {
                continue;
            }
            let n = response.get(nx as usize, ny as usize);
            // Plateaus resolve to the first pixel in scan order.
            if n > v || (n == v && (dy < 0 || (dy == 0 && dx < 0))) {
                return false;
            }
        }
    }
    true
}

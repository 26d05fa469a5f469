use crate::affine::AffineTransform;
use crate::image::ImageF32;

/// Image resampled onto a target grid plus a per-pixel validity mask.
#[derive(Clone, Debug)]
pub struct Warped {
    pub image: ImageF32,
    pub valid: Vec<bool>,
}

impl Warped {
    pub fn valid_fraction(&self) -> f64 {
        if self.valid.is_empty() {
            return 0.0;
        }
        self.valid.iter().filter(|&&v| v).count() as f64 / self.valid.len() as f64
    }
}

/// Resample `src` onto a `w × h` grid. `grid_to_src` maps corner-based grid
/// coordinates to corner-based `src` coordinates; pixels whose centre falls
/// outside `src` are zero and flagged invalid.
pub fn warp_into_grid(src: &ImageF32, grid_to_src: &AffineTransform, w: usize, h: usize) -> Warped {
    let mut image = ImageF32::new(w, h);
    let mut valid = vec![false; w * h];
    for y in 0..h {
        for x in 0..w {
            let [sx, sy] = grid_to_src.apply([x as f64 + 0.5, y as f64 + 0.5]);
            if let Some(v) = src.sample_bilinear(sx, sy) {
                let i = image.idx(x, y);
                image.data[i] = v;
                valid[i] = true;
            }
        }
    }
    Warped { image, valid }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_warp_copies_pixels() {
        let mut src = ImageF32::new(6, 4);
        for (i, v) in src.data.iter_mut().enumerate() {
            *v = i as f32;
        }
        let out = warp_into_grid(&src, &AffineTransform::identity(), 6, 4);
        assert!(out.valid.iter().all(|&v| v));
        assert_eq!(out.image.data, src.data);
    }

    #[test]
    fn pixels_outside_source_are_invalid() {
        let src = ImageF32::new(4, 4);
        let shift = AffineTransform::from_translation(2.0, 0.0);
        let out = warp_into_grid(&src, &shift, 4, 4);
        assert!(out.valid[out.image.idx(0, 0)]);
        assert!(!out.valid[out.image.idx(3, 0)]);
        assert!((out.valid_fraction() - 0.5).abs() < 1e-12);
    }
}

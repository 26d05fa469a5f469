//! 3×3 Sobel derivatives with clamped borders, the input of the Harris
//! structure tensor.
use crate::image::{ImageF32, ImageView, ImageViewMut};

/// Horizontal and vertical derivative images of the same size as the input.
#[derive(Clone, Debug)]
pub struct Gradients {
    pub gx: ImageF32,
    pub gy: ImageF32,
}

/// Sobel derivatives. `gx` grows to the right, `gy` downwards.
pub fn sobel_gradients(img: &ImageF32) -> Gradients {
    let (w, h) = (img.w, img.h);
    let mut gx = ImageF32::new(w, h);
    let mut gy = ImageF32::new(w, h);
    if w == 0 || h == 0 {
        return Gradients { gx, gy };
    }

    for y in 0..h {
        let up = img.row(y.saturating_sub(1));
        let mid = img.row(y);
        let down = img.row((y + 1).min(h - 1));
        let out_x = gx.row_mut(y);
        let out_y = gy.row_mut(y);
        for x in 0..w {
            let (l, r) = (x.saturating_sub(1), (x + 1).min(w - 1));
            // [1 2 1] smoothing across the derivative direction.
            out_x[x] = (up[r] - up[l]) + 2.0 * (mid[r] - mid[l]) + (down[r] - down[l]);
            out_y[x] = (down[l] - up[l]) + 2.0 * (down[x] - up[x]) + (down[r] - up[r]);
        }
    }
    Gradients { gx, gy }
}

use crate::error::RasterError;
use crate::raster::{PixelRect, RasterDataset};
use serde::{Deserialize, Serialize};

/// Contrast enhancement applied to a decoded pixmap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContrastEnhancement {
    None,
    /// Linear stretch of the darkest/brightest sample to 0/255.
    MinMax,
    #[default]
    Histogram,
}

/// Interleaved RGBA8 image ready for display.
#[derive(Clone, PartialEq, Eq)]
pub struct Pixmap {
    pub width: usize,
    pub height: usize,
    pub rgba: Vec<u8>,
}

impl std::fmt::Debug for Pixmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pixmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Pixmap {
    /// Opaque white pixmap, used as a placeholder until decoding finishes.
    pub fn blank(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            rgba: vec![255; width * height * 4],
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = (y * self.width + x) * 4;
        [self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]]
    }
}

/// Height of a `width`-wide pixmap showing a `src_w × src_h` image.
pub fn pixmap_height_for(width: usize, src_w: usize, src_h: usize) -> usize {
    if src_w == 0 {
        return width;
    }
    ((src_h as f64 / src_w as f64) * width as f64).round().max(1.0) as usize
}

/// Read `rect` (or the whole raster) and produce a `width`-wide RGBA pixmap,
/// rotated by `rotation_ccw` quarter turns, with contrast enhancement.
pub fn decode_pixmap(
    dataset: &dyn RasterDataset,
    rect: Option<PixelRect>,
    rotation_ccw: u8,
    width: usize,
    contrast: ContrastEnhancement,
) -> Result<Pixmap, RasterError> {
    let rect = rect.unwrap_or_else(|| PixelRect::full(dataset.width(), dataset.height()));
    let quarter = rotation_ccw % 4;
    let (disp_w, disp_h) = if quarter % 2 == 1 {
        (rect.height, rect.width)
    } else {
        (rect.width, rect.height)
    };
    let height = pixmap_height_for(width, disp_w, disp_h);
    let (read_w, read_h) = if quarter % 2 == 1 {
        (height, width)
    } else {
        (width, height)
    };

    let buffer = dataset.read(rect, read_w, read_h)?;
    let mut rgba = Vec::with_capacity(read_w * read_h * 4);
    match buffer.bands {
        1 => buffer.data.iter().for_each(|&v| rgba.extend_from_slice(&[v, v, v, 255])),
        3 => buffer
            .data
            .chunks_exact(3)
            .for_each(|px| rgba.extend_from_slice(&[px[0], px[1], px[2], 255])),
        other => return Err(RasterError::UnsupportedBands(other)),
    }
    let mut pixmap = rotate_ccw(
        Pixmap {
            width: read_w,
            height: read_h,
            rgba,
        },
        quarter,
    );
    enhance_contrast(&mut pixmap, contrast);
    Ok(pixmap)
}

/// Rotate by `quarter_turns` × 90° counter-clockwise as seen on screen.
pub fn rotate_ccw(src: Pixmap, quarter_turns: u8) -> Pixmap {
    let q = quarter_turns % 4;
    if q == 0 {
        return src;
    }
    let (w, h) = (src.width, src.height);
    let (dw, dh) = if q % 2 == 1 { (h, w) } else { (w, h) };
    let mut rgba = vec![0u8; src.rgba.len()];
    for dy in 0..dh {
        for dx in 0..dw {
            let (sx, sy) = match q {
                1 => (w - 1 - dy, dx),
                2 => (w - 1 - dx, h - 1 - dy),
                _ => (dy, h - 1 - dx),
            };
            let s = (sy * w + sx) * 4;
            let d = (dy * dw + dx) * 4;
            rgba[d..d + 4].copy_from_slice(&src.rgba[s..s + 4]);
        }
    }
    Pixmap {
        width: dw,
        height: dh,
        rgba,
    }
}

fn luma(px: &[u8]) -> u8 {
    ((px[0] as u32 * 77 + px[1] as u32 * 150 + px[2] as u32 * 29) >> 8) as u8
}

/// Apply `contrast` in place. Alpha is left untouched.
pub fn enhance_contrast(pixmap: &mut Pixmap, contrast: ContrastEnhancement) {
    let lut = match contrast {
        ContrastEnhancement::None => return,
        ContrastEnhancement::MinMax => min_max_lut(pixmap),
        ContrastEnhancement::Histogram => equalization_lut(pixmap),
    };
    let Some(lut) = lut else {
        return;
    };
    for px in pixmap.rgba.chunks_exact_mut(4) {
        for c in &mut px[..3] {
            *c = lut[*c as usize];
        }
    }
}

fn min_max_lut(pixmap: &Pixmap) -> Option<[u8; 256]> {
    let (mut lo, mut hi) = (u8::MAX, u8::MIN);
    for px in pixmap.rgba.chunks_exact(4) {
        for &c in &px[..3] {
            lo = lo.min(c);
            hi = hi.max(c);
        }
    }
    if hi <= lo {
        return None;
    }
    let span = (hi - lo) as f32;
    let mut lut = [0u8; 256];
    for (v, out) in lut.iter_mut().enumerate() {
        let t = (v as f32 - lo as f32) / span;
        *out = (t * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    Some(lut)
}

fn equalization_lut(pixmap: &Pixmap) -> Option<[u8; 256]> {
    let mut hist = [0u64; 256];
    for px in pixmap.rgba.chunks_exact(4) {
        hist[luma(px) as usize] += 1;
    }
    let total: u64 = hist.iter().sum();
    let cdf_min = hist.iter().copied().find(|&c| c > 0)?;
    if total <= cdf_min {
        return None;
    }
    let mut lut = [0u8; 256];
    let mut cdf = 0u64;
    for (v, out) in lut.iter_mut().enumerate() {
        cdf += hist[v];
        let t = cdf.saturating_sub(cdf_min) as f64 / (total - cdf_min) as f64;
        *out = (t * 255.0).round() as u8;
    }
    Some(lut)
}

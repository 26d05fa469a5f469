use aerial_georef::affine::AffineTransform;
use aerial_georef::image::ImageF32;
use aerial_georef::raster::{Raster, RasterBuffer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Axis-aligned rectangles of constant brightness laid out in world
/// coordinates, later ones painted over earlier ones.
pub struct RectScene {
    background: f64,
    rects: Vec<([f64; 4], f64)>,
    bounds: [f64; 4],
    /// Rectangle indices overlapping each `CELL`-sized bucket, in paint order.
    buckets: Vec<Vec<usize>>,
    cols: usize,
}

const CELL: f64 = 32.0;

impl RectScene {
    /// `count` random rectangles inside `[x0, x1) × [y0, y1)` (world units).
    pub fn random(seed: u64, bounds: [f64; 4], count: usize) -> Self {
        let [x0, y0, x1, y1] = bounds;
        let mut rng = StdRng::seed_from_u64(seed);
        let rects = (0..count)
            .map(|_| {
                let w = rng.gen_range(6.0..30.0);
                let h = rng.gen_range(6.0..30.0);
                let left = rng.gen_range(x0..x1 - w);
                let bottom = rng.gen_range(y0..y1 - h);
                let value = rng.gen_range(15.0..240.0);
                ([left, bottom, left + w, bottom + h], value)
            })
            .collect::<Vec<_>>();

        let cols = ((x1 - x0) / CELL).ceil() as usize;
        let rows = ((y1 - y0) / CELL).ceil() as usize;
        let mut buckets = vec![Vec::new(); cols * rows];
        for (i, ([l, b, r, t], _)) in rects.iter().enumerate() {
            let (c0, c1) = (((l - x0) / CELL) as usize, ((r - x0) / CELL) as usize);
            let (r0, r1) = (((b - y0) / CELL) as usize, ((t - y0) / CELL) as usize);
            for row in r0..=r1.min(rows - 1) {
                for col in c0..=c1.min(cols - 1) {
                    buckets[row * cols + col].push(i);
                }
            }
        }
        Self {
            background: 120.0,
            rects,
            bounds,
            buckets,
            cols,
        }
    }

    pub fn value(&self, [x, y]: [f64; 2]) -> f64 {
        let [x0, y0, x1, y1] = self.bounds;
        if !(x >= x0 && x < x1 && y >= y0 && y < y1) {
            return self.background;
        }
        let cell = ((y - y0) / CELL) as usize * self.cols + ((x - x0) / CELL) as usize;
        self.buckets[cell]
            .iter()
            .rev()
            .map(|&i| &self.rects[i])
            .find(|([l, b, r, t], _)| x >= *l && x < *r && y >= *b && y < *t)
            .map(|(_, v)| *v)
            .unwrap_or(self.background)
    }

    /// Render a `w × h` raster whose pixel → world transform is `geo`, with
    /// 3 × 3 supersampling per pixel.
    pub fn render_u8(&self, w: usize, h: usize, geo: &AffineTransform) -> Vec<u8> {
        const SUB: usize = 3;
        let mut out = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0;
                for sy in 0..SUB {
                    for sx in 0..SUB {
                        let p = [
                            x as f64 + (sx as f64 + 0.5) / SUB as f64,
                            y as f64 + (sy as f64 + 0.5) / SUB as f64,
                        ];
                        acc += self.value(geo.apply(p));
                    }
                }
                out.push((acc / (SUB * SUB) as f64).round().clamp(0.0, 255.0) as u8);
            }
        }
        out
    }

    pub fn render_raster(&self, w: usize, h: usize, geo: &AffineTransform) -> Raster {
        let data = self.render_u8(w, h, geo);
        Raster::from_buffer(RasterBuffer::gray(w, h, data).expect("buffer size matches"))
    }

    pub fn render_f32(&self, w: usize, h: usize, geo: &AffineTransform) -> ImageF32 {
        let data = self.render_u8(w, h, geo);
        let mut img = ImageF32::new(w, h);
        for y in 0..h {
            for x in 0..w {
                img.set(x, y, data[y * w + x] as f32 / 255.0);
            }
        }
        img
    }
}

/// North-up pixel → world transform: `gsd` metres per pixel, top-left
/// corner at `origin`.
pub fn north_up(origin: [f64; 2], gsd: f64) -> AffineTransform {
    AffineTransform::from_translation(origin[0], origin[1]).compose(&AffineTransform::from_scale_xy(gsd, -gsd))
}

/// Pixel → world transform of a `w × h` image centred on `centre`, rotated
/// by `angle_deg` (counter-clockwise in world) at `gsd` metres per pixel.
pub fn rotated_about_centre(centre: [f64; 2], w: usize, h: usize, gsd: f64, angle_deg: f64) -> AffineTransform {
    AffineTransform::from_translation(centre[0], centre[1])
        .compose(&AffineTransform::from_rotation(angle_deg.to_radians()))
        .compose(&AffineTransform::from_scale_xy(gsd, -gsd))
        .compose(&AffineTransform::from_translation(-(w as f64) / 2.0, -(h as f64) / 2.0))
}

/// Largest distance between where `a` and `b` put the image corners.
pub fn corner_error(a: &AffineTransform, b: &AffineTransform, w: usize, h: usize) -> f64 {
    let (w, h) = (w as f64, h as f64);
    [[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]]
        .iter()
        .map(|&c| {
            let (p, q) = (a.apply(c), b.apply(c));
            ((p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2)).sqrt()
        })
        .fold(0.0, f64::max)
}

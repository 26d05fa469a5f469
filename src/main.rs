use aerial_georef::affine::AffineTransform;
use aerial_georef::matching::{MatcherOptions, OrthoMatcher};
use aerial_georef::raster::{Raster, RasterBuffer, ReferenceRaster};
use aerial_georef::refine::Refiner;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

fn main() {
    env_logger::init();

    // Demo stub: a blocky 8-bit scene used both as the orthophoto and as the
    // aerial, with the aerial's initial placement off by a few metres.
    let size = 256usize;
    let mut rng = StdRng::seed_from_u64(7);
    let blocks: Vec<u8> = (0..32 * 32).map(|_| rng.gen_range(20..235)).collect();
    let gray: Vec<u8> = (0..size * size)
        .map(|i| blocks[(i / size / 8) * 32 + (i % size) / 8])
        .collect();

    let geo = AffineTransform::from_translation(5000.0, 9000.0).compose(&AffineTransform::from_scale_xy(1.0, -1.0));
    let buffer = match RasterBuffer::gray(size, size, gray) {
        Ok(buffer) => buffer,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    };
    let aerial = Raster::from_buffer(buffer);
    let reference = ReferenceRaster::new(aerial.buffer().to_gray_f32(), geo);

    let refiner = Refiner::new(Arc::new(OrthoMatcher::new(reference, MatcherOptions::default())));
    let initial = AffineTransform::from_translation(3.0, -2.0).compose(&geo);
    match refiner.refine_transform(&aerial, &initial) {
        Ok(res) => println!(
            "points={} shift={:.3} scale={:.4} latency_ms={:.3}",
            res.point_count, res.shift, res.scale_ratio, res.timing.total_ms
        ),
        Err(err) => println!("failed: {err}"),
    }
}

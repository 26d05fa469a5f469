use aerial_georef::aerial::{AerialImage, AerialMeta, AerialSource, Placement, TransformState};
use aerial_georef::affine::AffineTransform;
use aerial_georef::diagnostics::TimingBreakdown;
use aerial_georef::error::{MatchError, RefinementError};
use aerial_georef::matching::{Georeferencer, Georeferencing, HomologousPointPair};
use aerial_georef::raster::{PixelRect, PreviewRect, Raster, RasterBuffer, RasterDataset};
use aerial_georef::refine::Refiner;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const NATIVE_W: usize = 6000;
const NATIVE_H: usize = 4000;

/// Applies a fixed world-space correction to whatever it is given.
struct Correction {
    world: AffineTransform,
    calls: AtomicUsize,
}

impl Georeferencer for Correction {
    fn georeference(
        &self,
        _aerial: &dyn RasterDataset,
        initial: &AffineTransform,
    ) -> Result<Georeferencing, MatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let transform = self.world.compose(initial);
        let pairs = [[100.0, 200.0], [5000.0, 300.0], [2500.0, 3500.0], [800.0, 3000.0], [4000.0, 2000.0], [3000.0, 1000.0]]
            .iter()
            .map(|&p| HomologousPointPair {
                aerial: p,
                ortho: initial.inverse().map(|inv| inv.apply(transform.apply(p))).unwrap_or(p),
                world: transform.apply(p),
            })
            .collect();
        Ok(Georeferencing {
            transform,
            pairs,
            rmse: 0.0,
            candidates: 6,
            timing: TimingBreakdown::default(),
        })
    }
}

fn refiner(world: AffineTransform) -> (Refiner, Arc<Correction>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let correction = Arc::new(Correction {
        world,
        calls: AtomicUsize::new(0),
    });
    (Refiner::new(correction.clone()), correction)
}

fn meta() -> AerialMeta {
    AerialMeta {
        radius_bild: 1200.0,
        scale_cartesian2map: 1.0,
        origin: [352_000.0, -5_801_000.0],
    }
}

fn full_source() -> AerialSource {
    AerialSource::Image {
        width: NATIVE_W,
        height: NATIVE_H,
    }
}

/// Small stand-in raster; only its size matters to the callers here.
fn dataset() -> Raster {
    Raster::from_buffer(RasterBuffer::gray(NATIVE_W, NATIVE_H, vec![0; NATIVE_W * NATIVE_H]).unwrap())
}

fn moved_image() -> AerialImage {
    let mut image = AerialImage::new("strip7/0113", meta(), full_source());
    image.rotate_at([200.0, -100.0], 1.5).unwrap();
    image.zoom_at([0.0, 0.0], 2.0).unwrap();
    image.translate_by(40.0, -15.0).unwrap();
    image
}

#[test]
fn reject_restores_bit_identical_placement() {
    let (refiner, _) = refiner(AffineTransform::from_translation(12.0, -7.0));
    let raster = dataset();
    let mut image = moved_image();
    let before: Placement = *image.placement();
    let state = image.state();

    let decision = image.georeference(&refiner, &raster, |_| false).unwrap();
    assert!(!decision.accepted);
    assert_eq!(image.placement().position, before.position);
    assert_eq!(image.placement().transform.to_row_major(), before.transform.to_row_major());
    assert_eq!(image.state(), state);
}

#[test]
fn reject_restores_original_state() {
    let (refiner, _) = refiner(AffineTransform::from_translation(1.0, 1.0));
    let raster = dataset();
    let mut image = AerialImage::new("strip7/0114", meta(), full_source());
    assert_eq!(image.state(), TransformState::Original);
    let preview = image.preview_georeference(&refiner, &raster).unwrap();
    assert_eq!(preview.image().state(), TransformState::Changed);
    preview.reject();
    assert_eq!(image.state(), TransformState::Original);
}

#[test]
fn world_translation_is_reported_as_shift() {
    let d = [3.0, 4.0];
    let (refiner, _) = refiner(AffineTransform::from_translation(d[0], d[1]));
    let raster = dataset();
    let mut image = moved_image();
    let before = *image.placement();

    let decision = image.georeference(&refiner, &raster, |_| true).unwrap();
    assert!(decision.accepted);
    let outcome = &decision.outcome;
    assert!((outcome.shift - 5.0).abs() < 1e-6, "shift {}", outcome.shift);
    assert!((outcome.scale_ratio - 1.0).abs() < 1e-9);
    // World y points up, scene y points down.
    let p = image.placement().position;
    assert!((p[0] - before.position[0] - d[0]).abs() < 1e-6);
    assert!((p[1] - before.position[1] + d[1]).abs() < 1e-6);
    assert!(image.placement().transform.max_abs_diff(&before.transform) < 1e-12);
    assert_eq!(image.state(), TransformState::Changed);
}

#[test]
fn uniform_world_scale_is_reported_as_scale_ratio() {
    let k = 1.07;
    let (refiner, _) = refiner(AffineTransform::from_scale(k));
    let raster = dataset();
    let mut image = moved_image();

    let decision = image.georeference(&refiner, &raster, |_| true).unwrap();
    assert!((decision.outcome.scale_ratio - k).abs() < 1e-6);
    assert!((decision.outcome.refined.scale_ratio - k).abs() < 1e-6);
    assert!(image.placement().is_linear());
}

#[test]
fn accepted_result_keeps_item_transform_linear() {
    let correction = AffineTransform::from_translation(-20.0, 9.0)
        .compose(&AffineTransform::from_rotation(0.01))
        .compose(&AffineTransform::from_scale(0.98));
    let (refiner, _) = refiner(correction);
    let raster = dataset();
    let mut image = moved_image();
    let initial = image.native_to_world(NATIVE_W);

    let decision = image.georeference(&refiner, &raster, |_| true).unwrap();
    assert!(image.placement().is_linear());
    let now = image.native_to_world(NATIVE_W);
    let expected = correction.compose(&initial);
    assert!(now.max_abs_diff(&expected) < 1e-6);
    assert_eq!(decision.outcome.overlay.len(), 6);
    let m = decision.outcome.refined.transform.to_row_major();
    assert_eq!(&m[6..], &[0.0, 0.0, 1.0]);
}

#[test]
fn dropping_preview_restores_placement() {
    let (refiner, _) = refiner(AffineTransform::from_translation(50.0, 50.0));
    let raster = dataset();
    let mut image = moved_image();
    let before = *image.placement();
    {
        let preview = image.preview_georeference(&refiner, &raster).unwrap();
        assert_ne!(preview.image().placement(), &before);
        assert_eq!(preview.outcome().previous, before);
    }
    assert_eq!(image.placement(), &before);
}

#[test]
fn preview_crop_is_refused_without_matching() {
    let (refiner, correction) = refiner(AffineTransform::from_translation(1.0, 0.0));
    let crop = PreviewRect {
        rect: PixelRect::new(100, 50, 1500, 1000),
        rotation_ccw: 1,
    };
    let raster = dataset().into_preview(crop);

    let mut image = AerialImage::new("strip7/0115", meta(), AerialSource::Preview(crop));
    image.translate_by(1.0, 1.0).unwrap();
    let before = image.clone();
    let err = image.preview_georeference(&refiner, &raster).err().unwrap();
    assert!(matches!(err, RefinementError::Precondition(_)));
    assert_eq!(image.placement(), before.placement());
    assert_eq!(image.state(), before.state());

    // A full-image item handed a preview dataset is refused as well.
    let mut full = moved_image();
    let placement = *full.placement();
    assert!(matches!(
        full.preview_georeference(&refiner, &raster).err(),
        Some(RefinementError::Precondition(_))
    ));
    assert_eq!(full.placement(), &placement);
    assert_eq!(correction.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn locked_image_is_not_georeferenced() {
    let (refiner, correction) = refiner(AffineTransform::from_translation(1.0, 0.0));
    let raster = dataset();
    let mut image = moved_image();
    image.lock();
    let before = *image.placement();
    assert!(matches!(
        image.georeference(&refiner, &raster, |_| true).err(),
        Some(RefinementError::Precondition(_))
    ));
    assert_eq!(image.placement(), &before);
    assert_eq!(image.state(), TransformState::Locked);
    assert_eq!(correction.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_raster_is_not_georeferenced() {
    let (refiner, _) = refiner(AffineTransform::identity());
    let raster = dataset();
    let mut image = AerialImage::new("strip7/0116", meta(), AerialSource::Missing);
    assert!(matches!(
        image.preview_georeference(&refiner, &raster).err(),
        Some(RefinementError::Precondition(_))
    ));
    assert_eq!(image.state(), TransformState::Original);
}

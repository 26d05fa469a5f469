//! Per-image placement state and the georeferencing preview cycle.
//!
//! An [`AerialImage`] owns the placement of one aerial in the y-down scene:
//! a position plus a linear item transform acting on display pixels, where
//! the display pixmap is [`DISPLAY_WIDTH`] wide and centred on the item
//! origin. World (WCS) coordinates are the scene with y negated.
//!
//! For automatic georeferencing the placement is converted into a native
//! pixel → world transform, refined by a [`Refiner`], and converted back:
//!
//! ```text
//! k          = DISPLAY_WIDTH / native_width
//! top_left   = position + L · offset          offset = (-pw/2, -ph/2)
//! T0         = flip_y ∘ [L·k | top_left]
//! L'         = linear(flip_y ∘ T') / k
//! position'  = translation(flip_y ∘ T') − L' · offset
//! ```
//!
//! The result is applied through a [`GeorefPreview`] guard, which restores
//! the previous placement unless accepted.

mod placement;
mod preview;

pub use placement::{
    AerialMeta, AerialSource, Availability, Placement, PlacementRecord, TransformState,
};
pub use preview::{GeorefOutcome, GeorefPreview, OverlayPoint};

use crate::affine::AffineTransform;
use crate::decode::pixmap_height_for;
use crate::error::RefinementError;
use crate::raster::RasterDataset;
use crate::refine::{display_scale, scale_ratio, Refiner};
use crate::DISPLAY_WIDTH;
use log::info;
use serde::Serialize;

/// Zoom factor per wheel step.
pub const ZOOM_STEP: f64 = 1.1;
/// Rotation per wheel step, in degrees.
pub const ROTATE_STEP_DEG: f64 = 10.0;

/// Result of [`AerialImage::georeference`].
#[derive(Clone, Debug, Serialize)]
pub struct GeorefDecision {
    pub outcome: GeorefOutcome,
    pub accepted: bool,
}

#[derive(Clone, Debug)]
pub struct AerialImage {
    id: String,
    meta: AerialMeta,
    source: AerialSource,
    placement: Placement,
    state: TransformState,
}

impl AerialImage {
    /// New image at its metadata-derived default placement.
    pub fn new(id: impl Into<String>, meta: AerialMeta, source: AerialSource) -> Self {
        let placement = Placement::new(meta.origin, Self::original_transform_for(&meta));
        Self {
            id: id.into(),
            meta,
            source,
            placement,
            state: TransformState::Original,
        }
    }

    /// Restore a persisted placement.
    pub fn from_record(
        id: impl Into<String>,
        meta: AerialMeta,
        source: AerialSource,
        record: &PlacementRecord,
    ) -> Result<Self, RefinementError> {
        let placement = Placement::new(record.position, record.transform);
        if !placement.is_linear() {
            return Err(RefinementError::Precondition(
                "persisted item transform has a translation component".into(),
            ));
        }
        let mut image = Self {
            id: id.into(),
            meta,
            source,
            placement,
            state: TransformState::Changed,
        };
        image.state = if record.locked {
            TransformState::Locked
        } else {
            image.unlocked_state()
        };
        Ok(image)
    }

    pub fn record(&self) -> PlacementRecord {
        PlacementRecord {
            position: self.placement.position,
            transform: self.placement.transform,
            locked: self.state == TransformState::Locked,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn meta(&self) -> &AerialMeta {
        &self.meta
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn state(&self) -> TransformState {
        self.state
    }

    pub fn source(&self) -> &AerialSource {
        &self.source
    }

    pub fn availability(&self) -> Availability {
        self.source.availability()
    }

    pub fn set_source(&mut self, source: AerialSource) {
        self.source = source;
    }

    /// Interaction is possible once a raster is shown and the placement is
    /// not locked.
    pub fn is_movable(&self) -> bool {
        self.availability() >= Availability::Preview && self.state != TransformState::Locked
    }

    fn original_transform_for(meta: &AerialMeta) -> AffineTransform {
        let scale = meta.radius_bild * meta.scale_cartesian2map / (DISPLAY_WIDTH as f64 / 2.0);
        AffineTransform::from_scale(scale)
    }

    /// Default item transform derived from the image metadata.
    pub fn original_transform(&self) -> AffineTransform {
        Self::original_transform_for(&self.meta)
    }

    /// Display pixmap size; a square placeholder when no raster is known.
    pub fn pixmap_size(&self) -> (usize, usize) {
        let (w, h) = self
            .source
            .display_size()
            .unwrap_or((DISPLAY_WIDTH, DISPLAY_WIDTH));
        (DISPLAY_WIDTH, pixmap_height_for(DISPLAY_WIDTH, w, h))
    }

    /// Top-left corner of the pixmap in item coordinates.
    pub fn offset(&self) -> [f64; 2] {
        let (w, h) = self.pixmap_size();
        [-(w as f64) / 2.0, -(h as f64) / 2.0]
    }

    /// Pixmap corners in WCS: top-left, top-right, bottom-right, bottom-left.
    pub fn footprint(&self) -> [[f64; 2]; 4] {
        let [x0, y0] = self.offset();
        let (w, h) = self.pixmap_size();
        let (x1, y1) = (x0 + w as f64, y0 + h as f64);
        [[x0, y0], [x1, y0], [x1, y1], [x0, y1]].map(|c| {
            let [x, y] = self.placement.map_to_scene(c);
            [x, -y]
        })
    }

    fn ensure_movable(&self, what: &str) -> Result<(), RefinementError> {
        if self.state == TransformState::Locked {
            return Err(RefinementError::Precondition(format!(
                "{what}: transform of {} is locked",
                self.id
            )));
        }
        if self.availability() < Availability::Preview {
            return Err(RefinementError::Precondition(format!(
                "{what}: {} has no raster",
                self.id
            )));
        }
        Ok(())
    }

    /// Move by a scene-space offset.
    pub fn translate_by(&mut self, dx: f64, dy: f64) -> Result<(), RefinementError> {
        self.ensure_movable("translate")?;
        self.placement.position[0] += dx;
        self.placement.position[1] += dy;
        self.state = TransformState::Changed;
        Ok(())
    }

    /// Scale by `ZOOM_STEP^steps` about the item-local point `local`.
    pub fn zoom_at(&mut self, local: [f64; 2], steps: f64) -> Result<(), RefinementError> {
        self.ensure_movable("zoom")?;
        let s = ZOOM_STEP.powf(steps);
        self.apply_about(local, &AffineTransform::from_scale(s));
        Ok(())
    }

    /// Rotate by `ROTATE_STEP_DEG · steps` about the item-local point `local`,
    /// clockwise on screen for positive steps.
    pub fn rotate_at(&mut self, local: [f64; 2], steps: f64) -> Result<(), RefinementError> {
        self.ensure_movable("rotate")?;
        let angle = (ROTATE_STEP_DEG * steps).to_radians();
        self.apply_about(local, &AffineTransform::from_rotation(angle));
        Ok(())
    }

    fn apply_about(&mut self, [x, y]: [f64; 2], linear: &AffineTransform) {
        let about = AffineTransform::from_translation(x, y)
            .compose(linear)
            .compose(&AffineTransform::from_translation(-x, -y));
        self.placement.compose_local(&about);
        self.state = TransformState::Changed;
    }

    /// Back to the metadata default.
    pub fn reset_transform(&mut self) -> Result<(), RefinementError> {
        if self.state == TransformState::Locked {
            return Err(RefinementError::Precondition(format!(
                "reset: transform of {} is locked",
                self.id
            )));
        }
        self.placement = Placement::new(self.meta.origin, self.original_transform());
        self.state = TransformState::Original;
        Ok(())
    }

    pub fn lock(&mut self) {
        self.state = TransformState::Locked;
    }

    pub fn unlock(&mut self) {
        if self.state == TransformState::Locked {
            self.state = self.unlocked_state();
        }
    }

    fn unlocked_state(&self) -> TransformState {
        let original = Placement::new(self.meta.origin, self.original_transform());
        if self.placement == original {
            TransformState::Original
        } else {
            TransformState::Changed
        }
    }

    /// Native pixel → world transform of the current placement for a raster
    /// `native_width` pixels wide.
    pub fn native_to_world(&self, native_width: usize) -> AffineTransform {
        let k = display_scale(native_width);
        let [ox, oy] = self.offset();
        let top_left = self.placement.map_to_scene([ox, oy]);
        let linear = self.placement.transform.scale_linear(k);
        linear
            .with_translation(nalgebra::Vector2::new(top_left[0], top_left[1]))
            .flip_y()
    }

    /// Convert a native pixel → world transform back into a placement.
    pub fn placement_from_world(&self, native_to_world: &AffineTransform, native_width: usize) -> Placement {
        let k = display_scale(native_width);
        let scene = native_to_world.flip_y();
        let linear = scene.linear_only().scale_linear(1.0 / k);
        let [ox, oy] = self.offset();
        let lo = linear.apply([ox, oy]);
        let t = scene.translation();
        Placement::new([t[0] - lo[0], t[1] - lo[1]], linear)
    }

    /// Refine the placement against `dataset` and apply it tentatively.
    ///
    /// Fails without touching the image when the placement is locked, the
    /// image is not backed by its full raster, or refinement fails.
    pub fn preview_georeference(
        &mut self,
        refiner: &Refiner,
        dataset: &dyn RasterDataset,
    ) -> Result<GeorefPreview<'_>, RefinementError> {
        if self.state == TransformState::Locked {
            return Err(RefinementError::Precondition(format!(
                "transform of {} is locked",
                self.id
            )));
        }
        if self.availability() != Availability::Image || dataset.is_preview() {
            return Err(RefinementError::Precondition(format!(
                "{} is not backed by its full raster",
                self.id
            )));
        }
        if !self.placement.is_linear() {
            return Err(RefinementError::Precondition(
                "item transform has a translation component".into(),
            ));
        }

        let native_width = dataset.width();
        let initial = self.native_to_world(native_width);
        let refined = refiner.refine_transform(dataset, &initial)?;

        let previous = self.placement;
        let proposed = self.placement_from_world(&refined.transform, native_width);
        let shift = ((previous.position[0] - proposed.position[0]).powi(2)
            + (previous.position[1] - proposed.position[1]).powi(2))
        .sqrt();
        let ratio = scale_ratio(&previous.transform, &proposed.transform).ok_or_else(|| {
            RefinementError::MatchingFailure("refined item transform is degenerate".into())
        })?;
        let [ox, oy] = self.offset();
        let overlay = refined
            .display_pairs(native_width)
            .iter()
            .map(|p| OverlayPoint {
                aerial: [p.aerial[0] + ox, p.aerial[1] + oy],
                ortho: [p.ortho[0] + ox, p.ortho[1] + oy],
            })
            .collect();
        info!(
            "{} georeferenced: {} homologous points; shift {:.2}; scale {:.2}",
            self.id, refined.point_count, shift, ratio
        );
        let outcome = GeorefOutcome {
            refined,
            previous,
            proposed,
            shift,
            scale_ratio: ratio,
            overlay,
        };
        Ok(GeorefPreview::open(self, outcome))
    }

    /// Preview, ask `decide`, then accept or reject.
    pub fn georeference(
        &mut self,
        refiner: &Refiner,
        dataset: &dyn RasterDataset,
        decide: impl FnOnce(&GeorefPreview<'_>) -> bool,
    ) -> Result<GeorefDecision, RefinementError> {
        let preview = self.preview_georeference(refiner, dataset)?;
        let accepted = decide(&preview);
        let outcome = if accepted {
            preview.accept()
        } else {
            preview.reject()
        };
        Ok(GeorefDecision { outcome, accepted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn meta() -> AerialMeta {
        AerialMeta {
            radius_bild: 1500.0,
            scale_cartesian2map: 0.5,
            origin: [1000.0, -2000.0],
        }
    }

    fn image() -> AerialImage {
        AerialImage::new(
            "film/0042",
            meta(),
            AerialSource::Image {
                width: 6000,
                height: 4000,
            },
        )
    }

    #[test]
    fn default_placement_uses_metadata_scale() {
        let img = image();
        assert_eq!(img.state(), TransformState::Original);
        assert_relative_eq!(img.placement().transform.uniform_scale(), 0.5, epsilon = 1e-12);
        assert_eq!(img.pixmap_size(), (3000, 2000));
        assert_eq!(img.offset(), [-1500.0, -1000.0]);
    }

    #[test]
    fn zoom_keeps_point_under_cursor() {
        let mut img = image();
        let cursor = [120.0, -340.0];
        let before = img.placement().map_to_scene(cursor);
        img.zoom_at(cursor, 3.0).unwrap();
        let after = img.placement().map_to_scene(cursor);
        assert_relative_eq!(before[0], after[0], epsilon = 1e-9);
        assert_relative_eq!(before[1], after[1], epsilon = 1e-9);
        assert!(img.placement().is_linear());
        assert_relative_eq!(
            img.placement().transform.uniform_scale(),
            0.5 * 1.1f64.powi(3),
            epsilon = 1e-12
        );
        assert_eq!(img.state(), TransformState::Changed);
    }

    #[test]
    fn rotate_keeps_point_under_cursor() {
        let mut img = image();
        let cursor = [-800.0, 55.0];
        let before = img.placement().map_to_scene(cursor);
        img.rotate_at(cursor, -2.5).unwrap();
        let after = img.placement().map_to_scene(cursor);
        assert_relative_eq!(before[0], after[0], epsilon = 1e-9);
        assert_relative_eq!(before[1], after[1], epsilon = 1e-9);
        assert!(img.placement().is_linear());
    }

    #[test]
    fn locked_image_refuses_interaction() {
        let mut img = image();
        img.lock();
        assert!(!img.is_movable());
        assert!(matches!(
            img.translate_by(1.0, 1.0),
            Err(RefinementError::Precondition(_))
        ));
        assert!(img.reset_transform().is_err());
        img.unlock();
        assert_eq!(img.state(), TransformState::Original);
        img.translate_by(1.0, 0.0).unwrap();
        img.lock();
        img.unlock();
        assert_eq!(img.state(), TransformState::Changed);
        img.reset_transform().unwrap();
        assert_eq!(img.state(), TransformState::Original);
    }

    #[test]
    fn native_transform_roundtrips_to_placement() {
        let mut img = image();
        img.rotate_at([10.0, 20.0], 1.3).unwrap();
        let t = img.native_to_world(6000);
        let back = img.placement_from_world(&t, 6000);
        assert!(back.transform.max_abs_diff(&img.placement().transform) < 1e-12);
        assert_relative_eq!(back.position[0], img.placement().position[0], epsilon = 1e-6);
        assert_relative_eq!(back.position[1], img.placement().position[1], epsilon = 1e-6);
        // Native top-left corner lands on the footprint's first corner.
        let corner = t.apply([0.0, 0.0]);
        let fp = img.footprint()[0];
        assert_relative_eq!(corner[0], fp[0], epsilon = 1e-6);
        assert_relative_eq!(corner[1], fp[1], epsilon = 1e-6);
    }

    #[test]
    fn record_restores_state() {
        let mut img = image();
        let rec = img.record();
        let again = AerialImage::from_record("x", meta(), *img.source(), &rec).unwrap();
        assert_eq!(again.state(), TransformState::Original);
        img.translate_by(5.0, 0.0).unwrap();
        img.lock();
        let locked = AerialImage::from_record("x", meta(), *img.source(), &img.record()).unwrap();
        assert_eq!(locked.state(), TransformState::Locked);
        assert_eq!(locked.placement(), img.placement());
    }
}

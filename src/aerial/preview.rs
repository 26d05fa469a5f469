use super::placement::{Placement, TransformState};
use super::AerialImage;
use crate::refine::RefinedTransform;
use log::debug;
use serde::Serialize;

/// A matched pair in item-local display coordinates, for drawing the
/// correction as a point at `aerial` and a line to `ortho`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct OverlayPoint {
    pub aerial: [f64; 2],
    pub ortho: [f64; 2],
}

/// What a refinement would change, computed before the caller decides.
#[derive(Clone, Debug, Serialize)]
pub struct GeorefOutcome {
    pub refined: RefinedTransform,
    /// Placement before the refinement.
    pub previous: Placement,
    /// Placement shown while the preview is open.
    pub proposed: Placement,
    /// Distance between the old and new item positions (scene units).
    pub shift: f64,
    /// `sqrt(det(new item transform) / det(old item transform))`.
    pub scale_ratio: f64,
    pub overlay: Vec<OverlayPoint>,
}

/// Tentatively applied refinement.
///
/// The proposed placement is live on the image while the guard exists.
/// [`accept`](Self::accept) keeps it; [`reject`](Self::reject) or dropping
/// the guard restores the previous placement and transform state exactly.
pub struct GeorefPreview<'a> {
    image: &'a mut AerialImage,
    previous_state: TransformState,
    outcome: Option<GeorefOutcome>,
}

impl<'a> GeorefPreview<'a> {
    pub(super) fn open(image: &'a mut AerialImage, outcome: GeorefOutcome) -> Self {
        let previous_state = image.state;
        image.placement = outcome.proposed;
        image.state = TransformState::Changed;
        Self {
            image,
            previous_state,
            outcome: Some(outcome),
        }
    }

    pub fn outcome(&self) -> &GeorefOutcome {
        match &self.outcome {
            Some(outcome) => outcome,
            None => unreachable!("outcome is only taken when the preview is consumed"),
        }
    }

    /// The image as currently shown.
    pub fn image(&self) -> &AerialImage {
        self.image
    }

    pub fn accept(mut self) -> GeorefOutcome {
        let outcome = self.take_outcome();
        debug!("georeference preview of {} accepted", self.image.id());
        outcome
    }

    pub fn reject(mut self) -> GeorefOutcome {
        self.restore();
        self.take_outcome()
    }

    fn take_outcome(&mut self) -> GeorefOutcome {
        match self.outcome.take() {
            Some(outcome) => outcome,
            None => unreachable!("a preview is consumed once"),
        }
    }

    fn restore(&mut self) {
        if let Some(outcome) = &self.outcome {
            self.image.placement = outcome.previous;
            self.image.state = self.previous_state;
            debug!("georeference preview of {} rejected", self.image.id());
        }
    }
}

impl Drop for GeorefPreview<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}

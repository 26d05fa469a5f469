use crate::affine::AffineTransform;
use crate::aerial::OverlayPoint;
use crate::error::RefinementError;
use crate::refine::RefinedTransform;
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDescriptor {
    pub path: String,
    pub width: usize,
    pub height: usize,
    pub bands: usize,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ReportOutcome {
    Refined {
        result: RefinedTransform,
        /// Item-position shift of the preview, in scene units.
        display_shift: f64,
        overlay: Vec<OverlayPoint>,
    },
    Failed {
        kind: &'static str,
        message: String,
        recoverable: bool,
    },
}

impl ReportOutcome {
    pub fn failed(err: &RefinementError) -> Self {
        let kind = match err {
            RefinementError::Precondition(_) => "precondition",
            RefinementError::MatchingFailure(_) => "matching_failure",
            RefinementError::Io(_) => "io_failure",
        };
        Self::Failed {
            kind,
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeorefReport {
    pub aerial: InputDescriptor,
    pub reference: InputDescriptor,
    pub reference_gsd: f64,
    pub initial: AffineTransform,
    pub outcome: ReportOutcome,
    pub total_ms: f64,
}

impl GeorefReport {
    pub fn refined(&self) -> Option<&RefinedTransform> {
        match &self.outcome {
            ReportOutcome::Refined { result, .. } => Some(result),
            ReportOutcome::Failed { .. } => None,
        }
    }
}

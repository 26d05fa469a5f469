//! Error taxonomy shared by the refiner, the raster layer and the matcher.
//!
//! - [`RasterError`]: a raster could not be opened, decoded or windowed.
//! - [`MatchError`]: the homologous-point finder produced no usable fit.
//! - [`RefinementError`]: what callers of [`crate::refine::Refiner`] and
//!   [`crate::aerial::AerialImage`] see. Precondition violations are fatal to
//!   the call; matching and I/O failures are recoverable and leave the
//!   caller's transform untouched.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("failed to open {path}: {reason}")]
    Open { path: PathBuf, reason: String },
    #[error("unsupported band count {0} (expected 1 or 3)")]
    UnsupportedBands(usize),
    #[error("window {x},{y} {w}x{h} outside raster of {width}x{height}")]
    Window {
        x: usize,
        y: usize,
        w: usize,
        h: usize,
        width: usize,
        height: usize,
    },
    #[error("raster buffer of {got} bytes does not match {w}x{h}x{bands}")]
    BufferSize {
        w: usize,
        h: usize,
        bands: usize,
        got: usize,
    },
    #[error("invalid world file: {0}")]
    WorldFile(String),
}

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("aerial footprint does not overlap the reference")]
    NoOverlap,
    #[error("too few homologous points: need {needed}, found {found}")]
    TooFewMatches { needed: usize, found: usize },
    #[error("degenerate geometry: {0}")]
    Degenerate(String),
    #[error(transparent)]
    Raster(#[from] RasterError),
}

#[derive(Debug, Error)]
pub enum RefinementError {
    #[error("precondition violated: {0}")]
    Precondition(String),
    #[error("automatic georeferencing failed: {0}")]
    MatchingFailure(String),
    #[error("raster I/O failed: {0}")]
    Io(#[from] RasterError),
}

impl RefinementError {
    /// Matching and I/O failures leave the caller's state unchanged and may be
    /// retried; precondition violations are caller bugs.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Precondition(_))
    }
}

impl From<MatchError> for RefinementError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::Raster(raster) => Self::Io(raster),
            other => Self::MatchingFailure(other.to_string()),
        }
    }
}

//! Serializable reports for the command-line tools.
//!
//! [`GeorefReport`] records one georeferencing run: what went in, the refined
//! transform or the failure, and the stage timings.

pub mod report;
pub mod timing;

pub use report::{GeorefReport, InputDescriptor, ReportOutcome};
pub use timing::{StageTiming, TimingBreakdown};

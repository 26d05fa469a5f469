//! Affine estimation from point correspondences.
//!
//! [`fit_affine_lsq`] solves the over-determined least-squares problem on
//! Hartley-normalized points; [`fit_affine_ransac`] wraps it in a RANSAC loop
//! with 3-point minimal samples and a final refit on the inliers.
mod lsq;
mod ransac;

pub use lsq::{fit_affine_lsq, residual};
pub use ransac::{fit_affine_ransac, RansacOptions, RansacResult};

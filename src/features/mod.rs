//! Local image features used by the matcher: gradients, Harris corners and
//! normalized cross-correlation template search.
pub mod grad;
pub mod harris;
pub mod ncc;

pub use harris::{detect_corners, Corner, CornerOptions};
pub use ncc::{search_ncc, Patch, SearchHit};

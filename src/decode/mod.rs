//! Display decoding off the host thread.
//!
//! A [`PixmapLoader`] per image submits [`DecodeRequest`]s to a shared
//! [`WorkerPool`] and keeps only the newest result: requests carry increasing
//! [`RequestToken`]s, the latest token lives behind one lock, and the finished
//! pixmap sits in a single-slot [`Mailbox`] behind another. Results of
//! superseded requests are dropped even when they complete last.
mod loader;
mod mailbox;
mod pixmap;
mod pool;

pub use loader::{
    DecodeRequest, Delivered, FileDecoder, Notify, PixmapDecoder, PixmapLoader, RequestToken,
};
pub use mailbox::Mailbox;
pub use pixmap::{
    decode_pixmap, enhance_contrast, pixmap_height_for, rotate_ccw, ContrastEnhancement, Pixmap,
};
pub use pool::WorkerPool;

use super::mailbox::Mailbox;
use super::pixmap::{decode_pixmap, ContrastEnhancement, Pixmap};
use super::pool::WorkerPool;
use crate::error::RasterError;
use crate::raster::{PreviewRect, Raster};
use crate::DISPLAY_WIDTH;
use log::{debug, warn};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonically increasing id of a decode request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Everything that determines the decoded pixmap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeRequest {
    pub path: PathBuf,
    /// Crop of `path` with its view rotation; `None` decodes the whole raster.
    pub preview: Option<PreviewRect>,
    pub contrast: ContrastEnhancement,
}

/// Turns a request into a pixmap. Runs on a worker thread.
pub trait PixmapDecoder: Send + Sync {
    fn decode(&self, request: &DecodeRequest) -> Result<Pixmap, RasterError>;
}

/// Decodes image files with the `image` crate.
#[derive(Clone, Debug)]
pub struct FileDecoder {
    pub width: usize,
}

impl Default for FileDecoder {
    fn default() -> Self {
        Self {
            width: DISPLAY_WIDTH,
        }
    }
}

impl PixmapDecoder for FileDecoder {
    fn decode(&self, request: &DecodeRequest) -> Result<Pixmap, RasterError> {
        let raster = Raster::open(&request.path)?;
        let (rect, rotation) = match request.preview {
            Some(p) => (Some(p.rect), p.rotation_ccw),
            None => (None, 0),
        };
        decode_pixmap(&raster, rect, rotation, self.width, request.contrast)
    }
}

/// A pixmap whose request was still the latest when it completed.
#[derive(Clone, Debug)]
pub struct Delivered {
    pub token: RequestToken,
    pub pixmap: Pixmap,
}

pub type Notify = Arc<dyn Fn(RequestToken) + Send + Sync>;

struct InFlight {
    token: RequestToken,
    cancel: Arc<AtomicBool>,
}

struct Shared {
    next_token: AtomicU64,
    /// Latest request. Also held while writing `pending` so that a stale
    /// completion can never overwrite a newer one.
    last_requested: Mutex<Option<InFlight>>,
    pending: Mailbox<Delivered>,
    notify: Option<Notify>,
}

impl Shared {
    fn deliver(&self, token: RequestToken, pixmap: Pixmap) -> bool {
        {
            let last = self.last_requested.lock();
            if last.as_ref().map(|f| f.token) != Some(token) {
                debug!("PixmapLoader: discarding stale result {}", token.0);
                return false;
            }
            self.pending.put(Delivered { token, pixmap });
        }
        if let Some(notify) = &self.notify {
            notify(token);
        }
        true
    }
}

/// Latest-wins display decoding for one image.
///
/// Each [`request`](Self::request) supersedes the previous one: the older
/// job is cancelled if it has not started and its result is discarded if it
/// still arrives. The host polls the single-slot result with
/// [`take`](Self::take), typically after the `notify` callback fired.
pub struct PixmapLoader {
    pool: Arc<WorkerPool>,
    decoder: Arc<dyn PixmapDecoder>,
    shared: Arc<Shared>,
    requested: Mutex<Option<DecodeRequest>>,
}

impl PixmapLoader {
    pub fn new(pool: Arc<WorkerPool>, decoder: Arc<dyn PixmapDecoder>) -> Self {
        Self::build(pool, decoder, None)
    }

    /// `notify` runs on the worker thread after a valid completion.
    pub fn with_notify(pool: Arc<WorkerPool>, decoder: Arc<dyn PixmapDecoder>, notify: Notify) -> Self {
        Self::build(pool, decoder, Some(notify))
    }

    fn build(pool: Arc<WorkerPool>, decoder: Arc<dyn PixmapDecoder>, notify: Option<Notify>) -> Self {
        Self {
            pool,
            decoder,
            shared: Arc::new(Shared {
                next_token: AtomicU64::new(1),
                last_requested: Mutex::new(None),
                pending: Mailbox::new(),
                notify,
            }),
            requested: Mutex::new(None),
        }
    }

    /// Submit `request` unless it equals the previous one.
    pub fn request(&self, request: DecodeRequest) -> Option<RequestToken> {
        {
            let mut requested = self.requested.lock();
            if requested.as_ref() == Some(&request) {
                return None;
            }
            *requested = Some(request.clone());
        }
        let token = RequestToken(self.shared.next_token.fetch_add(1, Ordering::Relaxed));
        let cancel = Arc::new(AtomicBool::new(false));
        {
            let mut last = self.shared.last_requested.lock();
            if let Some(prev) = last.replace(InFlight {
                token,
                cancel: cancel.clone(),
            }) {
                prev.cancel.store(true, Ordering::Relaxed);
            }
        }

        let shared = self.shared.clone();
        let decoder = self.decoder.clone();
        self.pool.spawn(move || {
            if cancel.load(Ordering::Relaxed) {
                debug!("PixmapLoader: request {} cancelled before start", token.0);
                return;
            }
            match decoder.decode(&request) {
                Ok(pixmap) => {
                    shared.deliver(token, pixmap);
                }
                Err(err) => warn!("decoding {} failed: {err}", request.path.display()),
            }
        });
        Some(token)
    }

    /// Hand a finished pixmap to the loader as a worker would. Returns `false`
    /// when `token` is no longer the latest request.
    pub fn deliver(&self, token: RequestToken, pixmap: Pixmap) -> bool {
        self.shared.deliver(token, pixmap)
    }

    /// Take the pending pixmap, if any.
    pub fn take(&self) -> Option<Delivered> {
        self.shared.pending.take()
    }

    pub fn last_requested(&self) -> Option<RequestToken> {
        self.shared.last_requested.lock().as_ref().map(|f| f.token)
    }
}

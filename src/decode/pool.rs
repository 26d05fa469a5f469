use log::debug;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// Bounded pool of reader threads shared by every [`super::PixmapLoader`].
///
/// The host owns the pool and hands it to loaders behind an `Arc`. Dropping
/// the last handle does not wait: queued jobs still run on the worker threads,
/// which exit once the queue is empty.
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// `threads == 0` picks rayon's default (one per logical CPU).
    pub fn new(threads: usize) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("aerial-reader-{i}"))
            .build()?;
        debug!("WorkerPool: {} threads", pool.current_num_threads());
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queue `job` without blocking the caller.
    pub fn spawn(&self, job: impl FnOnce() + Send + 'static) {
        self.pool.spawn(job);
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads())
            .finish()
    }
}

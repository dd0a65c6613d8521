//! Deferred reclamation of detached subtrees.
//!
//! Freeing a large subtree can take milliseconds, so pruned subtrees are
//! queued here and dropped by a background thread instead of on a search
//! worker. The queue has its own lock, held only to push or to swap the
//! queue out.

use crate::node::Node;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

/// How often the background thread drains the queue.
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_millis(100);

/// Errors that can occur while starting a collector.
#[derive(Debug, Error)]
pub enum GcError {
    #[error("Failed to spawn collector thread: {0}")]
    Spawn(#[from] std::io::Error),
}

static GLOBAL: Lazy<Arc<NodeGarbageCollector>> = Lazy::new(|| {
    Arc::new(
        NodeGarbageCollector::new(DEFAULT_GC_INTERVAL)
            .expect("failed to start the node garbage collector"),
    )
});

#[derive(Default)]
struct Shared {
    queue: Mutex<Vec<Box<Node>>>,
    stop: AtomicBool,
    enqueued: AtomicU64,
    released: AtomicU64,
}

impl Shared {
    fn collect(&self) -> usize {
        let mut total = 0;
        loop {
            let batch = std::mem::take(
                &mut *self.queue.lock().unwrap_or_else(PoisonError::into_inner),
            );
            if batch.is_empty() {
                break;
            }
            total += batch.len();
            // Dropped outside the lock.
            drop(batch);
        }
        self.released.fetch_add(total as u64, Ordering::Relaxed);
        total
    }
}

/// Owner of detached subtrees until a background thread frees them.
pub struct NodeGarbageCollector {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    interval: Duration,
}

impl NodeGarbageCollector {
    /// Start a collector draining its queue every `interval`.
    pub fn new(interval: Duration) -> Result<Self, GcError> {
        let shared = Arc::new(Shared::default());
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("node-gc".into())
            .spawn(move || {
                debug!(interval_ms = interval.as_millis() as u64, "node collector started");
                while !worker_shared.stop.load(Ordering::Acquire) {
                    thread::park_timeout(interval);
                    let freed = worker_shared.collect();
                    if freed > 0 {
                        trace!(subtrees = freed, "freed detached subtrees");
                    }
                }
                debug!("node collector stopped");
            })?;
        Ok(Self {
            shared,
            worker: Some(worker),
            interval,
        })
    }

    /// The process-wide collector used by default.
    pub fn global() -> Arc<NodeGarbageCollector> {
        Arc::clone(&GLOBAL)
    }

    /// Queue a detached subtree (the node and its sibling chain).
    pub fn add_to_queue(&self, subtree: Box<Node>) {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subtree);
        self.shared.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Free everything queued so far on the calling thread.
    ///
    /// Returns the number of subtrees freed.
    pub fn collect(&self) -> usize {
        self.shared.collect()
    }

    /// Subtrees queued over the collector's lifetime.
    pub fn enqueued(&self) -> u64 {
        self.shared.enqueued.load(Ordering::Relaxed)
    }

    /// Subtrees freed over the collector's lifetime.
    pub fn released(&self) -> u64 {
        self.shared.released.load(Ordering::Relaxed)
    }

    /// Subtrees waiting in the queue.
    pub fn pending(&self) -> usize {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for NodeGarbageCollector {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            worker.thread().unpark();
            if worker.join().is_err() {
                debug!("node collector thread panicked");
            }
        }
        self.shared.collect();
    }
}

impl std::fmt::Debug for NodeGarbageCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeGarbageCollector")
            .field("interval", &self.interval)
            .field("enqueued", &self.enqueued())
            .field("released", &self.released())
            .finish_non_exhaustive()
    }
}

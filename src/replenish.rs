//! Bounded background replenishment.
//!
//! Cache hits that leave a pool below half capacity submit the category to a
//! bounded queue drained by a fixed number of workers. A category already
//! waiting or being reloaded is not queued twice, and submissions that find
//! the queue full are dropped: replenishment is best effort, and a request
//! that later misses the cache reloads synchronously anyway.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::category::Category;
use crate::pipeline::FetchPipeline;

/// Producer side of the replenish queue, cloned into the cache store.
#[derive(Clone)]
pub struct ReplenishHandle {
    tx: mpsc::Sender<&'static Category>,
    pending: Arc<Mutex<HashSet<&'static str>>>,
}

/// Consumer side of the replenish queue.
pub struct ReplenishQueue {
    rx: Arc<AsyncMutex<mpsc::Receiver<&'static Category>>>,
    pending: Arc<Mutex<HashSet<&'static str>>>,
}

/// Create a queue holding at most `capacity` pending categories.
pub fn channel(capacity: usize) -> (ReplenishHandle, ReplenishQueue) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = ReplenishHandle {
        tx,
        pending: Arc::new(Mutex::new(HashSet::new())),
    };
    let queue = ReplenishQueue {
        rx: Arc::new(AsyncMutex::new(rx)),
        pending: Arc::clone(&handle.pending),
    };
    (handle, queue)
}

impl ReplenishHandle {
    /// Queue a replenish for `category`. Returns whether a job was queued.
    pub fn submit(&self, category: &'static Category) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if !pending.insert(category.key) {
            return false;
        }

        match self.tx.try_send(category) {
            Ok(()) => {
                debug!(category = category.key, "replenish queued");
                true
            }
            Err(TrySendError::Full(_)) => {
                pending.remove(category.key);
                debug!(category = category.key, "replenish queue full, dropping job");
                false
            }
            Err(TrySendError::Closed(_)) => {
                pending.remove(category.key);
                false
            }
        }
    }

    /// Whether a job for `key` is queued or running.
    pub fn is_pending(&self, key: &str) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

impl ReplenishQueue {
    /// Wait for the next queued category. `None` once every handle is dropped.
    pub async fn next(&self) -> Option<&'static Category> {
        self.rx.lock().await.recv().await
    }

    /// Mark a job finished so the category can be queued again.
    pub fn complete(&self, category: &'static Category) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(category.key);
    }

    /// Start `workers` tasks draining this queue into `pipeline`.
    pub fn spawn_workers(self, pipeline: Arc<FetchPipeline>, workers: usize) -> Vec<JoinHandle<()>> {
        let queue = Arc::new(self);
        (0..workers.max(1))
            .map(|worker| {
                let queue = Arc::clone(&queue);
                let pipeline = Arc::clone(&pipeline);
                tokio::spawn(async move {
                    while let Some(category) = queue.next().await {
                        let job = {
                            let pipeline = Arc::clone(&pipeline);
                            tokio::spawn(async move { pipeline.replenish(category).await })
                        };
                        if let Err(err) = job.await {
                            error!(worker, category = category.key, error = %err, "replenish job aborted");
                        }
                        queue.complete(category);
                    }
                    debug!(worker, "replenish worker stopped");
                })
            })
            .collect()
    }
}

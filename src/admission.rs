use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::warn;

/// No permit became available before the admission timeout.
#[derive(Debug, Clone, Copy, Error)]
#[error("server is busy, no capacity freed up within {timeout:?}")]
pub struct Overloaded {
    pub timeout: Duration,
}

/// Fixed budget of requests allowed in flight at once.
#[derive(Clone)]
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
    capacity: usize,
    timeout: Duration,
}

impl AdmissionGate {
    pub fn new(capacity: usize, timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            timeout,
        }
    }

    /// Run `body` while holding one permit.
    ///
    /// The permit is released when `body` finishes, whether it returns,
    /// panics or is cancelled. If no permit frees up within the timeout,
    /// `body` never runs.
    pub async fn with_permit<F, R>(&self, body: F) -> Result<R, Overloaded>
    where
        F: Future<Output = R>,
    {
        let _permit = match tokio::time::timeout(self.timeout, self.permits.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) | Err(_) => {
                warn!(
                    capacity = self.capacity,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "admission permit unavailable"
                );
                return Err(Overloaded { timeout: self.timeout });
            }
        };

        Ok(body.await)
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

//! Process-wide bound on concurrent acquisitions.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::core::error::RelayError;

/// Counting gate in front of the acquisition engine.
///
/// A permit is held for the whole download + remediation of one request and
/// released when it is dropped, whatever the outcome. Waiters are served in
/// FIFO order (tokio's semaphore is fair).
#[derive(Clone)]
pub struct DownloadGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    wait_limit: Option<Duration>,
}

impl DownloadGate {
    pub fn new(capacity: usize, wait_limit: Option<Duration>) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            wait_limit,
        }
    }

    /// Waits for a free slot.
    ///
    /// Returns [`RelayError::Busy`] if a wait limit is configured and it
    /// expires first.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, RelayError> {
        let permit = self.semaphore.clone().acquire_owned();
        let result = match self.wait_limit {
            Some(limit) => tokio::time::timeout(limit, permit).await.map_err(|_| RelayError::Busy)?,
            None => permit.await,
        };
        result.map_err(|_| RelayError::Unexpected("download gate closed".to_string()))
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

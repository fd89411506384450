//! Process-wide bound on concurrent screenshot renders

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting limiter shared by every run of an orchestrator
///
/// Cloning shares the same slots. `acquire` waits without a timeout.
#[derive(Clone, Debug)]
pub struct ScreenshotLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// A held render slot, released on drop
#[derive(Debug)]
pub struct ScreenshotPermit {
    _permit: OwnedSemaphorePermit,
}

impl ScreenshotLimiter {
    /// Limiter with `capacity` slots (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot
    pub async fn acquire(&self) -> crate::Result<ScreenshotPermit> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| crate::Error::Other("screenshot limiter closed".into()))?;
        Ok(ScreenshotPermit { _permit: permit })
    }

    /// Slots currently held
    pub fn in_use(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    /// Total slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

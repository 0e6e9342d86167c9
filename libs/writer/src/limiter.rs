use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{Result, WriterError};

/// Bounds the number of concurrently outstanding bulk requests.
#[derive(Debug, Clone)]
pub struct InFlightLimiter {
    permits: Arc<Semaphore>,
    max: usize,
}

/// Slot held by one in-flight batch. Dropping it frees the slot.
#[derive(Debug)]
pub struct InFlightPermit {
    _permit: OwnedSemaphorePermit,
}

impl InFlightPermit {
    pub fn release(self) {}
}

impl InFlightLimiter {
    pub fn new(max: usize) -> Self {
        Self { permits: Arc::new(Semaphore::new(max)), max }
    }

    /// Wait for a free slot. Fails with `Stopped` once the limiter is closed.
    pub async fn acquire(&self) -> Result<InFlightPermit> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| WriterError::Stopped)?;
        Ok(InFlightPermit { _permit: permit })
    }

    /// Wake pending `acquire` calls with `Stopped`.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

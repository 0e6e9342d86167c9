use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, WriterError};
use crate::state::WriterState;

/// Blocks callers until everything accepted before the call is resolved.
///
/// A flush is a barrier over op ids: it covers operations accepted before it
/// started and ignores later ones, so concurrent intake cannot starve it.
#[derive(Clone)]
pub struct FlushCoordinator {
    state: Arc<WriterState>,
}

/// Keeps the batcher sealing partial batches while a flush is waiting.
struct FlushRequest<'a> {
    state: &'a WriterState,
    watermark: u64,
}

impl<'a> FlushRequest<'a> {
    fn begin(state: &'a WriterState) -> Self {
        let watermark = state.begin_flush();
        Self { state, watermark }
    }
}

impl Drop for FlushRequest<'_> {
    fn drop(&mut self) {
        self.state.end_flush();
    }
}

impl FlushCoordinator {
    pub fn new(state: Arc<WriterState>) -> Self {
        Self { state }
    }

    /// Wait up to `timeout` for every previously accepted operation to be
    /// acknowledged or dropped.
    ///
    /// A fatal error wins over the timeout. On timeout the writer stays usable.
    pub async fn flush(&self, timeout: Duration) -> Result<()> {
        let request = FlushRequest::begin(&self.state);
        tracing::debug!(watermark = request.watermark, "flush requested");

        match tokio::time::timeout(timeout, self.state.wait_flushed(request.watermark)).await {
            Ok(result) => result,
            Err(_) => {
                if let Some(err) = self.state.fatal() {
                    return Err(err);
                }
                let outstanding = self.state.outstanding_before(request.watermark);
                tracing::warn!(outstanding, timeout_ms = timeout.as_millis() as u64, "flush timed out");
                Err(WriterError::FlushTimeout { outstanding })
            }
        }
    }
}

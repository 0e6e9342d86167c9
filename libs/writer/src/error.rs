use sink_api::{TransportError, TransportErrorKind};

/// Errors surfaced by the writer to its host.
///
/// `Clone` so the first fatal error can be handed back to every caller
/// until the writer is stopped.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WriterError {
    #[error("configuration: {0}")]
    Configuration(String),

    #[error("invalid record {topic}-{partition}@{offset}: {reason}")]
    InvalidRecord {
        topic: String,
        partition: i32,
        offset: i64,
        reason: String,
    },

    #[error("transport connectivity: {0}")]
    TransportConnectivity(String),

    #[error("engine overloaded: {0}")]
    EngineOverload(String),

    #[error("transport request failed: {0}")]
    Transport(String),

    #[error("document rejected by index '{index}' (id {id:?}): {reason}")]
    DocumentRejected {
        index: String,
        id: Option<String>,
        reason: String,
    },

    #[error("batch failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        source: Box<WriterError>,
    },

    #[error("flush timed out with {outstanding} operations outstanding")]
    FlushTimeout { outstanding: usize },

    #[error("no buffer space within {timeout_ms} ms")]
    IntakeTimeout { timeout_ms: u64 },

    #[error("writer is stopped")]
    Stopped,

    #[error("pipeline failed: {0}")]
    Fatal(Box<WriterError>),
}

impl WriterError {
    /// Connectivity and overload failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WriterError::TransportConnectivity(_) | WriterError::EngineOverload(_)
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, WriterError::Fatal(_))
    }
}

impl From<TransportError> for WriterError {
    fn from(e: TransportError) -> Self {
        match e.kind() {
            TransportErrorKind::Connectivity => WriterError::TransportConnectivity(e.to_string()),
            TransportErrorKind::Overload => WriterError::EngineOverload(e.to_string()),
            TransportErrorKind::Request => WriterError::Transport(e.to_string()),
        }
    }
}

pub type Result<T, E = WriterError> = std::result::Result<T, E>;

/// Category of a transport failure. Lets the writer decide between
/// retrying a request and failing the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection refused, reset or timed out. Retried.
    Connectivity,
    /// Request-level 5xx or throttling (429). Retried.
    Overload,
    /// Malformed request, other 4xx or unreadable response. Permanent.
    Request,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportErrorKind::Connectivity => f.write_str("connectivity"),
            TransportErrorKind::Overload => f.write_str("overload"),
            TransportErrorKind::Request => f.write_str("request"),
        }
    }
}

/// Error returned by every `BulkTransport` method.
///
/// Carries a `TransportErrorKind` for classification and a human-readable
/// message from the engine or the HTTP client.
#[derive(Clone, PartialEq, Eq)]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn connectivity(msg: impl Into<String>) -> Self {
        Self { kind: TransportErrorKind::Connectivity, message: msg.into() }
    }

    pub fn overload(msg: impl Into<String>) -> Self {
        Self { kind: TransportErrorKind::Overload, message: msg.into() }
    }

    pub fn request(msg: impl Into<String>) -> Self {
        Self { kind: TransportErrorKind::Request, message: msg.into() }
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Connectivity and overload failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, TransportErrorKind::Connectivity | TransportErrorKind::Overload)
    }
}

impl std::fmt::Debug for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TransportError {}

/// Structural problem in a `Schema` tree (missing item/key/value schema).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("{ty} schema is missing its {part} schema")]
    MissingPart { ty: &'static str, part: &'static str },
}

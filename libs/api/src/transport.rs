use std::future::Future;
use std::pin::Pin;

use crate::error::TransportError;

// ════════════════════════════════════════════════════════════════
//  Bulk items and outcomes
// ════════════════════════════════════════════════════════════════

/// One document write inside a bulk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItem {
    pub index: String,
    /// Mapping type name sent with every action.
    pub type_name: String,
    /// Explicit document id; `None` lets the engine assign one.
    pub id: Option<String>,
    /// Serialized JSON document.
    pub document: String,
}

/// Per-item result of a bulk request, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Acknowledged,
    /// Permanent document-level rejection (mapping conflict, parse error).
    Rejected { reason: String },
    /// Item-level throttling or engine error; may succeed if resent.
    Retryable { reason: String },
}

/// Result of a create-if-absent request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexCreation {
    Created,
    AlreadyExists,
}

// ════════════════════════════════════════════════════════════════
//  BulkTransport
// ════════════════════════════════════════════════════════════════

/// Capability the writer needs from the search engine client.
///
/// Implementations own connection handling and the wire format; the writer
/// only sees ordered items in and ordered outcomes out.
pub trait BulkTransport: Send + Sync {
    /// Submit items in order. Returns exactly one outcome per item.
    fn submit_batch<'a>(
        &'a self,
        items: &'a [BulkItem],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ItemOutcome>, TransportError>> + Send + 'a>>;

    /// Create the index unless it already exists.
    fn create_index_if_absent<'a>(
        &'a self,
        index: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<IndexCreation, TransportError>> + Send + 'a>>;

    /// Install a field mapping for `type_name` in `index`.
    fn put_mapping<'a>(
        &'a self,
        index: &'a str,
        type_name: &'a str,
        mapping: &'a serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

    /// Release client resources.
    fn close(&self) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>>;
}

pub mod error;
pub mod schema;
pub mod transport;
pub mod types;

pub use error::{SchemaError, TransportError, TransportErrorKind};
pub use schema::{Field, LogicalType, Schema, SchemaType};
pub use transport::{BulkItem, BulkTransport, IndexCreation, ItemOutcome};
pub use types::{Record, TopicPartition};

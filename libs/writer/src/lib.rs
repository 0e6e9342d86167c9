pub mod config;
pub mod error;
pub mod mapping;
mod batch;
mod batcher;
mod buffer;
mod flush;
mod index;
mod limiter;
mod retry;
mod state;
mod topic;
mod translate;
mod writer;

pub use batch::{Batch, WriteOperation};
pub use buffer::WriterBuffer;
pub use config::{WriterConfig, parse_topic_index_map};
pub use error::{Result, WriterError};
pub use flush::FlushCoordinator;
pub use index::IndexLifecycleManager;
pub use limiter::{InFlightLimiter, InFlightPermit};
pub use retry::{BatchSummary, RetryExecutor, RetryState};
pub use state::{WriterState, WriterStats};
pub use topic::{TopicConfig, TopicConfigResolver};
pub use translate::RecordTranslator;
pub use writer::BulkWriter;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

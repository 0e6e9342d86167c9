use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::Deserialize;

use crate::error::WriterError;

// ═══════════════════════════════════════════════════════════════
//  Writer Config
// ═══════════════════════════════════════════════════════════════

/// Options recognized by the bulk writer.
#[derive(Debug, Clone, Deserialize)]
pub struct WriterConfig {
    /// Mapping type name sent with every document.
    pub type_name: String,

    /// Use engine-assigned document ids instead of record keys.
    #[serde(default)]
    pub key_ignore: bool,
    /// Serialize values as plain JSON, without schema typing.
    #[serde(default)]
    pub schema_ignore: bool,

    /// `"topic:index"` entries overriding the default index (= topic name).
    #[serde(default)]
    pub topic_index_map: Vec<String>,
    /// Topics whose keys are ignored regardless of `key_ignore`.
    #[serde(default)]
    pub topic_key_ignore: Vec<String>,
    /// Topics whose schemas are ignored regardless of `schema_ignore`.
    #[serde(default)]
    pub topic_schema_ignore: Vec<String>,

    /// Flush deadline, also bounds intake backpressure waits and the stop grace period.
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,
    /// Maximum unresolved operations (buffered + in flight) before intake blocks.
    #[serde(default = "default_max_buffered_records")]
    pub max_buffered_records: usize,
    /// Maximum operations per bulk request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Maximum wait before a partial batch is sealed.
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u64,
    /// Maximum concurrently outstanding bulk requests.
    #[serde(default = "default_max_in_flight_requests")]
    pub max_in_flight_requests: usize,
    /// Constant delay between attempts of a failed batch.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Retries after the first attempt before a batch becomes fatal.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Drop invalid records and rejected documents instead of failing.
    #[serde(default)]
    pub drop_invalid_message: bool,
}

fn default_flush_timeout_ms() -> u64 {
    10_000
}
fn default_max_buffered_records() -> usize {
    20_000
}
fn default_batch_size() -> usize {
    2_000
}
fn default_linger_ms() -> u64 {
    1
}
fn default_max_in_flight_requests() -> usize {
    5
}
fn default_retry_backoff_ms() -> u64 {
    100
}
fn default_max_retries() -> u32 {
    5
}

impl WriterConfig {
    /// Config with defaults for everything but the type name.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            key_ignore: false,
            schema_ignore: false,
            topic_index_map: Vec::new(),
            topic_key_ignore: Vec::new(),
            topic_schema_ignore: Vec::new(),
            flush_timeout_ms: default_flush_timeout_ms(),
            max_buffered_records: default_max_buffered_records(),
            batch_size: default_batch_size(),
            linger_ms: default_linger_ms(),
            max_in_flight_requests: default_max_in_flight_requests(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_retries: default_max_retries(),
            drop_invalid_message: false,
        }
    }

    pub fn validate(&self) -> Result<(), WriterError> {
        if self.type_name.trim().is_empty() {
            return Err(WriterError::Configuration("type_name must not be empty".into()));
        }
        for (name, value) in [
            ("batch_size", self.batch_size),
            ("max_buffered_records", self.max_buffered_records),
            ("max_in_flight_requests", self.max_in_flight_requests),
        ] {
            if value == 0 {
                return Err(WriterError::Configuration(format!("{name} must be at least 1")));
            }
        }
        parse_topic_index_map(&self.topic_index_map)?;
        Ok(())
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    pub fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub(crate) fn topic_key_ignore_set(&self) -> HashSet<String> {
        self.topic_key_ignore.iter().cloned().collect()
    }

    pub(crate) fn topic_schema_ignore_set(&self) -> HashSet<String> {
        self.topic_schema_ignore.iter().cloned().collect()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Helpers
// ═══════════════════════════════════════════════════════════════

/// Parse `"topic:index"` entries into a lookup map.
pub fn parse_topic_index_map(entries: &[String]) -> Result<HashMap<String, String>, WriterError> {
    let mut map = HashMap::with_capacity(entries.len());
    for entry in entries {
        let parts: Vec<&str> = entry.split(':').collect();
        match parts.as_slice() {
            [topic, index] if !topic.trim().is_empty() && !index.trim().is_empty() => {
                map.insert(topic.trim().to_string(), index.trim().to_string());
            }
            _ => {
                return Err(WriterError::Configuration(format!(
                    "topic_index_map entry '{entry}' is not 'topic:index'"
                )));
            }
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_minimal_toml() {
        let cfg: WriterConfig = toml::from_str(r#"type_name = "doc""#).unwrap();
        assert_eq!(cfg.flush_timeout_ms, 10_000);
        assert_eq!(cfg.max_buffered_records, 20_000);
        assert_eq!(cfg.batch_size, 2_000);
        assert_eq!(cfg.linger_ms, 1);
        assert_eq!(cfg.max_in_flight_requests, 5);
        assert_eq!(cfg.retry_backoff_ms, 100);
        assert_eq!(cfg.max_retries, 5);
        assert!(!cfg.drop_invalid_message);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn topic_index_map_parsing() {
        let map = parse_topic_index_map(&["orders:orders-v2".into(), " users : people ".into()]).unwrap();
        assert_eq!(map.get("orders").map(String::as_str), Some("orders-v2"));
        assert_eq!(map.get("users").map(String::as_str), Some("people"));

        for bad in ["orders", "orders:", ":idx", "a:b:c"] {
            let err = parse_topic_index_map(&[bad.to_string()]).unwrap_err();
            assert!(matches!(err, WriterError::Configuration(_)), "{bad}");
        }
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let mut cfg = WriterConfig::new("doc");
        cfg.batch_size = 0;
        assert!(matches!(cfg.validate(), Err(WriterError::Configuration(_))));

        let mut cfg = WriterConfig::new("doc");
        cfg.max_in_flight_requests = 0;
        assert!(matches!(cfg.validate(), Err(WriterError::Configuration(_))));

        assert!(WriterConfig::new(" ").validate().is_err());
    }
}

use serde::{Deserialize, Serialize};

use crate::schema::Schema;

// ════════════════════════════════════════════════════════════════
//  TopicPartition
// ════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self { topic: topic.into(), partition }
    }
}

impl std::fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

// ════════════════════════════════════════════════════════════════
//  Record
// ════════════════════════════════════════════════════════════════

/// One record delivered by the upstream log, addressed by partition and
/// offset. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// Record key; becomes the document id unless keys are ignored.
    #[serde(default)]
    pub key: Option<serde_json::Value>,
    #[serde(default)]
    pub key_schema: Option<Schema>,
    /// Record value. `Null` is a tombstone.
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub value_schema: Option<Schema>,
    /// Arrival timestamp in ms (Unix epoch).
    #[serde(default)]
    pub timestamp_ms: Option<i64>,
}

impl Record {
    /// Schemaless record.
    pub fn new(
        topic: impl Into<String>,
        partition: i32,
        offset: i64,
        key: Option<serde_json::Value>,
        value: serde_json::Value,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key,
            key_schema: None,
            value,
            value_schema: None,
            timestamp_ms: None,
        }
    }

    pub fn with_key_schema(mut self, schema: Schema) -> Self {
        self.key_schema = Some(schema);
        self
    }

    pub fn with_value_schema(mut self, schema: Schema) -> Self {
        self.value_schema = Some(schema);
        self
    }

    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_from_json_line() {
        let line = r#"{"topic":"orders","partition":3,"offset":42,"key":17,"value":{"qty":2}}"#;
        let record: Record = serde_json::from_str(line).unwrap();
        assert_eq!(record.topic_partition(), TopicPartition::new("orders", 3));
        assert_eq!(record.key, Some(serde_json::json!(17)));
        assert!(record.value_schema.is_none());
        assert_eq!(record.topic_partition().to_string(), "orders-3");
    }

    #[test]
    fn null_key_is_none() {
        let line = r#"{"topic":"t","partition":0,"offset":0,"key":null,"value":1}"#;
        let record: Record = serde_json::from_str(line).unwrap();
        assert!(record.key.is_none());
    }
}

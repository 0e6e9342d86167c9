use std::collections::{HashMap, HashSet};

use crate::config::{WriterConfig, parse_topic_index_map};
use crate::error::WriterError;

/// Destination and translation policy for one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicConfig {
    pub index: String,
    pub key_ignore: bool,
    pub schema_ignore: bool,
}

/// Resolves per-topic destination index and key/schema handling.
///
/// Built once at start from immutable configuration.
#[derive(Debug, Clone)]
pub struct TopicConfigResolver {
    index_map: HashMap<String, String>,
    key_ignore: bool,
    schema_ignore: bool,
    topic_key_ignore: HashSet<String>,
    topic_schema_ignore: HashSet<String>,
}

impl TopicConfigResolver {
    pub fn from_config(config: &WriterConfig) -> Result<Self, WriterError> {
        Ok(Self {
            index_map: parse_topic_index_map(&config.topic_index_map)?,
            key_ignore: config.key_ignore,
            schema_ignore: config.schema_ignore,
            topic_key_ignore: config.topic_key_ignore_set(),
            topic_schema_ignore: config.topic_schema_ignore_set(),
        })
    }

    pub fn resolve(&self, topic: &str) -> TopicConfig {
        TopicConfig {
            index: self.index_name(topic).to_string(),
            key_ignore: self.key_ignore || self.topic_key_ignore.contains(topic),
            schema_ignore: self.schema_ignore || self.topic_schema_ignore.contains(topic),
        }
    }

    pub fn index_name<'a>(&'a self, topic: &'a str) -> &'a str {
        self.index_map.get(topic).map(String::as_str).unwrap_or(topic)
    }
}

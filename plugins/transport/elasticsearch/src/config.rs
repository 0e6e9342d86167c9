use serde::Deserialize;

/// Connection settings for the Elasticsearch cluster.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Base URLs, e.g. `http://localhost:9200`. Requests rotate over them.
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Per-request timeout, connect included.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl ConnectionConfig {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            username: None,
            password: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }

    /// Basic-auth credentials, only when both parts are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

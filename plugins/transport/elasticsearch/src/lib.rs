use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use sink_api::{BulkItem, BulkTransport, IndexCreation, ItemOutcome, TransportError};

mod bulk;
mod config;
mod index;

pub use bulk::{encode_bulk, is_retryable_status, parse_bulk_response};
pub use config::ConnectionConfig;
pub use index::{create_outcome, head_outcome};

/// Elasticsearch `BulkTransport` over HTTP.
///
/// Один `reqwest::Client` на все узлы; запросы по очереди уходят на
/// следующий URL из списка (round-robin).
pub struct ElasticsearchTransport {
    http: reqwest::Client,
    urls: Vec<String>,
    next: AtomicUsize,
    credentials: Option<(String, String)>,
}

impl ElasticsearchTransport {
    pub fn new(config: &ConnectionConfig) -> Result<Self, TransportError> {
        let urls: Vec<String> = config
            .urls
            .iter()
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .collect();
        if urls.is_empty() {
            return Err(TransportError::request("connection.urls must contain at least one URL"));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| TransportError::request(format!("HTTP client: {e}")))?;

        tracing::info!(urls = ?urls, "elasticsearch transport ready");
        Ok(Self {
            http,
            urls,
            next: AtomicUsize::new(0),
            credentials: config.credentials().map(|(u, p)| (u.to_string(), p.to_string())),
        })
    }

    fn base_url(&self) -> &str {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.urls.len();
        &self.urls[i]
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url(), path.trim_start_matches('/'));
        let req = self.http.request(method, url);
        match &self.credentials {
            Some((user, pass)) => req.basic_auth(user, Some(pass)),
            None => req,
        }
    }

    /// Send and read the body. Transport-level failures are connectivity errors.
    async fn exec(&self, req: RequestBuilder) -> Result<(StatusCode, String), TransportError> {
        let resp = req
            .send()
            .await
            .map_err(|e| TransportError::connectivity(format!("ES request: {e}")))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::connectivity(format!("ES read: {e}")))?;
        Ok((status, body))
    }
}

/// Error for a non-success response.
pub(crate) fn status_error(status: StatusCode, body: &str) -> TransportError {
    let msg = format!("{status}: {}", truncate(body, 512));
    if is_retryable_status(status.as_u16()) {
        TransportError::overload(msg)
    } else {
        TransportError::request(msg)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

impl BulkTransport for ElasticsearchTransport {
    fn submit_batch<'a>(
        &'a self,
        items: &'a [BulkItem],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ItemOutcome>, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            if items.is_empty() {
                return Ok(Vec::new());
            }
            let req = self
                .request(Method::POST, "_bulk")
                .header("content-type", "application/x-ndjson")
                .body(encode_bulk(items));
            let (status, body) = self.exec(req).await?;
            if !status.is_success() {
                return Err(status_error(status, &body));
            }
            parse_bulk_response(&body, items.len())
        })
    }

    fn create_index_if_absent<'a>(
        &'a self,
        index: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<IndexCreation, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let (status, body) = self.exec(self.request(Method::HEAD, index)).await?;
            if let Some(existing) = head_outcome(status, &body)? {
                return Ok(existing);
            }
            let (status, body) = self.exec(self.request(Method::PUT, index)).await?;
            create_outcome(status, &body)
        })
    }

    fn put_mapping<'a>(
        &'a self,
        index: &'a str,
        type_name: &'a str,
        mapping: &'a serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let mut body = serde_json::Map::new();
            body.insert(type_name.to_string(), mapping.clone());
            let req = self
                .request(Method::PUT, &format!("{index}/_mapping/{type_name}"))
                .header("content-type", "application/json")
                .body(serde_json::Value::Object(body).to_string());
            let (status, body) = self.exec(req).await?;
            if status.is_success() {
                Ok(())
            } else {
                Err(status_error(status, &body))
            }
        })
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>> {
        Box::pin(async move {
            tracing::info!("elasticsearch transport closed");
            Ok(())
        })
    }
}

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::json;
use sink_api::{BulkItem, ItemOutcome, TransportError};

// ═══════════════════════════════════════════════════════════════
//  Request body
// ═══════════════════════════════════════════════════════════════

/// NDJSON body for `POST /_bulk`: an action line and a source line per item.
pub fn encode_bulk(items: &[BulkItem]) -> String {
    let mut body = String::with_capacity(items.iter().map(|i| i.document.len() + 96).sum());
    for item in items {
        let mut action = json!({ "_index": item.index, "_type": item.type_name });
        if let Some(id) = &item.id {
            action["_id"] = json!(id);
        }
        body.push_str(&json!({ "index": action }).to_string());
        body.push('\n');
        body.push_str(&item.document);
        body.push('\n');
    }
    body
}

// ═══════════════════════════════════════════════════════════════
//  Response
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    items: Vec<HashMap<String, ItemResponse>>,
}

#[derive(Debug, Deserialize)]
struct ItemResponse {
    status: u16,
    #[serde(default)]
    error: Option<ItemError>,
}

#[derive(Debug, Deserialize)]
struct ItemError {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    reason: String,
}

/// Whether an HTTP status is worth retrying.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Map a `_bulk` response body to one outcome per submitted item, in order.
pub fn parse_bulk_response(body: &str, expected: usize) -> Result<Vec<ItemOutcome>, TransportError> {
    let response: BulkResponse = serde_json::from_str(body)
        .map_err(|e| TransportError::request(format!("unreadable bulk response: {e}")))?;
    if response.items.len() != expected {
        return Err(TransportError::request(format!(
            "bulk response has {} items, request had {expected}",
            response.items.len()
        )));
    }

    response
        .items
        .into_iter()
        .map(|entry| {
            let item = entry
                .into_values()
                .next()
                .ok_or_else(|| TransportError::request("empty item in bulk response"))?;
            Ok(outcome(item))
        })
        .collect()
}

fn outcome(item: ItemResponse) -> ItemOutcome {
    if (200..300).contains(&item.status) {
        return ItemOutcome::Acknowledged;
    }
    let reason = match item.error {
        Some(err) => format!("{}: {}", err.kind, err.reason),
        None => format!("status {}", item.status),
    };
    if is_retryable_status(item.status) {
        ItemOutcome::Retryable { reason }
    } else {
        ItemOutcome::Rejected { reason }
    }
}

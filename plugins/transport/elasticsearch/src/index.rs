use reqwest::StatusCode;
use sink_api::{IndexCreation, TransportError};

use crate::status_error;

/// `HEAD /{index}`: `Some` when the index exists, `None` when it must be created.
pub fn head_outcome(status: StatusCode, body: &str) -> Result<Option<IndexCreation>, TransportError> {
    match status {
        StatusCode::OK => Ok(Some(IndexCreation::AlreadyExists)),
        StatusCode::NOT_FOUND => Ok(None),
        other => Err(status_error(other, body)),
    }
}

/// `PUT /{index}`. A 400 `resource_already_exists_exception` means another
/// writer created it between our HEAD and PUT.
pub fn create_outcome(status: StatusCode, body: &str) -> Result<IndexCreation, TransportError> {
    if status.is_success() {
        return Ok(IndexCreation::Created);
    }
    if status == StatusCode::BAD_REQUEST && body.contains("resource_already_exists_exception") {
        return Ok(IndexCreation::AlreadyExists);
    }
    Err(status_error(status, body))
}

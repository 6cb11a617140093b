//! Mapping between async-search HTTP bodies and domain types.

use serde::Deserialize;
use sr_domain::{BackendError, SearchHandle, SearchResponse};

/// The status fields of an async-search body.  Everything else stays in
/// the opaque payload.
#[derive(Debug, Default, Deserialize)]
struct AsyncSearchStatus {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    is_partial: bool,
    #[serde(default)]
    is_running: bool,
}

/// Turn a 2xx body into a [`SearchResponse`].  The whole body becomes the
/// payload.  A body without status fields reads as a complete result.
pub(crate) fn to_response(body: serde_json::Value) -> Result<SearchResponse, BackendError> {
    let status: AsyncSearchStatus = serde_json::from_value(body.clone()).map_err(|e| {
        BackendError::new(format!("unexpected async search body: {e}")).with_payload(body.clone())
    })?;

    Ok(SearchResponse {
        id: status.id.filter(|id| !id.is_empty()).map(SearchHandle::new),
        is_partial: status.is_partial,
        is_running: status.is_running,
        payload: body,
    })
}

/// Build the error for a non-2xx reply.  The raw body is kept as payload
/// (as JSON when it parses, as a string otherwise).
pub(crate) fn to_error(status: u16, raw: &str) -> BackendError {
    let payload = serde_json::from_str::<serde_json::Value>(raw)
        .unwrap_or_else(|_| serde_json::Value::String(raw.to_owned()));
    BackendError::new(error_message(status, &payload))
        .with_status(status)
        .with_payload(payload)
}

fn error_message(status: u16, payload: &serde_json::Value) -> String {
    let error = &payload["error"];
    error["reason"]
        .as_str()
        .or_else(|| error["type"].as_str())
        .or_else(|| error.as_str())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("HTTP {status}"))
}

use std::fmt;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / handle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A backend-agnostic search submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Target the search runs against (an index pattern for HTTP backends).
    /// `None` lets the transport use its configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Opaque query body, forwarded verbatim on submission.
    #[serde(default)]
    pub body: serde_json::Value,
}

impl SearchRequest {
    pub fn new(body: serde_json::Value) -> Self {
        Self { target: None, body }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Server-side identifier of an async search.  Needed to poll and to
/// release the search.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchHandle(String);

impl SearchHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a single transport call is for.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    /// First call of a session: submit the request.
    Submit(SearchRequest),
    /// Follow-up call checking on a known handle.
    Poll(SearchHandle),
}

impl Attempt {
    pub fn is_poll(&self) -> bool {
        matches!(self, Self::Poll(_))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One successful transport reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Handle of the async search, if the backend issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SearchHandle>,
    pub is_partial: bool,
    pub is_running: bool,
    /// Opaque success payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl SearchResponse {
    /// Final, complete result.
    pub fn is_complete(&self) -> bool {
        !self.is_running && !self.is_partial
    }

    /// The backend gave up without a transport-level error.
    pub fn is_graceful_failure(&self) -> bool {
        !self.is_running && self.is_partial
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A rejected transport call.  Produced by transports and handed to the
/// stream consumer untouched.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct BackendError {
    /// HTTP-like status, when the transport has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub message: String,
    /// Raw error body, when the backend sent one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            payload: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Why a session ended as aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The caller's own cancellation source fired.
    External,
    /// The client-side deadline elapsed.
    Timeout,
    /// `cancel_pending` was called while the session was in flight.
    BulkCancel,
    /// The backend reported `is_partial && !is_running`.
    GracefulFailure,
    /// The result stream was dropped before reaching a terminal state.
    Abandoned,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::External => "aborted by caller",
            Self::Timeout => "search timed out",
            Self::BulkCancel => "pending searches cancelled",
            Self::GracefulFailure => "backend could not complete the search",
            Self::Abandoned => "result stream dropped",
        };
        f.write_str(s)
    }
}

/// Terminal error of a search stream.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    /// Cancellation-class: intentional or backend-signalled stop.
    #[error("aborted: {0}")]
    Aborted(AbortReason),

    /// Rejection payload of a failed attempt, passed through as-is.
    #[error(transparent)]
    Backend(BackendError),
}

impl SearchError {
    /// Callers use this to suppress failure presentation for intentional stops.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Aborted(AbortReason::Timeout))
    }

    pub fn abort_reason(&self) -> Option<AbortReason> {
        match self {
            Self::Aborted(reason) => Some(*reason),
            Self::Backend(_) => None,
        }
    }
}

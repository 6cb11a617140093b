//! Scripted in-memory transport and telemetry recorder shared by the
//! coordinator integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;
use sr_coordinator::{
    Attempt, BackendError, CancellationToken, SearchHandle, SearchResponse, SearchStream,
    SearchTransport,
};
use sr_domain::{SearchError, TelemetryEvent, TelemetrySink};
use tokio::time::Instant;

// ── Script ──────────────────────────────────────────────────────────────

/// What the transport does for one attempt.
pub enum Step {
    Respond { after: Duration, response: SearchResponse },
    Reject { after: Duration, error: BackendError },
}

pub fn respond(after_ms: u64, response: SearchResponse) -> Step {
    Step::Respond {
        after: Duration::from_millis(after_ms),
        response,
    }
}

pub fn reject(after_ms: u64, error: BackendError) -> Step {
    Step::Reject {
        after: Duration::from_millis(after_ms),
        error,
    }
}

pub fn running(id: &str) -> SearchResponse {
    SearchResponse {
        id: Some(SearchHandle::new(id)),
        is_partial: true,
        is_running: true,
        payload: serde_json::json!({ "hits": { "total": 1 } }),
    }
}

pub fn complete(id: Option<&str>) -> SearchResponse {
    SearchResponse {
        id: id.map(SearchHandle::new),
        is_partial: false,
        is_running: false,
        payload: serde_json::json!({ "hits": { "total": 42 } }),
    }
}

pub fn gave_up(id: &str) -> SearchResponse {
    SearchResponse {
        id: Some(SearchHandle::new(id)),
        is_partial: true,
        is_running: false,
        payload: serde_json::json!({ "hits": { "total": 3 } }),
    }
}

// ── Transport ───────────────────────────────────────────────────────────

/// One recorded attempt.
#[derive(Clone)]
pub struct Call {
    pub attempt: Attempt,
    /// Virtual time since the transport was created.
    pub at: Duration,
    pub token: CancellationToken,
}

/// Plays back a fixed script.  Once the script runs out, attempts hang
/// until their token fires.
pub struct ScriptedTransport {
    origin: Instant,
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<Call>>,
    releases: Mutex<Vec<SearchHandle>>,
    fail_release: bool,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            origin: Instant::now(),
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
            releases: Mutex::new(Vec::new()),
            fail_release: false,
        })
    }

    pub fn with_failing_release(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            origin: Instant::now(),
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
            releases: Mutex::new(Vec::new()),
            fail_release: true,
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn releases(&self) -> Vec<SearchHandle> {
        self.releases.lock().clone()
    }
}

#[async_trait]
impl SearchTransport for ScriptedTransport {
    async fn attempt(
        &self,
        attempt: Attempt,
        cancel: CancellationToken,
    ) -> Result<SearchResponse, BackendError> {
        self.calls.lock().push(Call {
            attempt,
            at: self.origin.elapsed(),
            token: cancel.clone(),
        });

        let step = self.steps.lock().pop_front();
        let Some(step) = step else {
            cancel.cancelled().await;
            return Err(BackendError::new("request aborted"));
        };

        let (after, result) = match step {
            Step::Respond { after, response } => (after, Ok(response)),
            Step::Reject { after, error } => (after, Err(error)),
        };

        tokio::select! {
            biased;
            _ = tokio::time::sleep(after) => result,
            _ = cancel.cancelled() => Err(BackendError::new("request aborted")),
        }
    }

    async fn release(&self, handle: &SearchHandle) -> Result<(), BackendError> {
        self.releases.lock().push(handle.clone());
        if self.fail_release {
            Err(BackendError::new("resource_not_found_exception").with_status(404))
        } else {
            Ok(())
        }
    }
}

// ── Telemetry ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn record(&self, event: TelemetryEvent) {
        self.events.lock().push(event);
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────

pub type Item = Result<SearchResponse, SearchError>;

pub async fn drain(stream: SearchStream) -> Vec<Item> {
    stream.collect().await
}

pub fn spawn_drain(stream: SearchStream) -> tokio::task::JoinHandle<Vec<Item>> {
    tokio::spawn(drain(stream))
}

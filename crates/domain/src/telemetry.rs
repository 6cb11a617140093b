use serde::Serialize;

/// Discrete lifecycle events reported to a [`TelemetrySink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryEvent {
    /// A session's client-side deadline fired.
    QueryTimedOut { session_id: u64, elapsed_ms: u64 },
    /// One `cancel_pending` call that stopped at least one session.
    QueriesCancelled { count: usize },
    /// One effective `run_beyond_timeout` call.
    LongQueryRunBeyondTimeout { sessions: usize },
    /// Recorded by presentation layers when they offer the run-beyond option.
    LongQueryPopupShown,
    /// Recorded by presentation layers when the offer is dismissed.
    LongQueryDialogDismissed,
}

/// Fire-and-forget receiver of [`TelemetryEvent`]s.
///
/// Implementations must not block and must not panic; the coordinator
/// calls `record` from inside its own state transitions.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: TelemetryEvent);
}

/// Logs every event as a JSON line through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn record(&self, event: TelemetryEvent) {
        let json = serde_json::to_string(&event).unwrap_or_default();
        tracing::info!(telemetry_event = %json, "sr_event");
    }
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn record(&self, _event: TelemetryEvent) {}
}

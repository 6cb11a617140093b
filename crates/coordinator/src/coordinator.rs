//! The public face of the crate: start searches, cancel them in bulk,
//! let them run past their deadline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sr_domain::config::ExtensionScope;
use sr_domain::stream::SearchStream;
use sr_domain::{SearchRequest, TelemetryEvent, TelemetrySink};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::builder::SearchCoordinatorBuilder;
use crate::cleanup::CleanupCoordinator;
use crate::deadline::DeadlineController;
use crate::poll::PollPolicy;
use crate::registry::{PendingRegistry, PendingSearch};
use crate::session::{self, SessionParams};
use crate::transport::SearchTransport;

/// Per-search options.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Fixed poll interval for this search.  Overrides the coordinator's
    /// poll policy.
    pub poll_interval: Option<Duration>,
    /// Caller-owned cancellation source.
    pub cancel: Option<CancellationToken>,
}

impl SearchOptions {
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// State shared by the coordinator handle and every session it starts.
pub(crate) struct Shared {
    pub(crate) transport: Arc<dyn SearchTransport>,
    pub(crate) telemetry: Arc<dyn TelemetrySink>,
    pub(crate) registry: PendingRegistry,
    pub(crate) deadlines: DeadlineController,
    pub(crate) cleanup: CleanupCoordinator,
    pub(crate) timeout: Option<Duration>,
    pub(crate) poll: PollPolicy,
    pub(crate) extension_scope: ExtensionScope,
    next_id: AtomicU64,
}

impl Shared {
    pub(crate) fn new(
        transport: Arc<dyn SearchTransport>,
        telemetry: Arc<dyn TelemetrySink>,
        timeout: Option<Duration>,
        poll: PollPolicy,
        extension_scope: ExtensionScope,
    ) -> Self {
        Self {
            cleanup: CleanupCoordinator::new(transport.clone()),
            deadlines: DeadlineController::new(telemetry.clone()),
            registry: PendingRegistry::new(),
            transport,
            telemetry,
            timeout,
            poll,
            extension_scope,
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn next_session_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Coordinates submit-then-poll searches against one backend.
///
/// Cheap to clone; clones share the pending registry, the deadline table
/// and the telemetry sink.
#[derive(Clone)]
pub struct SearchCoordinator {
    shared: Arc<Shared>,
}

impl SearchCoordinator {
    /// Start a builder around `transport`.
    pub fn builder(transport: Arc<dyn SearchTransport>) -> SearchCoordinatorBuilder {
        SearchCoordinatorBuilder::new(transport)
    }

    pub(crate) fn from_shared(shared: Shared) -> Self {
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Describe a search.  Nothing happens until the returned stream is
    /// polled; every call yields an independent execution.
    ///
    /// The stream yields each backend response in order.  It ends cleanly
    /// after the final complete response, or yields exactly one `Err` as
    /// its last item: [`SearchError::Aborted`](sr_domain::SearchError::Aborted)
    /// for cancellation-class endings, [`SearchError::Backend`](sr_domain::SearchError::Backend)
    /// for a rejected attempt.
    pub fn search(&self, request: SearchRequest, options: SearchOptions) -> SearchStream {
        let poll = match options.poll_interval {
            Some(interval) => PollPolicy::Fixed(interval),
            None => self.shared.poll,
        };
        session::run(
            self.shared.clone(),
            SessionParams {
                request,
                poll,
                external: options.cancel,
            },
        )
    }

    /// Cancel every pending search.  Records one `QueriesCancelled` event
    /// when at least one search was pending.
    pub fn cancel_pending(&self) {
        let count = self.shared.registry.cancel_all();
        if count > 0 {
            tracing::info!(count, "cancelled pending searches");
            self.shared
                .telemetry
                .record(TelemetryEvent::QueriesCancelled { count });
        }
    }

    /// Let pending searches run past their deadline, using the configured
    /// [`ExtensionScope`].  No effect on searches whose deadline already
    /// fired.
    pub fn run_beyond_timeout(&self) {
        self.run_beyond_timeout_with(self.shared.extension_scope);
    }

    /// Like [`run_beyond_timeout`](Self::run_beyond_timeout) with an
    /// explicit scope.  Returns how many deadlines were disarmed.
    pub fn run_beyond_timeout_with(&self, scope: ExtensionScope) -> usize {
        let sessions = self.shared.deadlines.extend(scope);
        if sessions > 0 {
            tracing::info!(sessions, ?scope, "running searches beyond timeout");
            self.shared
                .telemetry
                .record(TelemetryEvent::LongQueryRunBeyondTimeout { sessions });
        } else {
            tracing::debug!(?scope, "run beyond timeout had nothing to extend");
        }
        sessions
    }

    pub fn pending_count(&self) -> usize {
        self.shared.registry.len()
    }

    pub fn watch_pending(&self) -> watch::Receiver<usize> {
        self.shared.registry.subscribe()
    }

    pub fn pending(&self) -> Vec<PendingSearch> {
        self.shared.registry.snapshot()
    }

    /// Wait for outstanding release calls.
    pub async fn flush_cleanup(&self) {
        self.shared.cleanup.flush().await;
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.shared.timeout
    }
}

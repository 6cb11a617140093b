//! The session engine: one poll loop per search invocation.
//!
//! A session submits once, then polls its handle until the backend reports
//! a terminal response, the transport rejects an attempt, or the merged
//! cancel signal fires.  Attempts are strictly sequential.  Every abnormal
//! ending releases the server-side search when a handle is known.

use std::sync::Arc;

use sr_domain::stream::SearchStream;
use sr_domain::{
    AbortReason, Attempt, BackendError, SearchError, SearchHandle, SearchRequest, SearchResponse,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cancel::CancelSignal;
use crate::coordinator::Shared;
use crate::deadline::DeadlineGuard;
use crate::poll::PollPolicy;
use crate::registry::SessionState;

pub(crate) struct SessionParams {
    pub(crate) request: SearchRequest,
    pub(crate) poll: PollPolicy,
    pub(crate) external: Option<CancellationToken>,
}

/// Bookkeeping for one live session.  Dropping it before a terminal state
/// counts as abandonment.
struct Session {
    id: u64,
    shared: Arc<Shared>,
    signal: CancelSignal,
    handle: Option<SearchHandle>,
    state: SessionState,
    released: bool,
    started: Instant,
    deadline: Option<DeadlineGuard>,
}

impl Session {
    /// Register the session, arm its deadline and merge its cancel sources.
    fn open(shared: Arc<Shared>, external: Option<CancellationToken>) -> Self {
        let id = shared.next_session_id();
        let signal = CancelSignal::new();
        if let Some(token) = external {
            signal.link(AbortReason::External, token);
        }

        shared.registry.insert(id, signal.clone());
        let deadline = shared
            .timeout
            .map(|timeout| shared.deadlines.arm(id, timeout, signal.clone()));

        tracing::debug!(session_id = id, timeout = ?shared.timeout, "search session started");

        Self {
            id,
            shared,
            signal,
            handle: None,
            state: SessionState::Pending,
            released: false,
            started: Instant::now(),
            deadline,
        }
    }

    fn mark_running(&mut self) {
        if self.state == SessionState::Pending {
            self.state = SessionState::Running;
            self.shared.registry.set_state(self.id, SessionState::Running);
        }
    }

    /// Record the handle carried by a response.  The first handle seen is
    /// kept for the rest of the session.
    fn observe(&mut self, response: &SearchResponse) {
        let Some(id) = &response.id else { return };
        match &self.handle {
            None => {
                tracing::debug!(session_id = self.id, handle = %id, "search handle observed");
                self.handle = Some(id.clone());
                self.shared.registry.set_handle(self.id, id.clone());
            }
            Some(known) if known != id => {
                tracing::warn!(
                    session_id = self.id,
                    known = %known,
                    received = %id,
                    "backend returned a different handle, keeping the first"
                );
            }
            Some(_) => {}
        }
    }

    /// Move to a terminal state.  Only the first call has any effect.
    fn terminate(&mut self, state: SessionState) {
        if self.state.is_terminal() {
            return;
        }
        self.state = state;
        self.shared.registry.remove(self.id);
        self.deadline = None;

        tracing::debug!(
            session_id = self.id,
            ?state,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "search session finished"
        );

        if state != SessionState::Completed {
            self.release();
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        match &self.handle {
            Some(handle) => {
                self.released = true;
                self.shared.cleanup.release(handle.clone());
            }
            None => {
                tracing::debug!(session_id = self.id, "no handle observed, nothing to release");
            }
        }
    }

    /// End as aborted and build the terminal error.
    fn abort(&mut self, reason: AbortReason) -> SearchError {
        tracing::debug!(session_id = self.id, %reason, "search aborted");
        self.terminate(SessionState::Aborted);
        SearchError::Aborted(reason)
    }

    fn fail(&mut self, err: BackendError) -> SearchError {
        tracing::debug!(session_id = self.id, error = %err, status = ?err.status, "search failed");
        self.terminate(SessionState::Errored);
        SearchError::Backend(err)
    }

    fn next_attempt(&self, request: &SearchRequest) -> Attempt {
        match &self.handle {
            Some(handle) => Attempt::Poll(handle.clone()),
            None => Attempt::Submit(request.clone()),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            tracing::debug!(session_id = self.id, reason = %AbortReason::Abandoned, "search abandoned");
            self.terminate(SessionState::Aborted);
        }
    }
}

/// Build the lazy result stream of one search.
pub(crate) fn run(shared: Arc<Shared>, params: SessionParams) -> SearchStream {
    let SessionParams {
        request,
        poll,
        external,
    } = params;

    Box::pin(async_stream::stream! {
        let mut session = Session::open(shared, external);
        let transport = session.shared.transport.clone();
        let signal = session.signal.clone();
        let mut attempt_no: u32 = 0;

        loop {
            // Checked right before every attempt, the first one included.
            if let Some(reason) = signal.fired() {
                yield Err(session.abort(reason));
                return;
            }

            let attempt = session.next_attempt(&request);
            attempt_no += 1;
            session.mark_running();
            tracing::trace!(session_id = session.id, attempt_no, poll = attempt.is_poll(), "issuing attempt");

            let outcome = tokio::select! {
                biased;
                result = transport.attempt(attempt, signal.token()) => Ok(result),
                reason = signal.cancelled() => Err(reason),
            };

            let response = match outcome {
                Err(reason) => {
                    yield Err(session.abort(reason));
                    return;
                }
                Ok(Err(err)) => {
                    // A rejection racing our own cancel is the cancel.
                    let terminal = match signal.fired() {
                        Some(reason) => session.abort(reason),
                        None => session.fail(err),
                    };
                    yield Err(terminal);
                    return;
                }
                Ok(Ok(response)) => response,
            };

            session.observe(&response);

            if response.is_complete() {
                session.terminate(SessionState::Completed);
                yield Ok(response);
                return;
            }

            if response.is_graceful_failure() {
                yield Ok(response);
                yield Err(session.abort(AbortReason::GracefulFailure));
                return;
            }

            if session.handle.is_none() {
                yield Err(session.fail(BackendError::new(
                    "backend reported a running search without an id",
                )));
                return;
            }

            yield Ok(response);

            let delay = poll.next_delay(session.started.elapsed());
            let interrupted = tokio::select! {
                biased;
                reason = signal.cancelled() => Some(reason),
                _ = tokio::time::sleep(delay) => None,
            };
            if let Some(reason) = interrupted {
                yield Err(session.abort(reason));
                return;
            }
        }
    })
}

//! Fire-once cancellation merged from several sources.
//!
//! A session is stopped by whichever of its sources fires first: the
//! caller's own token, the session deadline, or a registry-wide bulk
//! cancel.  [`CancelSignal`] is that merge.  It fires exactly once,
//! remembers the [`AbortReason`] of the winning source, and exposes one
//! shared [`CancellationToken`] that is handed to every transport attempt.
//!
//! Sources join in two ways:
//! - **linked tokens** (`link`) are watched by a small task and also
//!   checked synchronously on every `fired()` call, so a token that is
//!   already cancelled is seen without waiting for the watcher to run;
//! - **direct triggers** (`fire`) are used by the deadline controller and
//!   the pending registry, which hold a clone of the signal.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use sr_domain::AbortReason;
use tokio_util::sync::CancellationToken;

/// A merged, fire-once cancellation signal.
#[derive(Clone)]
pub struct CancelSignal {
    inner: Arc<SignalInner>,
}

struct SignalInner {
    /// Shared with transports; cancelled once, when the signal fires.
    token: CancellationToken,
    reason: Mutex<Option<AbortReason>>,
    sources: Mutex<Vec<(AbortReason, CancellationToken)>>,
    /// Cancelled when the last handle goes away so watchers exit.
    closed: CancellationToken,
}

impl Drop for SignalInner {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

impl CancelSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                token: CancellationToken::new(),
                reason: Mutex::new(None),
                sources: Mutex::new(Vec::new()),
                closed: CancellationToken::new(),
            }),
        }
    }

    /// Add a token as a contributing source.
    ///
    /// An already-cancelled source fires the signal immediately.  Otherwise
    /// a watcher task is spawned on the current tokio runtime; it exits when
    /// the source fires, the signal fires, or the signal is dropped.
    pub fn link(&self, reason: AbortReason, source: CancellationToken) {
        if source.is_cancelled() {
            self.fire(reason);
            return;
        }
        self.inner.sources.lock().push((reason, source.clone()));

        let weak: Weak<SignalInner> = Arc::downgrade(&self.inner);
        let fired = self.inner.token.clone();
        let closed = self.inner.closed.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = source.cancelled() => {
                    if let Some(inner) = weak.upgrade() {
                        CancelSignal { inner }.fire(reason);
                    }
                }
                _ = fired.cancelled() => {}
                _ = closed.cancelled() => {}
            }
        });
    }

    /// Fire the signal.  Returns `true` only for the call that actually
    /// fired it; later calls keep the first reason.
    pub fn fire(&self, reason: AbortReason) -> bool {
        {
            let mut slot = self.inner.reason.lock();
            if slot.is_some() {
                return false;
            }
            *slot = Some(reason);
        }
        self.inner.token.cancel();
        true
    }

    /// The reason the signal fired, if it has.
    ///
    /// Linked sources are polled here too, so the answer does not lag
    /// behind a source that was cancelled on this same scheduling turn.
    pub fn fired(&self) -> Option<AbortReason> {
        if let Some(reason) = *self.inner.reason.lock() {
            return Some(reason);
        }
        let pending = self
            .inner
            .sources
            .lock()
            .iter()
            .find(|(_, token)| token.is_cancelled())
            .map(|(reason, _)| *reason);
        if let Some(reason) = pending {
            self.fire(reason);
        }
        *self.inner.reason.lock()
    }

    pub fn is_cancelled(&self) -> bool {
        self.fired().is_some()
    }

    /// Token handed to transport attempts.  Cancelled when the signal fires.
    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Wait until the signal fires and return the winning reason.
    pub async fn cancelled(&self) -> AbortReason {
        self.inner.token.cancelled().await;
        (*self.inner.reason.lock()).unwrap_or(AbortReason::External)
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelSignal")
            .field("reason", &*self.inner.reason.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_signal_is_not_cancelled() {
        let signal = CancelSignal::new();
        assert!(!signal.is_cancelled());
        assert!(!signal.token().is_cancelled());
    }

    #[tokio::test]
    async fn first_fire_wins() {
        let signal = CancelSignal::new();
        assert!(signal.fire(AbortReason::Timeout));
        assert!(!signal.fire(AbortReason::BulkCancel));
        assert_eq!(signal.fired(), Some(AbortReason::Timeout));
        assert!(signal.token().is_cancelled());
    }

    #[tokio::test]
    async fn already_cancelled_source_fires_on_link() {
        let external = CancellationToken::new();
        external.cancel();

        let signal = CancelSignal::new();
        signal.link(AbortReason::External, external);
        assert_eq!(signal.fired(), Some(AbortReason::External));
    }

    #[tokio::test]
    async fn linked_source_is_seen_synchronously() {
        let external = CancellationToken::new();
        let signal = CancelSignal::new();
        signal.link(AbortReason::External, external.clone());

        external.cancel();
        // No yield: the watcher has not run yet, `fired` polls the source.
        assert_eq!(signal.fired(), Some(AbortReason::External));
        assert!(signal.token().is_cancelled());
    }

    #[tokio::test]
    async fn watcher_propagates_to_shared_token() {
        let external = CancellationToken::new();
        let signal = CancelSignal::new();
        signal.link(AbortReason::External, external.clone());
        let token = signal.token();

        external.cancel();
        token.cancelled().await;
        assert_eq!(signal.cancelled().await, AbortReason::External);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let signal = CancelSignal::new();
        let clone = signal.clone();
        clone.fire(AbortReason::BulkCancel);
        assert_eq!(signal.fired(), Some(AbortReason::BulkCancel));
    }

    #[tokio::test]
    async fn direct_trigger_beats_later_linked_source() {
        let external = CancellationToken::new();
        let signal = CancelSignal::new();
        signal.link(AbortReason::External, external.clone());

        signal.fire(AbortReason::Timeout);
        external.cancel();
        assert_eq!(signal.fired(), Some(AbortReason::Timeout));
    }
}

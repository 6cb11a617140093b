//! Best-effort release of server-side state for abandoned searches.

use std::sync::Arc;

use sr_domain::SearchHandle;
use tokio_util::task::TaskTracker;

use crate::transport::SearchTransport;

/// Issues fire-and-forget release calls.
///
/// Release runs in the background; its outcome is only logged, since the
/// session that owed it is already terminal.  Outstanding calls are
/// tracked so shutdown paths can wait for them with [`flush`](Self::flush).
#[derive(Clone)]
pub struct CleanupCoordinator {
    transport: Arc<dyn SearchTransport>,
    tracker: TaskTracker,
}

impl CleanupCoordinator {
    pub fn new(transport: Arc<dyn SearchTransport>) -> Self {
        Self {
            transport,
            tracker: TaskTracker::new(),
        }
    }

    /// Schedule a release of `handle`.  Returns `false` when no tokio
    /// runtime is available to run it (e.g. a stream dropped during
    /// runtime shutdown); the backend's own keep-alive reclaims it then.
    pub fn release(&self, handle: SearchHandle) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(handle = %handle, "no runtime available, skipping release");
            return false;
        };

        let transport = self.transport.clone();
        self.tracker.spawn_on(
            async move {
                match transport.release(&handle).await {
                    Ok(()) => tracing::debug!(handle = %handle, "released async search"),
                    Err(e) => tracing::warn!(
                        handle = %handle,
                        error = %e,
                        status = ?e.status,
                        "release failed (ignored)"
                    ),
                }
            },
            &runtime,
        );
        true
    }

    /// Number of release calls still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every release scheduled so far to finish.
    pub async fn flush(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

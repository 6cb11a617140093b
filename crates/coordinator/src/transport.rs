//! The seam between the coordinator and whatever carries calls to the
//! backend.

use async_trait::async_trait;
use sr_domain::{Attempt, BackendError, SearchHandle, SearchResponse};
use tokio_util::sync::CancellationToken;

/// One backend speaking the submit-then-poll protocol.
///
/// Implementations issue exactly one call per `attempt`.  They should stop
/// early when `cancel` fires, but the coordinator does not depend on it:
/// it stops waiting on the attempt as soon as its own signal fires.
#[async_trait]
pub trait SearchTransport: Send + Sync {
    /// Submit a request or poll a known handle.
    async fn attempt(
        &self,
        attempt: Attempt,
        cancel: CancellationToken,
    ) -> Result<SearchResponse, BackendError>;

    /// Tell the backend to discard an abandoned search.
    async fn release(&self, handle: &SearchHandle) -> Result<(), BackendError>;
}

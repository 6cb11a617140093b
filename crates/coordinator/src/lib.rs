//! `sr-coordinator` — lifecycle coordination for submit-then-poll searches.
//!
//! A backend that follows the async-search protocol answers a submission
//! either with a final result or with a handle plus an "in progress"
//! marker.  [`SearchCoordinator::search`] turns that exchange into one
//! lazy result stream per request while enforcing a client deadline,
//! honouring cancellation and releasing server-side state for searches
//! abandoned before completion.
//!
//! # Moving parts
//!
//! ```text
//!  search() ──► session engine ──attempt──► SearchTransport
//!                 │    ▲                        ▲
//!                 │    └── CancelSignal ◄───────┤ (token handed to each attempt)
//!                 │          ▲   ▲   ▲          │
//!                 │   external  deadline  registry
//!                 │                              │
//!                 └── abnormal end ─► CleanupCoordinator ─release─┘
//! ```
//!
//! - [`CancelSignal`] merges any number of sources into one fire-once signal
//!   and remembers which source won.
//! - [`DeadlineController`] owns one countdown per session plus the
//!   run-beyond-timeout override.
//! - [`PendingRegistry`] tracks in-flight sessions for bulk cancellation.
//! - [`CleanupCoordinator`] issues best-effort release calls.

pub mod builder;
pub mod cancel;
pub mod cleanup;
pub mod coordinator;
pub mod deadline;
pub mod poll;
pub mod registry;
mod session;
pub mod transport;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use builder::SearchCoordinatorBuilder;
pub use cancel::CancelSignal;
pub use cleanup::CleanupCoordinator;
pub use coordinator::{SearchCoordinator, SearchOptions};
pub use deadline::{DeadlineController, DeadlineState};
pub use poll::PollPolicy;
pub use registry::{PendingRegistry, PendingSearch, SessionState};
pub use transport::SearchTransport;

pub use sr_domain::config::ExtensionScope;
pub use sr_domain::stream::SearchStream;
pub use sr_domain::{
    AbortReason, Attempt, BackendError, SearchError, SearchHandle, SearchRequest, SearchResponse,
};
pub use tokio_util::sync::CancellationToken;

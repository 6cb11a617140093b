//! Tracks every non-terminal session of one coordinator and supports
//! cancelling all of them at once.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sr_domain::{AbortReason, SearchHandle};
use tokio::sync::watch;

use crate::cancel::CancelSignal;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Registered, no attempt issued yet.
    Pending,
    Running,
    Completed,
    Aborted,
    Errored,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Errored)
    }
}

/// Point-in-time view of one tracked session.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSearch {
    pub id: u64,
    pub started_at: DateTime<Utc>,
    pub state: SessionState,
    pub handle: Option<SearchHandle>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Entry {
    started_at: DateTime<Utc>,
    state: SessionState,
    handle: Option<SearchHandle>,
    signal: CancelSignal,
}

/// The set of sessions not yet in a terminal state.
///
/// Every mutation happens under one short lock, so `cancel_all` never
/// observes a half-inserted or half-removed entry.
pub struct PendingRegistry {
    entries: Mutex<BTreeMap<u64, Entry>>,
    count: watch::Sender<usize>,
}

impl Default for PendingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingRegistry {
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            entries: Mutex::new(BTreeMap::new()),
            count,
        }
    }

    /// Start tracking a session.  Re-inserting an id replaces the entry.
    pub fn insert(&self, id: u64, signal: CancelSignal) {
        let mut entries = self.entries.lock();
        entries.insert(
            id,
            Entry {
                started_at: Utc::now(),
                state: SessionState::Pending,
                handle: None,
                signal,
            },
        );
        self.count.send_replace(entries.len());
    }

    /// Stop tracking a session.  Returns `false` if it was not tracked
    /// (already removed, or swept by `cancel_all`).
    pub fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.lock();
        let found = entries.remove(&id).is_some();
        if found {
            self.count.send_replace(entries.len());
        }
        found
    }

    pub fn set_state(&self, id: u64, state: SessionState) {
        if let Some(entry) = self.entries.lock().get_mut(&id) {
            entry.state = state;
        }
    }

    pub fn set_handle(&self, id: u64, handle: SearchHandle) {
        if let Some(entry) = self.entries.lock().get_mut(&id) {
            entry.handle = Some(handle);
        }
    }

    /// Fire the cancel signal of every tracked session, then clear the set.
    /// Returns how many sessions were tracked.
    pub fn cancel_all(&self) -> usize {
        let drained = {
            let mut entries = self.entries.lock();
            let drained = std::mem::take(&mut *entries);
            self.count.send_replace(0);
            drained
        };

        for (id, entry) in &drained {
            if entry.signal.fire(AbortReason::BulkCancel) {
                tracing::debug!(session_id = id, "session cancelled in bulk");
            }
        }
        drained.len()
    }

    pub fn is_tracked(&self, id: u64) -> bool {
        self.entries.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receiver that observes the tracked-session count.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.count.subscribe()
    }

    /// Snapshot of every tracked session, oldest first.
    pub fn snapshot(&self) -> Vec<PendingSearch> {
        self.entries
            .lock()
            .iter()
            .map(|(id, e)| PendingSearch {
                id: *id,
                started_at: e.started_at,
                state: e.state,
                handle: e.handle.clone(),
            })
            .collect()
    }
}

//! Per-session client deadlines and the run-beyond-timeout override.
//!
//! Each armed session owns one timer task.  The timer and `extend` race
//! for the same entry under the table lock, so exactly one of them wins:
//! either the deadline fires (and extension becomes a no-op) or the
//! deadline is disarmed (and the timer exits without firing).
//!
//! A session whose signal already fired for another reason is out of
//! reach of both: its timer records nothing and `extend` skips it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sr_domain::config::ExtensionScope;
use sr_domain::{AbortReason, TelemetryEvent, TelemetrySink};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cancel::CancelSignal;

/// Where a session's countdown stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineState {
    Armed,
    /// Disarmed by run-beyond-timeout; no client deadline applies anymore.
    Extended,
    Fired,
}

struct DeadlineEntry {
    state: DeadlineState,
    disarm: CancellationToken,
    signal: CancelSignal,
}

impl DeadlineEntry {
    /// Armed and not already stopped by some other source.
    fn is_live(&self) -> bool {
        self.state == DeadlineState::Armed && !self.signal.is_cancelled()
    }
}

type DeadlineTable = Arc<Mutex<BTreeMap<u64, DeadlineEntry>>>;

/// Owns the countdowns of every armed session of one coordinator.
pub struct DeadlineController {
    table: DeadlineTable,
    telemetry: Arc<dyn TelemetrySink>,
}

impl DeadlineController {
    pub fn new(telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            table: Arc::new(Mutex::new(BTreeMap::new())),
            telemetry,
        }
    }

    /// Start the countdown for `session_id`.  When it elapses while still
    /// armed, `signal` fires with [`AbortReason::Timeout`] and one
    /// `QueryTimedOut` event is recorded.  Nothing is recorded when the
    /// signal was already fired by another source.
    ///
    /// The returned guard disarms and forgets the entry when dropped.
    pub fn arm(&self, session_id: u64, timeout: Duration, signal: CancelSignal) -> DeadlineGuard {
        let started = Instant::now();
        let deadline = started + timeout;
        let disarm = CancellationToken::new();

        self.table.lock().insert(
            session_id,
            DeadlineEntry {
                state: DeadlineState::Armed,
                disarm: disarm.clone(),
                signal,
            },
        );

        let table = self.table.clone();
        let telemetry = self.telemetry.clone();
        let timer_disarm = disarm.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    let fired = match table.lock().get_mut(&session_id) {
                        Some(entry) if entry.is_live() && entry.signal.fire(AbortReason::Timeout) => {
                            entry.state = DeadlineState::Fired;
                            true
                        }
                        _ => false,
                    };
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    if fired {
                        tracing::info!(session_id, elapsed_ms, "search deadline elapsed");
                        telemetry.record(TelemetryEvent::QueryTimedOut { session_id, elapsed_ms });
                    } else {
                        tracing::debug!(session_id, elapsed_ms, "deadline elapsed after session stopped");
                    }
                }
                _ = timer_disarm.cancelled() => {}
            }
        });

        DeadlineGuard {
            session_id,
            table: self.table.clone(),
            disarm,
        }
    }

    /// Disarm armed deadlines within `scope`.  Returns how many were
    /// disarmed; deadlines that already fired or were already extended
    /// are left alone, as are sessions whose signal already fired.
    ///
    /// `MostRecent` targets the most recently armed entry only.  If that
    /// entry is no longer armed the call has no effect, even when older
    /// entries still are.
    pub fn extend(&self, scope: ExtensionScope) -> usize {
        let mut table = self.table.lock();
        let targets: Vec<&mut DeadlineEntry> = match scope {
            ExtensionScope::AllPending => table.values_mut().collect(),
            ExtensionScope::MostRecent => table.values_mut().next_back().into_iter().collect(),
        };

        let mut extended = 0;
        for entry in targets {
            if entry.is_live() {
                entry.state = DeadlineState::Extended;
                entry.disarm.cancel();
                extended += 1;
            }
        }
        extended
    }

    pub fn state(&self, session_id: u64) -> Option<DeadlineState> {
        self.table.lock().get(&session_id).map(|e| e.state)
    }

    /// Number of sessions with a deadline entry, in any state.
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keeps a session's deadline entry alive.  Dropping it stops the timer.
pub struct DeadlineGuard {
    session_id: u64,
    table: DeadlineTable,
    disarm: CancellationToken,
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        self.disarm.cancel();
        self.table.lock().remove(&self.session_id);
    }
}

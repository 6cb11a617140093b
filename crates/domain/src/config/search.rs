use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Search lifecycle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Client-side deadline per search.  `0` disables the deadline.
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
    /// Fixed wait between polls.  When unset the adaptive policy is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    /// Which pending searches `run_beyond_timeout` applies to.
    #[serde(default)]
    pub extension_scope: ExtensionScope,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: d_timeout_ms(),
            poll_interval_ms: None,
            extension_scope: ExtensionScope::default(),
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_ms.map(Duration::from_millis)
    }
}

/// Scope of a run-beyond-timeout request when several searches are pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionScope {
    /// Disarm the deadline of every pending search.
    #[default]
    AllPending,
    /// Disarm only the deadline of the most recently started search.
    MostRecent,
}

fn d_timeout_ms() -> u64 {
    600_000
}

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Async-search backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Index pattern used when a request names no target.
    #[serde(default = "d_index")]
    pub index: String,
    /// How long the backend keeps an abandoned search around (`1m`, `5m`, ...).
    #[serde(default = "d_keep_alive")]
    pub keep_alive: String,
    /// How long a single submit/poll call may block server-side waiting
    /// for completion before returning a running response.
    #[serde(default = "d_wait_ms")]
    pub wait_for_completion_timeout_ms: u64,
    /// Per-HTTP-call timeout.
    #[serde(default = "d_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Environment variable holding an API key.  Unset → no auth header.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            index: d_index(),
            keep_alive: d_keep_alive(),
            wait_for_completion_timeout_ms: d_wait_ms(),
            request_timeout_ms: d_request_timeout_ms(),
            api_key_env: d_api_key_env(),
        }
    }
}

fn d_base_url() -> String {
    "http://localhost:9200".into()
}

fn d_index() -> String {
    "_all".into()
}

fn d_keep_alive() -> String {
    "1m".into()
}

fn d_wait_ms() -> u64 {
    100
}

fn d_request_timeout_ms() -> u64 {
    30_000
}

fn d_api_key_env() -> String {
    "SR_API_KEY".into()
}

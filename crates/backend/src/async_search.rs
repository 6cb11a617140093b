use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use sr_coordinator::{CancellationToken, SearchTransport};
use sr_domain::config::BackendConfig;
use sr_domain::error::{Error, Result};
use sr_domain::{Attempt, BackendError, SearchHandle, SearchRequest, SearchResponse};

use crate::wire;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Async-search client over HTTP.
///
/// Created once and shared by every search; the underlying
/// `reqwest::Client` keeps a connection pool.
#[derive(Debug, Clone)]
pub struct AsyncSearchClient {
    http: Client,
    base_url: String,
    index: String,
    keep_alive: String,
    wait_for_completion: Duration,
    api_key: Option<String>,
}

impl AsyncSearchClient {
    /// Build a client from the `[backend]` config section.  The API key is
    /// read from the environment variable the config names.
    pub fn new(cfg: &BackendConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        let api_key = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            index: cfg.index.clone(),
            keep_alive: cfg.keep_alive.clone(),
            wait_for_completion: Duration::from_millis(cfg.wait_for_completion_timeout_ms),
            api_key,
        })
    }

    /// Override the API key (mostly for tests and embedding).
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    // ── request helpers ──────────────────────────────────────────────

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        match self.api_key {
            Some(ref key) => rb.header("Authorization", format!("ApiKey {key}")),
            None => rb,
        }
    }

    /// Query parameters shared by submit and poll.
    fn wait_params(&self) -> [(&'static str, String); 2] {
        [
            (
                "wait_for_completion_timeout",
                format!("{}ms", self.wait_for_completion.as_millis()),
            ),
            ("keep_alive", self.keep_alive.clone()),
        ]
    }

    fn submit_request(&self, request: &SearchRequest) -> RequestBuilder {
        let index = request.target.as_deref().unwrap_or(&self.index);
        self.http
            .post(self.url(&format!("/{index}/_async_search")))
            .query(&self.wait_params())
            .json(&request.body)
    }

    fn poll_request(&self, handle: &SearchHandle) -> RequestBuilder {
        self.http
            .get(self.url(&format!("/_async_search/{handle}")))
            .query(&self.wait_params())
    }

    async fn send(&self, rb: RequestBuilder) -> std::result::Result<SearchResponse, BackendError> {
        let resp = self.decorate(rb).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        let raw = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(wire::to_error(status.as_u16(), &raw));
        }

        let body: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            BackendError::new(format!("invalid JSON from backend: {e}"))
                .with_status(status.as_u16())
                .with_payload(serde_json::Value::String(raw.clone()))
        })?;
        wire::to_response(body)
    }
}

#[async_trait]
impl SearchTransport for AsyncSearchClient {
    async fn attempt(
        &self,
        attempt: Attempt,
        cancel: CancellationToken,
    ) -> std::result::Result<SearchResponse, BackendError> {
        let rb = match &attempt {
            Attempt::Submit(request) => self.submit_request(request),
            Attempt::Poll(handle) => self.poll_request(handle),
        };

        tracing::debug!(poll = attempt.is_poll(), "async search request");

        tokio::select! {
            biased;
            result = self.send(rb) => result,
            _ = cancel.cancelled() => Err(BackendError::new("request aborted")),
        }
    }

    async fn release(&self, handle: &SearchHandle) -> std::result::Result<(), BackendError> {
        let rb = self.http.delete(self.url(&format!("/_async_search/{handle}")));
        let resp = self.decorate(rb).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let raw = resp.text().await.unwrap_or_default();
        Err(wire::to_error(status.as_u16(), &raw))
    }
}

/// Map a transport-level reqwest failure.  There is no HTTP status to
/// report, so only the message is set.
fn from_reqwest(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::new(format!("request timed out: {e}"))
    } else {
        BackendError::new(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AsyncSearchClient {
        let cfg = BackendConfig {
            base_url: "http://es.local:9200/".into(),
            index: "logs-*".into(),
            keep_alive: "5m".into(),
            wait_for_completion_timeout_ms: 250,
            api_key_env: "SR_TEST_KEY_THAT_IS_NOT_SET".into(),
            ..Default::default()
        };
        AsyncSearchClient::new(&cfg).unwrap()
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        assert_eq!(client().url("/_async_search/x"), "http://es.local:9200/_async_search/x");
    }

    #[test]
    fn submit_uses_default_index_and_wait_params() {
        let req = client()
            .submit_request(&SearchRequest::new(serde_json::json!({ "size": 0 })))
            .build()
            .unwrap();
        assert_eq!(req.method(), reqwest::Method::POST);
        assert_eq!(req.url().path(), "/logs-*/_async_search");
        let query = req.url().query().unwrap();
        assert!(query.contains("wait_for_completion_timeout=250ms"));
        assert!(query.contains("keep_alive=5m"));
        assert!(req.headers().get("Authorization").is_none());
    }

    #[test]
    fn submit_honours_request_target() {
        let req = client()
            .submit_request(&SearchRequest::new(serde_json::json!({})).with_target("metrics"))
            .build()
            .unwrap();
        assert_eq!(req.url().path(), "/metrics/_async_search");
    }

    #[test]
    fn poll_targets_the_handle() {
        let req = client()
            .poll_request(&SearchHandle::new("FmRld"))
            .build()
            .unwrap();
        assert_eq!(req.method(), reqwest::Method::GET);
        assert_eq!(req.url().path(), "/_async_search/FmRld");
    }

    #[test]
    fn api_key_header() {
        let c = client().with_api_key("abc");
        let req = c.decorate(c.poll_request(&SearchHandle::new("h"))).build().unwrap();
        assert_eq!(req.headers()["Authorization"], "ApiKey abc");
    }
}

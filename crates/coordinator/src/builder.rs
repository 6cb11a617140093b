//! Builder pattern for constructing a [`SearchCoordinator`].

use std::sync::Arc;
use std::time::Duration;

use sr_domain::config::{ExtensionScope, SearchConfig};
use sr_domain::{NoopTelemetry, TelemetrySink};

use crate::coordinator::{SearchCoordinator, Shared};
use crate::poll::PollPolicy;
use crate::transport::SearchTransport;

/// Fluent builder for [`SearchCoordinator`].
///
/// # Example
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # use sr_coordinator::{SearchCoordinator, SearchTransport, PollPolicy};
/// # fn demo(transport: Arc<dyn SearchTransport>) {
/// let coordinator = SearchCoordinator::builder(transport)
///     .timeout(Some(Duration::from_secs(30)))
///     .poll_policy(PollPolicy::Fixed(Duration::from_millis(500)))
///     .build();
/// # }
/// ```
pub struct SearchCoordinatorBuilder {
    transport: Arc<dyn SearchTransport>,
    telemetry: Arc<dyn TelemetrySink>,
    timeout: Option<Duration>,
    poll: PollPolicy,
    extension_scope: ExtensionScope,
}

impl SearchCoordinatorBuilder {
    pub fn new(transport: Arc<dyn SearchTransport>) -> Self {
        let defaults = SearchConfig::default();
        Self {
            transport,
            telemetry: Arc::new(NoopTelemetry),
            timeout: defaults.timeout(),
            poll: PollPolicy::from(defaults.poll_interval()),
            extension_scope: defaults.extension_scope,
        }
    }

    /// Apply the `[search]` section of the config file.
    pub fn config(mut self, cfg: &SearchConfig) -> Self {
        self.timeout = cfg.timeout();
        self.poll = PollPolicy::from(cfg.poll_interval());
        self.extension_scope = cfg.extension_scope;
        self
    }

    /// Client deadline per search (default 10 minutes).  `None` disables it.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Default wait policy between polls (default adaptive).
    pub fn poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn extension_scope(mut self, scope: ExtensionScope) -> Self {
        self.extension_scope = scope;
        self
    }

    /// Sink for lifecycle events (default: dropped).
    pub fn telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn build(self) -> SearchCoordinator {
        SearchCoordinator::from_shared(Shared::new(
            self.transport,
            self.telemetry,
            self.timeout,
            self.poll,
            self.extension_scope,
        ))
    }
}

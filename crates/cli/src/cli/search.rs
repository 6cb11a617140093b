//! `searchrelay search` — one-shot async search.
//!
//! Streams every backend response to stdout as one JSON line.  Ctrl-C
//! cancels the search through `cancel_pending`, and outstanding release
//! calls are flushed before the process exits.

use std::io::Write;
use std::sync::Arc;

use futures_util::StreamExt;
use sr_backend::AsyncSearchClient;
use sr_coordinator::{SearchCoordinator, SearchOptions, SearchRequest, SearchTransport};
use sr_domain::config::Config;
use sr_domain::{Error, SearchError, TelemetryEvent, TelemetrySink, TracingTelemetry};

use super::SearchArgs;

/// Exit code for a rejected attempt.
pub const EXIT_BACKEND_ERROR: i32 = 1;
/// Exit code for any cancellation-class ending (128 + SIGINT).
pub const EXIT_CANCELLED: i32 = 130;

/// Fold command-line overrides into the loaded config.
pub fn apply_overrides(config: &mut Config, args: &SearchArgs) {
    if let Some(index) = &args.index {
        config.backend.index = index.clone();
    }
    if let Some(ms) = args.poll_interval_ms {
        config.search.poll_interval_ms = Some(ms);
    }
    if let Some(ms) = args.timeout_ms {
        config.search.timeout_ms = ms;
    }
}

pub fn parse_query(raw: &str) -> sr_domain::Result<SearchRequest> {
    let body: serde_json::Value = serde_json::from_str(raw)?;
    if !body.is_object() {
        return Err(Error::Other("query must be a JSON object".into()));
    }
    Ok(SearchRequest::new(body))
}

pub fn build_coordinator(
    config: &Config,
    transport: Arc<dyn SearchTransport>,
    telemetry: Arc<dyn TelemetrySink>,
) -> SearchCoordinator {
    SearchCoordinator::builder(transport)
        .config(&config.search)
        .telemetry(telemetry)
        .build()
}

/// Drive one search to its end, writing responses to `out`.  Returns the
/// process exit code.
pub async fn drive(
    coordinator: &SearchCoordinator,
    request: SearchRequest,
    run_beyond_timeout: bool,
    telemetry: &dyn TelemetrySink,
    out: &mut impl Write,
) -> anyhow::Result<i32> {
    let mut stream = coordinator.search(request, SearchOptions::default());
    let mut offered = false;

    while let Some(item) = stream.next().await {
        match item {
            Ok(response) => {
                let line = serde_json::to_string(&response.payload)
                    .map_err(|e| anyhow::anyhow!("serializing response: {e}"))?;
                writeln!(out, "{line}")?;
                out.flush().ok();

                if run_beyond_timeout && response.is_running && !offered {
                    offered = true;
                    eprintln!("search still running, waiting past the client deadline");
                    telemetry.record(TelemetryEvent::LongQueryPopupShown);
                    coordinator.run_beyond_timeout();
                }
            }
            Err(err) => return Ok(exit_code(&err)),
        }
    }

    Ok(0)
}

pub fn exit_code(err: &SearchError) -> i32 {
    match err {
        SearchError::Aborted(reason) => {
            eprintln!("search stopped: {reason}");
            EXIT_CANCELLED
        }
        SearchError::Backend(e) => {
            match e.status {
                Some(status) => eprintln!("error: {e} (HTTP {status})"),
                None => eprintln!("error: {e}"),
            }
            EXIT_BACKEND_ERROR
        }
    }
}

/// Entry point for `searchrelay search`.  Returns the process exit code;
/// the caller exits only after flushing its trace exporter.
pub async fn run(mut config: Config, args: SearchArgs) -> anyhow::Result<i32> {
    apply_overrides(&mut config, &args);
    let request = parse_query(&args.query)?;

    let client = AsyncSearchClient::new(&config.backend)?;
    let telemetry: Arc<dyn TelemetrySink> = Arc::new(TracingTelemetry);
    let coordinator = build_coordinator(&config, Arc::new(client), telemetry.clone());

    let interrupt = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, cancelling");
                coordinator.cancel_pending();
            }
        })
    };

    let mut stdout = std::io::stdout();
    let code = drive(
        &coordinator,
        request,
        args.run_beyond_timeout,
        telemetry.as_ref(),
        &mut stdout,
    )
    .await?;

    interrupt.abort();
    coordinator.flush_cleanup().await;

    Ok(code)
}

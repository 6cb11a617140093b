//! Poll-loop behaviour: completion, continuation, graceful failure,
//! backend errors and which of them owe a release call.

mod support;

use std::sync::Arc;
use std::time::Duration;

use sr_coordinator::{
    AbortReason, Attempt, BackendError, CancellationToken, PollPolicy, SearchCoordinator,
    SearchError, SearchHandle, SearchOptions, SearchRequest,
};
use support::*;

fn request() -> SearchRequest {
    SearchRequest::new(serde_json::json!({ "query": { "match_all": {} } })).with_target("logs-*")
}

fn coordinator(transport: Arc<ScriptedTransport>) -> SearchCoordinator {
    SearchCoordinator::builder(transport)
        .timeout(Some(Duration::from_secs(60)))
        .poll_policy(PollPolicy::Fixed(Duration::from_millis(100)))
        .build()
}

#[tokio::test(start_paused = true)]
async fn immediate_completion_makes_one_call() {
    let transport = ScriptedTransport::new(vec![respond(10, complete(None))]);
    let coord = coordinator(transport.clone());

    let items = drain(coord.search(request(), SearchOptions::default())).await;

    assert_eq!(items, vec![Ok(complete(None))]);
    assert_eq!(transport.calls().len(), 1);
    assert!(matches!(transport.calls()[0].attempt, Attempt::Submit(_)));
    assert_eq!(coord.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn running_response_is_followed_by_a_poll_after_the_interval() {
    let transport = ScriptedTransport::new(vec![
        respond(0, running("h1")),
        respond(0, running("h1")),
        respond(0, complete(Some("h1"))),
    ]);
    let coord = coordinator(transport.clone());

    let items = drain(coord.search(request(), SearchOptions::default())).await;

    assert_eq!(
        items,
        vec![Ok(running("h1")), Ok(running("h1")), Ok(complete(Some("h1")))]
    );

    let calls = transport.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].attempt, Attempt::Submit(request()));
    assert_eq!(calls[1].attempt, Attempt::Poll(SearchHandle::new("h1")));
    assert_eq!(calls[2].attempt, Attempt::Poll(SearchHandle::new("h1")));
    assert!(calls[1].at >= calls[0].at + Duration::from_millis(100));
    assert!(calls[2].at >= calls[1].at + Duration::from_millis(100));

    coord.flush_cleanup().await;
    assert!(transport.releases().is_empty());
}

#[tokio::test(start_paused = true)]
async fn per_search_poll_interval_overrides_policy() {
    let transport = ScriptedTransport::new(vec![
        respond(0, running("h1")),
        respond(0, complete(Some("h1"))),
    ]);
    let coord = coordinator(transport.clone());

    let options = SearchOptions::default().poll_interval(Duration::from_millis(700));
    drain(coord.search(request(), options)).await;

    let calls = transport.calls();
    assert_eq!(calls[1].at - calls[0].at, Duration::from_millis(700));
}

#[tokio::test(start_paused = true)]
async fn graceful_failure_emits_response_then_cancellation_error() {
    let transport = ScriptedTransport::new(vec![
        respond(0, running("h1")),
        respond(0, gave_up("h1")),
    ]);
    let coord = coordinator(transport.clone());

    let items = drain(coord.search(request(), SearchOptions::default())).await;

    assert_eq!(
        items,
        vec![
            Ok(running("h1")),
            Ok(gave_up("h1")),
            Err(SearchError::Aborted(AbortReason::GracefulFailure)),
        ]
    );
    assert!(items[2].as_ref().unwrap_err().is_cancellation());

    coord.flush_cleanup().await;
    assert_eq!(transport.releases(), vec![SearchHandle::new("h1")]);
}

#[tokio::test(start_paused = true)]
async fn graceful_failure_on_first_response_without_handle_skips_release() {
    let mut first = gave_up("unused");
    first.id = None;
    let transport = ScriptedTransport::new(vec![respond(0, first.clone())]);
    let coord = coordinator(transport.clone());

    let items = drain(coord.search(request(), SearchOptions::default())).await;

    assert_eq!(
        items,
        vec![Ok(first), Err(SearchError::Aborted(AbortReason::GracefulFailure))]
    );
    coord.flush_cleanup().await;
    assert!(transport.releases().is_empty());
}

#[tokio::test(start_paused = true)]
async fn backend_error_is_passed_through_verbatim_and_releases() {
    let error = BackendError::new("search_phase_execution_exception")
        .with_status(400)
        .with_payload(serde_json::json!({ "error": { "type": "search_phase_execution_exception" } }));
    let transport = ScriptedTransport::new(vec![
        respond(0, running("h1")),
        reject(0, error.clone()),
    ]);
    let coord = coordinator(transport.clone());

    let items = drain(coord.search(request(), SearchOptions::default())).await;

    assert_eq!(items, vec![Ok(running("h1")), Err(SearchError::Backend(error))]);
    assert!(!items[1].as_ref().unwrap_err().is_cancellation());

    coord.flush_cleanup().await;
    assert_eq!(transport.releases(), vec![SearchHandle::new("h1")]);
}

#[tokio::test(start_paused = true)]
async fn backend_error_before_any_handle_skips_release() {
    let error = BackendError::new("index_not_found_exception").with_status(404);
    let transport = ScriptedTransport::new(vec![reject(5, error.clone())]);
    let coord = coordinator(transport.clone());

    let items = drain(coord.search(request(), SearchOptions::default())).await;

    assert_eq!(items, vec![Err(SearchError::Backend(error))]);
    coord.flush_cleanup().await;
    assert!(transport.releases().is_empty());
    // No retry after a failed attempt.
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn completion_with_handle_never_releases() {
    let transport = ScriptedTransport::new(vec![
        respond(0, running("h1")),
        respond(0, complete(Some("h1"))),
    ]);
    let coord = coordinator(transport.clone());

    drain(coord.search(request(), SearchOptions::default())).await;

    coord.flush_cleanup().await;
    assert!(transport.releases().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failing_release_does_not_change_the_outcome() {
    let transport = ScriptedTransport::with_failing_release(vec![
        respond(0, running("h1")),
        respond(0, gave_up("h1")),
    ]);
    let coord = coordinator(transport.clone());

    let items = drain(coord.search(request(), SearchOptions::default())).await;

    assert_eq!(
        items.last(),
        Some(&Err(SearchError::Aborted(AbortReason::GracefulFailure)))
    );
    coord.flush_cleanup().await;
    assert_eq!(transport.releases().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn search_is_lazy_and_each_invocation_is_independent() {
    let transport = ScriptedTransport::new(vec![
        respond(0, complete(None)),
        respond(0, complete(None)),
    ]);
    let coord = coordinator(transport.clone());

    let first = coord.search(request(), SearchOptions::default());
    let second = coord.search(request(), SearchOptions::default());
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(transport.calls().is_empty());
    assert_eq!(coord.pending_count(), 0);

    drain(first).await;
    assert_eq!(transport.calls().len(), 1);
    drain(second).await;
    assert_eq!(transport.calls().len(), 2);
    assert!(transport
        .calls()
        .iter()
        .all(|c| matches!(c.attempt, Attempt::Submit(_))));
}

#[tokio::test(start_paused = true)]
async fn first_handle_is_kept_for_later_polls() {
    let transport = ScriptedTransport::new(vec![
        respond(0, running("h1")),
        respond(0, running("other")),
        respond(0, running("h1")),
        respond(0, gave_up("h1")),
    ]);
    let coord = coordinator(transport.clone());

    drain(coord.search(request(), SearchOptions::default())).await;

    let calls = transport.calls();
    assert_eq!(calls.len(), 4);
    for call in &calls[1..] {
        assert_eq!(call.attempt, Attempt::Poll(SearchHandle::new("h1")));
    }
    coord.flush_cleanup().await;
    assert_eq!(transport.releases(), vec![SearchHandle::new("h1")]);
}

#[tokio::test(start_paused = true)]
async fn running_response_without_id_is_an_error() {
    let mut anonymous = running("x");
    anonymous.id = None;
    let transport = ScriptedTransport::new(vec![respond(0, anonymous)]);
    let coord = coordinator(transport.clone());

    let items = drain(coord.search(request(), SearchOptions::default())).await;

    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Err(SearchError::Backend(_))));
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn session_is_tracked_only_while_in_flight() {
    let transport = ScriptedTransport::new(vec![
        respond(0, running("h1")),
        respond(1_000, complete(Some("h1"))),
    ]);
    let coord = coordinator(transport.clone());

    let task = spawn_drain(coord.search(request(), SearchOptions::default()));
    tokio::time::sleep(Duration::from_millis(500)).await;

    let pending = coord.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].handle, Some(SearchHandle::new("h1")));
    assert_eq!(pending[0].state, sr_coordinator::SessionState::Running);

    task.await.unwrap();
    assert_eq!(coord.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_stream_releases_and_untracks() {
    let transport = ScriptedTransport::new(vec![respond(0, running("h1"))]);
    let coord = coordinator(transport.clone());

    let mut stream = coord.search(request(), SearchOptions::default());
    let first = futures_util::StreamExt::next(&mut stream).await;
    assert_eq!(first, Some(Ok(running("h1"))));
    assert_eq!(coord.pending_count(), 1);

    drop(stream);
    assert_eq!(coord.pending_count(), 0);
    coord.flush_cleanup().await;
    assert_eq!(transport.releases(), vec![SearchHandle::new("h1")]);
}

#[tokio::test(start_paused = true)]
async fn dropping_an_unpolled_stream_does_nothing() {
    let transport = ScriptedTransport::new(vec![]);
    let coord = coordinator(transport.clone());

    let stream = coord.search(request(), SearchOptions::default());
    drop(stream);

    coord.flush_cleanup().await;
    assert!(transport.calls().is_empty());
    assert!(transport.releases().is_empty());
}

#[tokio::test(start_paused = true)]
async fn pre_cancelled_external_source_makes_no_calls() {
    let transport = ScriptedTransport::new(vec![respond(0, complete(None))]);
    let coord = coordinator(transport.clone());

    let external = CancellationToken::new();
    external.cancel();
    let items = drain(coord.search(request(), SearchOptions::default().cancel_on(external))).await;

    assert_eq!(items, vec![Err(SearchError::Aborted(AbortReason::External))]);
    assert!(transport.calls().is_empty());
    assert_eq!(coord.pending_count(), 0);
}

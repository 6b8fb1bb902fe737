//! Request lifecycle tests for the search coordinator
//!
//! Backends are replayed; time is paused so timeouts and delays are
//! deterministic.

use std::sync::Arc;
use std::time::Duration;

use quarry_config::SearchConfig;
use quarry_search::{
    BackendErrorKind, CancellationToken, ReplayBackend, RequestStatus, SearchCoordinator,
    SearchError, SearchOptions, SearchRequest, get_response_inspector_stats,
};
use serde_json::{Value, json};

fn ok_response() -> Value {
    json!({
        "took": 4,
        "timed_out": false,
        "_shards": {"total": 1, "successful": 1, "failed": 0},
        "hits": {"total": {"value": 3, "relation": "eq"}, "hits": []}
    })
}

fn request() -> SearchRequest {
    SearchRequest::new("logs-*", json!({"size": 0, "query": {"match_all": {}}}))
}

fn coordinator(backend: &Arc<ReplayBackend>) -> SearchCoordinator {
    SearchCoordinator::new(backend.clone(), &SearchConfig::default())
}

#[tokio::test]
async fn test_completed_search_is_recorded() {
    let backend = Arc::new(ReplayBackend::new(ok_response()));
    let coordinator = coordinator(&backend);

    let pending = coordinator.search(request(), SearchOptions::new());
    assert_eq!(pending.status(), RequestStatus::Created);
    assert_eq!(pending.fingerprint(), request().fingerprint());
    let id = pending.id();

    let response = pending.run().await.unwrap();
    assert_eq!(response, ok_response());
    assert_eq!(backend.calls(), 1);

    let record = coordinator.inspector().get(id).unwrap();
    assert_eq!(record.status, RequestStatus::Completed);
    assert_eq!(record.request, request().body);
    assert_eq!(record.response, Some(ok_response()));
    assert!(record.end >= record.start);

    let stats = get_response_inspector_stats(&record);
    assert!(stats.iter().any(|s| s.label == "Hits (total)" && s.value == "3"));
}

#[tokio::test]
async fn test_preference_is_recorded() {
    let backend = Arc::new(ReplayBackend::new(ok_response()));
    let coordinator = coordinator(&backend);

    let pending = coordinator.search(request().with_preference("abc"), SearchOptions::new());
    let id = pending.id();
    pending.run().await.unwrap();

    let record = coordinator.inspector().get(id).unwrap();
    assert_eq!(record.preference.as_deref(), Some("abc"));
    assert_eq!(record.request, request().body);
}

#[tokio::test]
async fn test_signal_fired_before_dispatch() {
    let backend = Arc::new(ReplayBackend::new(ok_response()));
    let coordinator = coordinator(&backend);

    let signal = CancellationToken::new();
    signal.cancel();
    let pending = coordinator.search(request(), SearchOptions::new().with_signal(signal));
    let id = pending.id();

    let err = pending.run().await.unwrap_err();
    assert_eq!(err, SearchError::Aborted { request_id: id });
    assert_eq!(backend.calls(), 0);

    let records = coordinator.inspector().records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, RequestStatus::Aborted);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_yields_aborted_once() {
    let backend = Arc::new(ReplayBackend::new(ok_response()).with_delay(Duration::from_secs(10)));
    let coordinator = coordinator(&backend);

    let signal = CancellationToken::new();
    let pending = coordinator.search(request(), SearchOptions::new().with_signal(signal.clone()));
    let id = pending.id();
    let handle = tokio::spawn(pending.run());

    tokio::time::sleep(Duration::from_secs(1)).await;
    signal.cancel();
    // A second cancel has no further effect
    signal.cancel();

    let result = handle.await.unwrap();
    assert_eq!(result.unwrap_err(), SearchError::Aborted { request_id: id });

    let records = coordinator.inspector().records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, RequestStatus::Aborted);
    assert!(backend.tokens()[0].is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_cancels_backend() {
    let backend = Arc::new(ReplayBackend::new(ok_response()).with_delay(Duration::from_secs(60)));
    let coordinator = coordinator(&backend);

    let pending = coordinator.search(
        request(),
        SearchOptions::new().with_timeout(Duration::from_secs(5)),
    );
    let id = pending.id();

    let err = pending.run().await.unwrap_err();
    assert_eq!(
        err,
        SearchError::Timeout {
            request_id: id,
            timeout_ms: 5000
        }
    );
    assert!(backend.tokens()[0].is_cancelled());
    assert_eq!(
        coordinator.inspector().last().unwrap().status,
        RequestStatus::TimedOut
    );
}

#[tokio::test(start_paused = true)]
async fn test_default_timeout_from_config() {
    let backend = Arc::new(ReplayBackend::new(ok_response()).with_delay(Duration::from_secs(60)));
    let config = SearchConfig {
        timeout: Duration::from_secs(2),
        ..SearchConfig::default()
    };
    let coordinator = SearchCoordinator::new(backend.clone(), &config);

    let err = coordinator
        .search(request(), SearchOptions::new())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Timeout { timeout_ms: 2000, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_fast_backend_beats_timeout() {
    let backend = Arc::new(ReplayBackend::new(ok_response()).with_delay(Duration::from_millis(100)));
    let coordinator = coordinator(&backend);

    let response = coordinator
        .search(request(), SearchOptions::new().with_timeout(Duration::from_secs(1)))
        .run()
        .await
        .unwrap();
    assert_eq!(response["took"], 4);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_running_search_cancels_backend() {
    let backend = Arc::new(ReplayBackend::new(ok_response()).with_delay(Duration::from_secs(10)));
    let coordinator = coordinator(&backend);

    let run = coordinator.search(request(), SearchOptions::new()).run();
    let elapsed = tokio::time::timeout(Duration::from_secs(1), run).await;
    assert!(elapsed.is_err());

    assert!(backend.tokens()[0].is_cancelled());
    assert_eq!(
        coordinator.inspector().last().unwrap().status,
        RequestStatus::Aborted
    );
}

#[tokio::test]
async fn test_dropped_before_run_is_recorded() {
    let backend = Arc::new(ReplayBackend::new(ok_response()));
    let coordinator = coordinator(&backend);

    drop(coordinator.search(request(), SearchOptions::new()));

    assert_eq!(backend.calls(), 0);
    assert_eq!(coordinator.inspector().len(), 1);
    assert_eq!(
        coordinator.inspector().last().unwrap().status,
        RequestStatus::Aborted
    );
}

#[tokio::test]
async fn test_painless_error_is_distinguished() {
    let error = json!({
        "error": {
            "root_cause": [{"type": "script_exception", "reason": "compile error", "lang": "painless"}],
            "type": "search_phase_execution_exception",
            "reason": "all shards failed"
        },
        "status": 400
    });
    let backend = Arc::new(ReplayBackend::new(error.clone()));
    let coordinator = coordinator(&backend);

    let err = coordinator
        .search(request(), SearchOptions::new())
        .run()
        .await
        .unwrap_err();
    assert!(err.is_painless());
    assert!(matches!(
        err,
        SearchError::Backend { kind: BackendErrorKind::Painless, ref message, .. } if message == "compile error"
    ));

    let record = coordinator.inspector().last().unwrap();
    assert_eq!(record.status, RequestStatus::Failed);
    assert_eq!(record.response, Some(error));
    assert_eq!(record.error.as_deref(), Some("compile error"));
}

#[tokio::test]
async fn test_transport_failure() {
    let backend = Arc::new(ReplayBackend::default());
    let coordinator = coordinator(&backend);

    let err = coordinator
        .search(request(), SearchOptions::new())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SearchError::Backend { kind: BackendErrorKind::General, .. }
    ));
    assert_eq!(
        coordinator.inspector().last().unwrap().status,
        RequestStatus::Failed
    );
}

#[tokio::test]
async fn test_partial_response_is_returned() {
    let partial = json!({
        "took": 9,
        "_shards": {"total": 2, "successful": 1, "failed": 1},
        "hits": {"total": {"value": 1}, "hits": []}
    });
    let backend = Arc::new(ReplayBackend::new(partial.clone()));
    let coordinator = coordinator(&backend);

    let response = coordinator
        .search(request(), SearchOptions::new())
        .run()
        .await
        .unwrap();
    assert_eq!(response, partial);
}

#[tokio::test]
async fn test_each_call_is_independent() {
    let backend = Arc::new(ReplayBackend::new(ok_response()));
    let coordinator = coordinator(&backend);

    let first = coordinator.search(request(), SearchOptions::new());
    let second = coordinator.search(request(), SearchOptions::new());
    assert_ne!(first.id(), second.id());
    assert_eq!(first.fingerprint(), second.fingerprint());

    first.run().await.unwrap();
    second.run().await.unwrap();
    assert_eq!(backend.calls(), 2);
    assert_eq!(coordinator.inspector().len(), 2);
}

#[tokio::test]
async fn test_index_specific_responses() {
    let backend = Arc::new(
        ReplayBackend::new(ok_response()).with_index_response("metrics-*", json!({"took": 99})),
    );
    let coordinator = coordinator(&backend);

    let response = coordinator
        .search(
            SearchRequest::new("metrics-*", json!({"size": 0})),
            SearchOptions::new(),
        )
        .run()
        .await
        .unwrap();
    assert_eq!(response["took"], 99);
}

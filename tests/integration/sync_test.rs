//! Queue and sync executor against a live HTTP endpoint

use crate::common::*;
use serde_json::json;
use std::time::Duration;
use volunteer_sync::shared::{BroadcastMessage, Topic};
use volunteer_sync::worker::offline::{OperationStatus, Submitted};
use volunteer_sync::worker::sync::SyncTrigger;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_accepted_operation_is_synced() {
    let t = TestEngine::start().await;
    Mock::given(method("POST"))
        .and(path("/api/events/evt-1/register"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({"shift": "morning"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"registered": true})))
        .expect(1)
        .mount(&t.server)
        .await;

    let mut ui = t.engine.subscribe(&[Topic::Sync]);
    let id = t.queue(registration("evt-1")).await;

    let report = assert_ok!(t.engine.executor().drain(SyncTrigger::ConnectivityRestored).await);
    assert_eq!(report.synced, vec![id]);
    assert_operation!(t.engine.queue(), id, OperationStatus::Synced, attempts = 1);

    let operation = assert_ok!(t.engine.queue().get(id).await).unwrap();
    assert!(operation.last_error.is_none());
    assert!(operation.last_attempt_at.is_some());

    match ui.recv().await {
        Some(BroadcastMessage::OperationSynced { operation_id, .. }) => assert_eq!(operation_id, id),
        other => panic!("unexpected broadcast: {:?}", other),
    }
    match ui.recv().await {
        Some(BroadcastMessage::SyncComplete { synced, .. }) => assert_eq!(synced, 1),
        other => panic!("unexpected broadcast: {:?}", other),
    }
    assert_eq!(t.presenter.tags(), vec![format!("sync-{}", id)]);
}

#[tokio::test]
async fn test_rejected_operation_is_never_retried() {
    let t = TestEngine::start().await;
    Mock::given(method("POST"))
        .and(path("/api/events/evt-2/check-in"))
        .respond_with(ResponseTemplate::new(409).set_body_string("already checked in"))
        .expect(1)
        .mount(&t.server)
        .await;

    let id = t.queue(check_in("evt-2")).await;
    let report = assert_ok!(t.engine.executor().drain(SyncTrigger::Manual).await);
    assert_eq!(report.rejected, vec![id]);

    for _ in 0..2 {
        let report = assert_ok!(t.engine.executor().drain(SyncTrigger::Manual).await);
        assert_eq!(report.attempted(), 0);
    }

    assert_operation!(t.engine.queue(), id, OperationStatus::Failed, attempts = 1);
    let operation = assert_ok!(t.engine.queue().get(id).await).unwrap();
    let error = operation.last_error.unwrap();
    assert_contains!(error, "409");
    assert_contains!(error, "already checked in");
    assert!(t.presenter.tags().contains(&"sync-failures".to_string()));
}

#[tokio::test]
async fn test_timeouts_keep_operation_pending() {
    let t = TestEngine::with_timeout(Duration::from_millis(200)).await;
    Mock::given(method("POST"))
        .and(path("/api/events/evt-3/register"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&t.server)
        .await;

    let id = t.queue(registration("evt-3")).await;
    for _ in 0..3 {
        let report = assert_ok!(t.engine.executor().drain(SyncTrigger::BackgroundWakeup).await);
        assert_eq!(report.retrying, vec![id]);
    }

    assert_operation!(t.engine.queue(), id, OperationStatus::Pending, attempts = 3);
    let operation = assert_ok!(t.engine.queue().get(id).await).unwrap();
    assert!(operation.last_error.is_some());
}

#[tokio::test]
async fn test_server_error_then_success() {
    let t = TestEngine::start().await;
    Mock::given(method("POST"))
        .and(path("/api/events/evt-4/check-in"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&t.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/events/evt-4/check-in"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&t.server)
        .await;

    let id = t.queue(check_in("evt-4")).await;

    assert_ok!(t.engine.executor().drain(SyncTrigger::Manual).await);
    assert_operation!(t.engine.queue(), id, OperationStatus::Pending, attempts = 1);
    let operation = assert_ok!(t.engine.queue().get(id).await).unwrap();
    assert_eq!(operation.last_error.as_deref(), Some("HTTP 503"));

    assert_ok!(t.engine.executor().drain(SyncTrigger::Manual).await);
    assert_operation!(t.engine.queue(), id, OperationStatus::Synced, attempts = 2);
    let operation = assert_ok!(t.engine.queue().get(id).await).unwrap();
    assert!(operation.last_error.is_none());
}

#[tokio::test]
async fn test_drain_replays_in_creation_order() {
    let t = TestEngine::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&t.server)
        .await;

    t.queue(check_in("evt-c")).await;
    t.queue(registration("evt-a")).await;
    t.queue(check_in("evt-b")).await;

    let report = assert_ok!(t.engine.executor().drain(SyncTrigger::Manual).await);
    assert_eq!(report.synced.len(), 3);

    let paths: Vec<String> = t
        .server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(
        paths,
        vec![
            "/api/events/evt-c/check-in",
            "/api/events/evt-a/register",
            "/api/events/evt-b/check-in",
        ]
    );
}

#[tokio::test]
async fn test_offline_submit_is_queued_and_replayed() {
    let t = TestEngine::start().await;
    Mock::given(method("POST"))
        .and(path("/api/events/evt-5/register"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&t.server)
        .await;

    t.engine.network().set_online(false);
    let submitted = assert_ok!(t.engine.submit(registration("evt-5")).await);
    let id = match submitted {
        Submitted::Queued(enqueued) => enqueued.operation().id,
        other => panic!("expected the action to be queued, got {:?}", other),
    };
    // Same action again while still offline does not duplicate it.
    let again = assert_ok!(t.engine.submit(registration("evt-5")).await);
    match again {
        Submitted::Queued(enqueued) => assert_eq!(enqueued.operation().id, id),
        other => panic!("expected the action to be queued, got {:?}", other),
    }
    assert_eq!(t.server.received_requests().await.unwrap().len(), 0);

    let worker = t.engine.spawn_worker();
    let mut reports = worker.reports();
    t.engine.network().set_online(true);

    let report = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            reports.changed().await.expect("worker alive");
            if let Some(report) = reports.borrow_and_update().clone() {
                if report.trigger == SyncTrigger::ConnectivityRestored {
                    return report;
                }
            }
        }
    })
    .await
    .expect("drain after reconnect");

    assert_eq!(report.synced, vec![id]);
    worker.shutdown().await;
}

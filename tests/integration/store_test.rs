//! Durability of queued work across restarts

use crate::common::*;
use chrono::Utc;
use volunteer_sync::worker::local_db::schema::CURRENT_SCHEMA_VERSION;
use volunteer_sync::worker::local_db::LocalStore;
use volunteer_sync::worker::notifications::NotificationInbox;
use volunteer_sync::worker::offline::{AttemptOutcome, OperationKind, OperationQueue, OperationStatus};
use volunteer_sync::worker::push::{normalize, ParsedPush};

#[tokio::test]
async fn test_queue_and_inbox_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("volunteer.db");

    let (first, second) = {
        let store = assert_ok!(LocalStore::open(&path).await);
        assert_eq!(store.schema_version(), CURRENT_SCHEMA_VERSION);
        let queue = OperationQueue::new(store.clone());
        let first = assert_ok!(queue.enqueue(registration("evt-1")).await).operation().id;
        let second = assert_ok!(queue.enqueue(check_in("evt-1")).await).operation().id;

        let inbox = NotificationInbox::new(store.clone());
        let record = normalize(ParsedPush::parse(Some(b"Welcome aboard")), Utc::now());
        assert_ok!(inbox.save(&record).await);

        store.close().await;
        (first, second)
    };

    let store = assert_ok!(LocalStore::open(&path).await);
    let queue = OperationQueue::new(store.clone());
    let pending = assert_ok!(queue.pending().await);
    let ids: Vec<i64> = pending.iter().map(|op| op.id).collect();
    assert_eq!(ids, vec![first, second]);
    assert_eq!(pending[0].kind, OperationKind::Registration);
    assert_eq!(pending[1].status, OperationStatus::Pending);

    let third = assert_ok!(queue.enqueue(registration("evt-2")).await).operation().id;
    assert!(third > second);

    let inbox = NotificationInbox::new(store.clone());
    let list = assert_ok!(inbox.list().await);
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].body, "Welcome aboard");
    store.close().await;
}

#[tokio::test]
async fn test_failed_operation_can_be_requeued() {
    let t = TestEngine::start().await;
    let queue = t.engine.queue();
    let id = t.queue(check_in("evt-9")).await;

    assert_ok!(queue.apply_outcome(id, &AttemptOutcome::from_status(400, "closed"), Utc::now()).await);
    assert_eq!(assert_ok!(queue.stats().await).failed, 1);

    let requeued = assert_ok!(queue.requeue(id).await);
    assert_eq!(requeued.status, OperationStatus::Pending);
    assert_eq!(requeued.attempt_count, 1);

    let stats = assert_ok!(queue.stats().await);
    assert_eq!((stats.pending, stats.failed), (1, 0));
}

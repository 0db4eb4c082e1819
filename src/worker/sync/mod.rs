//! # Sync Executor
//!
//! Drains the operation queue against the remote API.
//!
//! ## Drain pass
//!
//! 1. Read `pending` operations through the `status` index, oldest first
//! 2. For each one: re-check it is still pending, call the API, classify the
//!    result and apply it in a fresh transaction (skipped if a concurrent
//!    drain already moved the record)
//! 3. Publish per-item results to foreground contexts, show a confirmation
//!    alert for each newly synced operation
//! 4. Publish `SYNC_COMPLETE`, show one aggregate alert if anything was
//!    rejected, delete synced records past their retention and prune
//!    expired cache entries
//!
//! A network failure or rejection only affects its own item. A store
//! failure aborts the pass; the queue stays durable for the next trigger.
//!
//! ## Triggers
//!
//! [`SyncWorker`] runs drains on connectivity restore, explicit requests
//! and a periodic background wake-up. Passes on one executor run one at a
//! time; a second trigger waits and then finds nothing left to send.

pub mod background;
pub mod network_monitor;

pub use background::{SyncWorker, SyncWorkerHandle};
pub use network_monitor::{NetworkMonitor, NetworkStatus};

use crate::backend::realtime::Broadcaster;
use crate::shared::{BroadcastMessage, NotificationData, Topic};
use crate::worker::api_client::RemoteApi;
use crate::worker::cache;
use crate::worker::offline::{AttemptOutcome, OperationKind, OperationQueue, OperationStatus, PendingOperation, SyncError};
use crate::worker::push::presenter::{Alert, AlertPresenter};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// What started a drain pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    ConnectivityRestored,
    Manual,
    BackgroundWakeup,
    Startup,
}

impl SyncTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTrigger::ConnectivityRestored => "connectivity-restored",
            SyncTrigger::Manual => "manual",
            SyncTrigger::BackgroundWakeup => "background-wakeup",
            SyncTrigger::Startup => "startup",
        }
    }
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one drain pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub trigger: SyncTrigger,
    /// Operations confirmed in this pass
    pub synced: Vec<i64>,
    /// Operations permanently rejected in this pass
    pub rejected: Vec<i64>,
    /// Operations left pending after a transient failure
    pub retrying: Vec<i64>,
    /// Operations another pass handled first
    pub skipped: usize,
    /// Old synced records deleted at the end of the pass
    pub cleaned_up: usize,
    /// Expired cached responses and entity snapshots deleted
    pub cache_pruned: usize,
}

impl DrainReport {
    fn new(trigger: SyncTrigger) -> Self {
        Self {
            trigger,
            synced: Vec::new(),
            rejected: Vec::new(),
            retrying: Vec::new(),
            skipped: 0,
            cleaned_up: 0,
            cache_pruned: 0,
        }
    }

    pub fn attempted(&self) -> usize {
        self.synced.len() + self.rejected.len() + self.retrying.len()
    }
}

/// Replays queued operations against the remote API
pub struct SyncExecutor {
    queue: OperationQueue,
    api: Arc<dyn RemoteApi>,
    broadcaster: Arc<dyn Broadcaster>,
    presenter: Arc<dyn AlertPresenter>,
    synced_retention: Duration,
    cache_retention: Option<Duration>,
    pass: Mutex<()>,
}

impl SyncExecutor {
    pub fn new(
        queue: OperationQueue,
        api: Arc<dyn RemoteApi>,
        broadcaster: Arc<dyn Broadcaster>,
        presenter: Arc<dyn AlertPresenter>,
        synced_retention: Duration,
    ) -> Self {
        Self {
            queue,
            api,
            broadcaster,
            presenter,
            synced_retention,
            cache_retention: None,
            pass: Mutex::new(()),
        }
    }

    /// Also prune cached responses and entities older than `retention`
    /// at the end of each pass
    pub fn with_cache_retention(mut self, retention: Duration) -> Self {
        self.cache_retention = Some(retention);
        self
    }

    pub fn queue(&self) -> &OperationQueue {
        &self.queue
    }

    /// Run one drain pass over every pending operation.
    pub async fn drain(&self, trigger: SyncTrigger) -> Result<DrainReport, SyncError> {
        let _pass = self.pass.lock().await;
        let pending = self.queue.pending().await?;
        let mut report = DrainReport::new(trigger);

        if !pending.is_empty() {
            tracing::info!("[Sync] Draining {} pending operations ({})", pending.len(), trigger);
        }

        for operation in pending {
            self.sync_one(operation, &mut report).await?;
        }

        if let Some(cutoff) = chrono::Duration::from_std(self.synced_retention)
            .ok()
            .and_then(|retention| Utc::now().checked_sub_signed(retention))
        {
            report.cleaned_up = self.queue.cleanup_synced(cutoff).await?;
        }
        report.cache_pruned = self.prune_caches().await;

        self.broadcaster.publish(
            Topic::Sync,
            BroadcastMessage::SyncComplete {
                trigger: trigger.to_string(),
                synced: report.synced.len(),
                rejected: report.rejected.len(),
                retrying: report.retrying.len(),
            },
        );

        if !report.rejected.is_empty() {
            let count = report.rejected.len();
            let alert = Alert::new(
                "sync-failures",
                "Some actions could not be synced",
                format!("{} {} rejected by the server", count, if count == 1 { "action was" } else { "actions were" }),
            );
            self.show(alert).await;
        }

        if report.attempted() > 0 {
            tracing::info!(
                "[Sync] Drain complete: {} synced, {} rejected, {} retrying",
                report.synced.len(),
                report.rejected.len(),
                report.retrying.len()
            );
        }
        Ok(report)
    }

    async fn sync_one(&self, operation: PendingOperation, report: &mut DrainReport) -> Result<(), SyncError> {
        // Another pass may have finished this item since the list was read.
        match self.queue.get(operation.id).await? {
            Some(current) if current.status == OperationStatus::Pending => {}
            _ => {
                report.skipped += 1;
                return Ok(());
            }
        }

        let result = self.api.submit(&operation).await;
        let outcome = AttemptOutcome::classify(&result);

        let (updated, _) = match self.queue.apply_outcome(operation.id, &outcome, Utc::now()).await? {
            Some(applied) => applied,
            None => {
                report.skipped += 1;
                return Ok(());
            }
        };

        match updated.status {
            OperationStatus::Synced => {
                tracing::info!("[Sync] Operation {} ({} {}) synced", updated.id, updated.kind, updated.foreign_key);
                report.synced.push(updated.id);
                self.broadcaster.publish(
                    Topic::Sync,
                    BroadcastMessage::OperationSynced {
                        operation_id: updated.id,
                        kind: updated.kind.to_string(),
                        foreign_key: updated.foreign_key.clone(),
                        synced_at: updated.last_attempt_at.unwrap_or_else(Utc::now),
                    },
                );
                self.show(synced_alert(&updated)).await;
            }
            OperationStatus::Failed => {
                let reason = updated.last_error.clone().unwrap_or_default();
                tracing::warn!("[Sync] Operation {} rejected: {}", updated.id, reason);
                report.rejected.push(updated.id);
                self.broadcaster.publish(
                    Topic::Sync,
                    BroadcastMessage::OperationRejected {
                        operation_id: updated.id,
                        kind: updated.kind.to_string(),
                        foreign_key: updated.foreign_key.clone(),
                        reason,
                    },
                );
            }
            OperationStatus::Pending => {
                tracing::debug!(
                    "[Sync] Operation {} will retry (attempt {}): {}",
                    updated.id,
                    updated.attempt_count,
                    updated.last_error.as_deref().unwrap_or("unknown error")
                );
                report.retrying.push(updated.id);
            }
        }
        Ok(())
    }

    /// Cache maintenance never fails a pass
    async fn prune_caches(&self) -> usize {
        let Some(cutoff) = self
            .cache_retention
            .and_then(|retention| chrono::Duration::from_std(retention).ok())
            .and_then(|retention| Utc::now().checked_sub_signed(retention))
        else {
            return 0;
        };
        match cache::prune_caches(self.queue.store(), cutoff).await {
            Ok((responses, entities)) => responses + entities,
            Err(e) => {
                tracing::warn!("[Sync] Cache pruning failed: {}", e);
                0
            }
        }
    }

    async fn show(&self, alert: Alert) {
        if let Err(e) = self.presenter.show(alert).await {
            tracing::warn!("[Sync] {}", e);
        }
    }
}

fn synced_alert(operation: &PendingOperation) -> Alert {
    let title = match operation.kind {
        OperationKind::Registration => "Registration synced",
        OperationKind::CheckIn => "Check-in synced",
    };
    let mut alert = Alert::new(
        format!("sync-{}", operation.id),
        title,
        format!("Your offline {} for event {} was confirmed", operation.kind, operation.foreign_key),
    );
    alert.data = NotificationData {
        event_id: Some(operation.foreign_key.clone()),
        url: Some(format!("/events/{}", operation.foreign_key)),
        ..Default::default()
    };
    alert
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::realtime::ChannelBroadcaster;
    use crate::worker::api_client::{ApiResponse, TransportError};
    use crate::worker::local_db::schema::CACHED_ENTITIES;
    use crate::worker::local_db::LocalStore;
    use crate::worker::offline::NewOperation;
    use crate::worker::test_support::{RecordingPresenter, ScriptedApi};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Fixture {
        queue: OperationQueue,
        api: Arc<ScriptedApi>,
        presenter: Arc<RecordingPresenter>,
        broadcaster: Arc<ChannelBroadcaster>,
        executor: SyncExecutor,
    }

    async fn fixture(api: ScriptedApi) -> Fixture {
        let queue = OperationQueue::new(LocalStore::open_in_memory().await.unwrap());
        let api = Arc::new(api);
        let presenter = Arc::new(RecordingPresenter::default());
        let broadcaster = Arc::new(ChannelBroadcaster::new(64));
        let executor = SyncExecutor::new(
            queue.clone(),
            api.clone(),
            broadcaster.clone(),
            presenter.clone(),
            Duration::from_secs(24 * 3600),
        );
        Fixture {
            queue,
            api,
            presenter,
            broadcaster,
            executor,
        }
    }

    fn op(kind: OperationKind, event: &str) -> NewOperation {
        NewOperation::new(kind, event, "user-1", json!({}))
    }

    #[tokio::test]
    async fn test_success_marks_synced() {
        let f = fixture(ScriptedApi::with_responses([Ok(ApiResponse::new(200, "ok"))])).await;
        let id = f.queue.enqueue(op(OperationKind::CheckIn, "evt-42")).await.unwrap().operation().id;
        let mut sub = f.broadcaster.subscribe(&[Topic::Sync]);

        let report = f.executor.drain(SyncTrigger::ConnectivityRestored).await.unwrap();
        assert_eq!(report.synced, vec![id]);

        let stored = f.queue.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, OperationStatus::Synced);
        assert_eq!(stored.attempt_count, 1);

        assert!(matches!(sub.recv().await, Some(BroadcastMessage::OperationSynced { operation_id, .. }) if operation_id == id));
        assert!(matches!(sub.recv().await, Some(BroadcastMessage::SyncComplete { synced: 1, .. })));

        let alerts = f.presenter.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].tag, format!("sync-{}", id));
    }

    #[tokio::test]
    async fn test_drain_is_fifo_and_isolates_failures() {
        let f = fixture(ScriptedApi::with_responses([
            Err(TransportError::Connect("refused".into())),
            Ok(ApiResponse::new(409, "already registered")),
            Ok(ApiResponse::new(200, "")),
        ]))
        .await;
        let a = f.queue.enqueue(op(OperationKind::Registration, "evt-1")).await.unwrap().operation().id;
        let b = f.queue.enqueue(op(OperationKind::Registration, "evt-2")).await.unwrap().operation().id;
        let c = f.queue.enqueue(op(OperationKind::CheckIn, "evt-3")).await.unwrap().operation().id;

        let report = f.executor.drain(SyncTrigger::Manual).await.unwrap();
        assert_eq!(report.retrying, vec![a]);
        assert_eq!(report.rejected, vec![b]);
        assert_eq!(report.synced, vec![c]);

        let order: Vec<i64> = f.api.calls().iter().map(|op| op.id).collect();
        assert_eq!(order, vec![a, b, c]);

        // One confirmation plus one aggregate failure alert.
        let tags: Vec<String> = f.presenter.alerts().into_iter().map(|a| a.tag).collect();
        assert_eq!(tags, vec![format!("sync-{}", c), "sync-failures".to_string()]);
    }

    #[tokio::test]
    async fn test_terminal_items_are_not_retried() {
        let f = fixture(ScriptedApi::with_responses([
            Ok(ApiResponse::new(200, "")),
            Ok(ApiResponse::new(409, "dup")),
        ]))
        .await;
        f.queue.enqueue(op(OperationKind::CheckIn, "evt-1")).await.unwrap();
        f.queue.enqueue(op(OperationKind::CheckIn, "evt-2")).await.unwrap();

        f.executor.drain(SyncTrigger::Manual).await.unwrap();
        let second = f.executor.drain(SyncTrigger::Manual).await.unwrap();

        assert_eq!(second.attempted(), 0);
        assert_eq!(f.api.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_is_fine() {
        let f = fixture(ScriptedApi::default()).await;
        f.queue.enqueue(op(OperationKind::CheckIn, "evt-1")).await.unwrap();
        assert_eq!(f.broadcaster.subscriber_count(), 0);
        let report = f.executor.drain(SyncTrigger::BackgroundWakeup).await.unwrap();
        assert_eq!(report.synced.len(), 1);
    }

    #[tokio::test]
    async fn test_presenter_failure_does_not_abort_drain() {
        let mut f = fixture(ScriptedApi::default()).await;
        let presenter = Arc::new(RecordingPresenter::failing());
        f.executor = SyncExecutor::new(
            f.queue.clone(),
            f.api.clone(),
            f.broadcaster.clone(),
            presenter,
            Duration::from_secs(60),
        );
        f.queue.enqueue(op(OperationKind::CheckIn, "evt-1")).await.unwrap();
        f.queue.enqueue(op(OperationKind::CheckIn, "evt-2")).await.unwrap();

        let report = f.executor.drain(SyncTrigger::Manual).await.unwrap();
        assert_eq!(report.synced.len(), 2);
    }

    #[tokio::test]
    async fn test_drain_prunes_expired_cache_entries() {
        let mut f = fixture(ScriptedApi::default()).await;
        f.executor = SyncExecutor::new(
            f.queue.clone(),
            f.api.clone(),
            f.broadcaster.clone(),
            f.presenter.clone(),
            Duration::from_secs(3600),
        )
        .with_cache_retention(Duration::from_secs(7 * 24 * 3600));

        let entities = cache::EntityCache::new(f.queue.store().clone());
        let mut stale = entities.put("events", "evt-1", json!({})).await.unwrap();
        stale.cached_at = Utc::now() - chrono::Duration::days(8);
        f.queue.store().put(CACHED_ENTITIES, &stale).await.unwrap();
        entities.put("events", "evt-2", json!({})).await.unwrap();

        let report = f.executor.drain(SyncTrigger::BackgroundWakeup).await.unwrap();
        assert_eq!(report.cache_pruned, 1);
        assert!(entities.get("events", "evt-1").await.unwrap().is_none());
        assert!(entities.get("events", "evt-2").await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_enqueue_during_racing_drains_syncs_each_once() {
        let dir = tempfile::tempdir().unwrap();
        let queue = OperationQueue::new(LocalStore::open(dir.path().join("local.db")).await.unwrap());
        let api = Arc::new(ScriptedApi::default());
        let executor = Arc::new(SyncExecutor::new(
            queue.clone(),
            api.clone(),
            Arc::new(ChannelBroadcaster::new(256)),
            Arc::new(RecordingPresenter::default()),
            Duration::from_secs(3600),
        ));

        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move {
                let mut ids = Vec::new();
                for i in 0..30 {
                    let draft = op(OperationKind::Registration, &format!("evt-{}", i));
                    ids.push(queue.enqueue(draft).await.unwrap().operation().id);
                    tokio::task::yield_now().await;
                }
                ids
            })
        };
        let drainers: Vec<_> = (0..2)
            .map(|_| {
                let executor = executor.clone();
                tokio::spawn(async move {
                    let mut synced = Vec::new();
                    for _ in 0..10 {
                        synced.extend(executor.drain(SyncTrigger::Manual).await.unwrap().synced);
                    }
                    synced
                })
            })
            .collect();

        let ids = producer.await.unwrap();
        let mut synced = Vec::new();
        for drainer in drainers {
            synced.extend(drainer.await.unwrap());
        }
        synced.extend(executor.drain(SyncTrigger::Manual).await.unwrap().synced);

        synced.sort_unstable();
        assert_eq!(synced, ids);
        let mut sent: Vec<i64> = api.calls().iter().map(|op| op.id).collect();
        sent.sort_unstable();
        assert_eq!(sent, ids);
        assert_eq!(queue.stats().await.unwrap().synced, 30);
    }

    #[tokio::test]
    async fn test_expired_synced_records_are_cleaned_up() {
        let f = fixture(ScriptedApi::default()).await;
        let id = f.queue.enqueue(op(OperationKind::CheckIn, "evt-1")).await.unwrap().operation().id;
        f.queue
            .apply_outcome(id, &AttemptOutcome::Success, Utc::now() - chrono::Duration::days(2))
            .await
            .unwrap();

        let report = f.executor.drain(SyncTrigger::Startup).await.unwrap();
        assert_eq!(report.cleaned_up, 1);
        assert_eq!(f.queue.get(id).await.unwrap(), None);
    }
}

//! # Operation Queue
//!
//! Durable queue of user actions that need the network. Foreground code
//! submits actions here: online, the action is sent straight away; offline
//! (or after a transient failure), it is stored in the `operations`
//! collection and replayed by the sync executor.
//!
//! ## Features
//!
//! - **Persistent Queue**: operations survive worker restarts
//! - **One slot per action**: a (kind, event, user) triple has at most one
//!   live record; re-submitting returns the existing one
//! - **Status Tracking**: `pending` / `synced` / `failed` with attempt counts
//! - **Manual Retry**: failed operations can be moved back to `pending`
//! - **Cleanup**: old synced records are deleted
//!
//! ## Usage
//!
//! ```rust,no_run
//! use volunteer_sync::worker::local_db::LocalStore;
//! use volunteer_sync::worker::offline::{NewOperation, OperationKind, OperationQueue};
//!
//! # async fn example() -> Result<(), volunteer_sync::worker::offline::SyncError> {
//! let store = LocalStore::open_in_memory().await?;
//! let queue = OperationQueue::new(store);
//!
//! let draft = NewOperation::new(OperationKind::CheckIn, "evt-42", "user-1", serde_json::json!({}));
//! let queued = queue.enqueue(draft).await?;
//! assert_eq!(queued.operation().attempt_count, 0);
//! # Ok(())
//! # }
//! ```

use crate::worker::api_client::{ApiResponse, RemoteApi};
use crate::worker::local_db::schema::OPERATIONS;
use crate::worker::local_db::{LocalStore, StoreKey, TransactionMode};
use crate::worker::offline::operation::{NewOperation, OperationStatus, PendingOperation};
use crate::worker::offline::retry::{record_attempt, AttemptOutcome, SyncError, Transition};
use crate::worker::sync::NetworkMonitor;
use chrono::{DateTime, Utc};

/// Durable operation queue over the local store
#[derive(Debug, Clone)]
pub struct OperationQueue {
    store: LocalStore,
}

/// Result of [`OperationQueue::enqueue`]
#[derive(Debug, Clone, PartialEq)]
pub enum Enqueued {
    /// A new pending record was written
    Created(PendingOperation),
    /// The same action was already pending; nothing was written
    Existing(PendingOperation),
}

impl Enqueued {
    pub fn operation(&self) -> &PendingOperation {
        match self {
            Enqueued::Created(op) | Enqueued::Existing(op) => op,
        }
    }
}

/// Result of [`OperationQueue::submit`]
#[derive(Debug, Clone, PartialEq)]
pub enum Submitted {
    /// Online and accepted by the server
    Completed(ApiResponse),
    /// Online and permanently rejected; nothing was queued
    Rejected { status: u16, reason: String },
    /// Deferred to the queue
    Queued(Enqueued),
}

/// Queue statistics for UI badges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: u64,
    pub synced: u64,
    pub failed: u64,
}

impl QueueStats {
    pub fn total(&self) -> u64 {
        self.pending + self.synced + self.failed
    }
}

impl OperationQueue {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Perform an action now if possible, otherwise defer it.
    ///
    /// A transient failure while online also defers the action, so the
    /// caller never has to retry by hand.
    pub async fn submit(
        &self,
        draft: NewOperation,
        api: &dyn RemoteApi,
        network: &NetworkMonitor,
    ) -> Result<Submitted, SyncError> {
        draft.validate()?;

        if !network.is_online() {
            tracing::info!("[Queue] Offline, deferring {} for {}", draft.kind, draft.foreign_key);
            return Ok(Submitted::Queued(self.enqueue(draft).await?));
        }

        // An earlier copy is still waiting; the next drain sends it.
        if let Some(existing) = self.pending_in_slot(&draft).await? {
            tracing::debug!("[Queue] Operation {} already pending, not sending directly", existing.id);
            return Ok(Submitted::Queued(Enqueued::Existing(existing)));
        }

        // Send the draft as-is; it only gets a local id once queued.
        let attempt = draft.clone().with_id(0);
        let result = api.submit(&attempt).await;
        if let Ok(response) = &result {
            if response.is_success() {
                return Ok(Submitted::Completed(response.clone()));
            }
        }

        match AttemptOutcome::classify(&result) {
            AttemptOutcome::Rejected { status, reason } => {
                tracing::warn!("[Queue] {} for {} rejected: {}", draft.kind, draft.foreign_key, reason);
                Ok(Submitted::Rejected { status, reason })
            }
            outcome => {
                tracing::info!(
                    "[Queue] {} for {} failed ({}), deferring",
                    draft.kind,
                    draft.foreign_key,
                    outcome.name()
                );
                Ok(Submitted::Queued(self.enqueue(draft).await?))
            }
        }
    }

    /// Store an action for the next drain.
    ///
    /// A pending record for the same (kind, event, user) is returned as-is.
    /// A failed one is superseded: deleted and replaced by a fresh record.
    pub async fn enqueue(&self, draft: NewOperation) -> Result<Enqueued, SyncError> {
        draft.validate()?;

        let mut tx = self.store.transaction(&[OPERATIONS], TransactionMode::ReadWrite).await?;
        let same_event: Vec<PendingOperation> = tx
            .get_all_by_index(OPERATIONS, "foreignKey", &draft.foreign_key)
            .await?;

        for existing in same_event
            .into_iter()
            .filter(|op| op.same_slot(draft.kind, &draft.foreign_key, &draft.user_id))
        {
            match existing.status {
                OperationStatus::Pending => {
                    tx.commit().await?;
                    tracing::debug!("[Queue] Operation {} already pending", existing.id);
                    return Ok(Enqueued::Existing(existing));
                }
                OperationStatus::Failed => {
                    tracing::info!("[Queue] Superseding failed operation {}", existing.id);
                    tx.delete(OPERATIONS, existing.id).await?;
                }
                OperationStatus::Synced => {}
            }
        }

        let key = tx.put(OPERATIONS, &draft).await?;
        let operation: Option<PendingOperation> = tx.get(OPERATIONS, key.clone()).await?;
        tx.commit().await?;

        let operation = operation.ok_or_else(|| SyncError::NotFound(key.as_int().unwrap_or_default()))?;
        tracing::info!(
            "[Queue] Queued {} for {} as operation {}",
            operation.kind,
            operation.foreign_key,
            operation.id
        );
        Ok(Enqueued::Created(operation))
    }

    async fn pending_in_slot(&self, draft: &NewOperation) -> Result<Option<PendingOperation>, SyncError> {
        let same_event = self.for_event(&draft.foreign_key).await?;
        Ok(same_event.into_iter().find(|op| {
            op.status == OperationStatus::Pending && op.same_slot(draft.kind, &draft.foreign_key, &draft.user_id)
        }))
    }

    pub async fn get(&self, id: i64) -> Result<Option<PendingOperation>, SyncError> {
        Ok(self.store.get(OPERATIONS, id).await?)
    }

    /// Pending operations, oldest first
    pub async fn pending(&self) -> Result<Vec<PendingOperation>, SyncError> {
        self.by_status(OperationStatus::Pending).await
    }

    pub async fn by_status(&self, status: OperationStatus) -> Result<Vec<PendingOperation>, SyncError> {
        Ok(self.store.get_all_by_index(OPERATIONS, "status", status).await?)
    }

    /// Every record targeting one event
    pub async fn for_event(&self, foreign_key: &str) -> Result<Vec<PendingOperation>, SyncError> {
        Ok(self.store.get_all_by_index(OPERATIONS, "foreignKey", foreign_key).await?)
    }

    /// Apply an attempt outcome to a stored operation.
    ///
    /// Runs in its own transaction and re-reads the record first: if it was
    /// deleted or already left `pending` (a concurrent drain got there
    /// first), nothing is written and `None` is returned.
    pub async fn apply_outcome(
        &self,
        id: i64,
        outcome: &AttemptOutcome,
        now: DateTime<Utc>,
    ) -> Result<Option<(PendingOperation, Transition)>, SyncError> {
        let mut tx = self.store.transaction(&[OPERATIONS], TransactionMode::ReadWrite).await?;
        let mut operation: PendingOperation = match tx.get(OPERATIONS, id).await? {
            Some(op) => op,
            None => return Ok(None),
        };
        if operation.status != OperationStatus::Pending {
            tracing::debug!("[Queue] Operation {} already {}, skipping", id, operation.status);
            return Ok(None);
        }

        let transition = record_attempt(&mut operation, outcome, now)?;
        tx.put(OPERATIONS, &operation).await?;
        tx.commit().await?;
        Ok(Some((operation, transition)))
    }

    /// Move a failed operation back to `pending` (user-triggered retry).
    ///
    /// Attempt count and last error are kept. Requeueing a pending
    /// operation is a no-op; a synced one cannot be requeued.
    pub async fn requeue(&self, id: i64) -> Result<PendingOperation, SyncError> {
        let mut tx = self.store.transaction(&[OPERATIONS], TransactionMode::ReadWrite).await?;
        let mut operation: PendingOperation = tx.get(OPERATIONS, id).await?.ok_or(SyncError::NotFound(id))?;
        match operation.status {
            OperationStatus::Pending => {}
            OperationStatus::Failed => {
                operation.status = OperationStatus::Pending;
                tx.put(OPERATIONS, &operation).await?;
                tracing::info!("[Queue] Operation {} requeued by user", id);
            }
            OperationStatus::Synced => {
                return Err(SyncError::InvalidTransition {
                    from: OperationStatus::Synced,
                    outcome: "requeue",
                })
            }
        }
        tx.commit().await?;
        Ok(operation)
    }

    /// Remove one record regardless of status
    pub async fn remove(&self, id: i64) -> Result<bool, SyncError> {
        Ok(self.store.delete(OPERATIONS, StoreKey::Int(id)).await?)
    }

    pub async fn stats(&self) -> Result<QueueStats, SyncError> {
        let mut tx = self.store.transaction(&[OPERATIONS], TransactionMode::ReadOnly).await?;
        let stats = QueueStats {
            pending: tx.count_by_index(OPERATIONS, "status", OperationStatus::Pending).await?,
            synced: tx.count_by_index(OPERATIONS, "status", OperationStatus::Synced).await?,
            failed: tx.count_by_index(OPERATIONS, "status", OperationStatus::Failed).await?,
        };
        tx.commit().await?;
        Ok(stats)
    }

    /// Delete synced records last attempted before `cutoff`. Returns how many.
    pub async fn cleanup_synced(&self, cutoff: DateTime<Utc>) -> Result<usize, SyncError> {
        let mut tx = self.store.transaction(&[OPERATIONS], TransactionMode::ReadWrite).await?;
        let synced: Vec<PendingOperation> = tx
            .get_all_by_index(OPERATIONS, "status", OperationStatus::Synced)
            .await?;

        let mut removed = 0;
        for op in synced {
            let expired = op.last_attempt_at.map_or(true, |at| at < cutoff);
            if expired && tx.delete(OPERATIONS, op.id).await? {
                removed += 1;
            }
        }
        tx.commit().await?;

        if removed > 0 {
            tracing::debug!("[Queue] Cleaned up {} synced operations", removed);
        }
        Ok(removed)
    }
}

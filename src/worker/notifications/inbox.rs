//! Notification inbox
//!
//! Persisted notifications in the `notifications` collection, listed in
//! arrival order and indexed by `read` for the unread badge.

use crate::shared::NotificationRecord;
use crate::worker::local_db::schema::NOTIFICATIONS;
use crate::worker::local_db::{LocalStore, Result, TransactionMode};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct NotificationInbox {
    store: LocalStore,
}

impl NotificationInbox {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Insert or replace a record
    pub async fn save(&self, record: &NotificationRecord) -> Result<()> {
        self.store.put(NOTIFICATIONS, record).await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<NotificationRecord>> {
        self.store.get(NOTIFICATIONS, id).await
    }

    /// Every notification, oldest first
    pub async fn list(&self) -> Result<Vec<NotificationRecord>> {
        self.store.get_all(NOTIFICATIONS).await
    }

    pub async fn unread(&self) -> Result<Vec<NotificationRecord>> {
        self.store.get_all_by_index(NOTIFICATIONS, "read", false).await
    }

    pub async fn unread_count(&self) -> Result<u64> {
        self.store.count_by_index(NOTIFICATIONS, "read", false).await
    }

    /// Mark one notification read.
    ///
    /// Returns the stored record, or `None` if it does not exist. An already
    /// read record is returned unchanged.
    pub async fn mark_read(&self, id: &str, now: DateTime<Utc>) -> Result<Option<NotificationRecord>> {
        let mut tx = self.store.transaction(&[NOTIFICATIONS], TransactionMode::ReadWrite).await?;
        let mut record: NotificationRecord = match tx.get(NOTIFICATIONS, id).await? {
            Some(record) => record,
            None => return Ok(None),
        };
        if record.mark_read(now) {
            tx.put(NOTIFICATIONS, &record).await?;
        }
        tx.commit().await?;
        Ok(Some(record))
    }

    /// Mark every unread notification read. Returns how many changed.
    pub async fn mark_all_read(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut tx = self.store.transaction(&[NOTIFICATIONS], TransactionMode::ReadWrite).await?;
        let unread: Vec<NotificationRecord> = tx.get_all_by_index(NOTIFICATIONS, "read", false).await?;
        let mut changed = 0;
        for mut record in unread {
            if record.mark_read(now) {
                tx.put(NOTIFICATIONS, &record).await?;
                changed += 1;
            }
        }
        tx.commit().await?;
        Ok(changed)
    }
}

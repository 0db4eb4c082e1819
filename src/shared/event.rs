/**
 * Foreground Broadcast Messages
 *
 * Messages delivered to every live foreground context. The serialized form
 * carries a `type` discriminator (`NEW_NOTIFICATION`, `NOTIFICATION_CLICKED`,
 * ...) so UI code can switch on it without knowing the Rust types.
 */
use crate::shared::notification::NotificationRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Topic a message is published under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Notification inbox changes
    Notifications,
    /// Operation queue progress
    Sync,
}

/// Message broadcast to foreground contexts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum BroadcastMessage {
    /// A push message was received and normalized
    NewNotification {
        notification: NotificationRecord,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<String>,
    },
    /// The user interacted with a displayed notification
    NotificationClicked {
        notification_id: String,
        action: String,
    },
    /// A queued operation was confirmed by the server during this pass
    OperationSynced {
        operation_id: i64,
        kind: String,
        foreign_key: String,
        synced_at: DateTime<Utc>,
    },
    /// A queued operation was permanently rejected by the server
    OperationRejected {
        operation_id: i64,
        kind: String,
        foreign_key: String,
        reason: String,
    },
    /// A drain pass finished
    SyncComplete {
        trigger: String,
        synced: usize,
        rejected: usize,
        retrying: usize,
    },
}

impl BroadcastMessage {
    /// Topic this message is published under
    pub fn topic(&self) -> Topic {
        match self {
            BroadcastMessage::NewNotification { .. } | BroadcastMessage::NotificationClicked { .. } => {
                Topic::Notifications
            }
            BroadcastMessage::OperationSynced { .. }
            | BroadcastMessage::OperationRejected { .. }
            | BroadcastMessage::SyncComplete { .. } => Topic::Sync,
        }
    }
}

//! # Push Notification Receiver
//!
//! Turns an inbound push message into a persisted [`NotificationRecord`],
//! tells every live foreground context about it and shows a platform alert.
//!
//! The three side effects (persist, broadcast, render) run concurrently and
//! independently: a failure in one is logged and never stops the others.
//!
//! [`NotificationRecord`]: crate::shared::NotificationRecord

pub mod payload;
pub mod presenter;

pub use payload::{normalize, ParsedPush, PushPayload};
pub use presenter::{Alert, AlertPresenter, LogPresenter, PresentError};

use crate::backend::realtime::Broadcaster;
use crate::shared::{BroadcastMessage, NotificationRecord, NotificationType, Topic};
use crate::worker::notifications::NotificationInbox;
use chrono::Utc;
use std::sync::Arc;

/// What happened to one push message
#[derive(Debug, Clone, PartialEq)]
pub struct PushOutcome {
    pub record: NotificationRecord,
    pub persisted: bool,
    /// Foreground contexts that received the broadcast
    pub delivered_to: usize,
    pub rendered: bool,
}

pub struct PushReceiver {
    inbox: NotificationInbox,
    broadcaster: Arc<dyn Broadcaster>,
    presenter: Arc<dyn AlertPresenter>,
}

impl PushReceiver {
    pub fn new(inbox: NotificationInbox, broadcaster: Arc<dyn Broadcaster>, presenter: Arc<dyn AlertPresenter>) -> Self {
        Self {
            inbox,
            broadcaster,
            presenter,
        }
    }

    /// Handle one push message with an optional raw body
    pub async fn receive(&self, raw: Option<&[u8]>) -> PushOutcome {
        let record = normalize(ParsedPush::parse(raw), Utc::now());
        tracing::info!("[Push] Received {} notification {}", record.notification_type, record.id);

        let persist = async {
            match self.inbox.save(&record).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!("[Push] Failed to persist notification {}: {}", record.id, e);
                    false
                }
            }
        };

        let broadcast = async {
            self.broadcaster.publish(
                Topic::Notifications,
                BroadcastMessage::NewNotification {
                    notification: record.clone(),
                    action: None,
                },
            )
        };

        let render = async {
            match self.presenter.show(alert_for(&record)).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("[Push] Failed to show notification {}: {}", record.id, e);
                    false
                }
            }
        };

        let (persisted, delivered_to, rendered) = tokio::join!(persist, broadcast, render);

        PushOutcome {
            record,
            persisted,
            delivered_to,
            rendered,
        }
    }
}

fn alert_for(record: &NotificationRecord) -> Alert {
    Alert {
        tag: record.id.clone(),
        title: record.title.clone(),
        body: record.body.clone(),
        actions: record.actions.clone(),
        data: record.data.clone(),
        require_interaction: matches!(
            record.notification_type,
            NotificationType::EventReminder | NotificationType::CheckInReminder
        ),
    }
}

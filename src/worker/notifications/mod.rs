//! # Notification Interaction Router
//!
//! Maps a click on a displayed notification to an in-app destination.
//!
//! - `dismiss` does nothing at all
//! - `check-in` always opens the check-in scanner for the event
//! - `view`, no action, or anything else opens `data.url` (or the type's
//!   default destination)
//!
//! A navigating interaction also marks the notification read, tells the
//! foreground contexts about the click and focuses an existing window on
//! the destination instead of opening a second one.

pub mod inbox;
pub mod windows;

pub use inbox::NotificationInbox;
pub use windows::{ClientWindow, WindowError, WindowHost};

use crate::backend::realtime::Broadcaster;
use crate::shared::{BroadcastMessage, NotificationRecord, Topic};
use crate::worker::push::payload::default_target;
use chrono::Utc;
use reqwest::Url;
use std::sync::Arc;

/// Action reported by the platform for a notification click
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionAction {
    View,
    CheckIn,
    Dismiss,
    /// Unknown action id, handled like `View`
    Other(String),
}

impl InteractionAction {
    /// `None` or an empty string is a click on the notification body
    pub fn parse(action: Option<&str>) -> Self {
        match action.map(str::trim) {
            None | Some("") | Some("view") => InteractionAction::View,
            Some("check-in") | Some("checkin") => InteractionAction::CheckIn,
            Some("dismiss") => InteractionAction::Dismiss,
            Some(other) => InteractionAction::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            InteractionAction::View => "view",
            InteractionAction::CheckIn => "check-in",
            InteractionAction::Dismiss => "dismiss",
            InteractionAction::Other(name) => name,
        }
    }
}

/// Result of handling one interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Dismissed,
    Navigated {
        target: String,
        window: ClientWindow,
        /// An existing window was focused rather than a new one opened
        focused_existing: bool,
    },
}

pub struct InteractionRouter {
    inbox: NotificationInbox,
    broadcaster: Arc<dyn Broadcaster>,
    windows: Arc<dyn WindowHost>,
    origin: Url,
}

impl InteractionRouter {
    pub fn new(
        inbox: NotificationInbox,
        broadcaster: Arc<dyn Broadcaster>,
        windows: Arc<dyn WindowHost>,
        origin: Url,
    ) -> Self {
        Self {
            inbox,
            broadcaster,
            windows,
            origin,
        }
    }

    /// Destination for `action` on `record`, or `None` for `dismiss`
    pub fn resolve_target(record: &NotificationRecord, action: &InteractionAction) -> Option<String> {
        let event_id = record.data.event_id.as_deref();
        match action {
            InteractionAction::Dismiss => None,
            InteractionAction::CheckIn => Some(match event_id {
                Some(id) => check_in_target(id),
                None => "/check-in".to_string(),
            }),
            InteractionAction::View | InteractionAction::Other(_) => Some(
                record
                    .data
                    .url
                    .clone()
                    .unwrap_or_else(|| default_target(record.notification_type, event_id)),
            ),
        }
    }

    /// Handle a click on `record` with the platform-reported `action`
    pub async fn handle(&self, record: &NotificationRecord, action: Option<&str>) -> Result<Interaction, WindowError> {
        let action = InteractionAction::parse(action);
        let target = match Self::resolve_target(record, &action) {
            Some(target) => target,
            None => {
                tracing::debug!("[Notifications] Notification {} dismissed", record.id);
                return Ok(Interaction::Dismissed);
            }
        };

        match self.inbox.mark_read(&record.id, Utc::now()).await {
            Ok(Some(_)) => {}
            Ok(None) => tracing::debug!("[Notifications] Notification {} is not in the inbox", record.id),
            Err(e) => tracing::warn!("[Notifications] Failed to mark {} read: {}", record.id, e),
        }

        self.broadcaster.publish(
            Topic::Notifications,
            BroadcastMessage::NotificationClicked {
                notification_id: record.id.clone(),
                action: action.as_str().to_string(),
            },
        );

        for window in self.windows.windows().await {
            if !windows::shows_destination(&self.origin, &window.url, &target) {
                continue;
            }
            match self.windows.focus(&window.id).await {
                Ok(()) => {
                    tracing::info!("[Notifications] Focused window {} on {}", window.id, target);
                    return Ok(Interaction::Navigated {
                        target,
                        window,
                        focused_existing: true,
                    });
                }
                // The window may have closed since it was listed.
                Err(e) => tracing::debug!("[Notifications] Could not focus {}: {}", window.id, e),
            }
        }

        let window = self.windows.open(&target).await?;
        tracing::info!("[Notifications] Opened {} for notification {}", target, record.id);
        Ok(Interaction::Navigated {
            target,
            window,
            focused_existing: false,
        })
    }
}

/// `/check-in?eventId=...` with the id form-encoded
fn check_in_target(event_id: &str) -> String {
    match Url::parse("app:/check-in") {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("eventId", event_id);
            format!("{}?{}", url.path(), url.query().unwrap_or_default())
        }
        Err(_) => "/check-in".to_string(),
    }
}

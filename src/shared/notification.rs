//! Notification records
//!
//! The persisted, user-visible form of a push message. Records are created by
//! the push receiver, shown in the inbox, and only ever mutated to flip
//! `read` from false to true.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of notification kinds the UI knows how to route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationType {
    EventReminder,
    EventUpdate,
    System,
    CheckInReminder,
    Achievement,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::EventReminder => "event-reminder",
            NotificationType::EventUpdate => "event-update",
            NotificationType::System => "system",
            NotificationType::CheckInReminder => "check-in-reminder",
            NotificationType::Achievement => "achievement",
        }
    }

    /// Lenient parse: senders use `event_reminder`, `event-reminder` and
    /// `EVENT_REMINDER` interchangeably. Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "event-reminder" => Some(NotificationType::EventReminder),
            "event-update" => Some(NotificationType::EventUpdate),
            "system" => Some(NotificationType::System),
            "check-in-reminder" | "checkin-reminder" => Some(NotificationType::CheckInReminder),
            "achievement" => Some(NotificationType::Achievement),
            _ => None,
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Navigation/context payload carried by a notification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Sender-specific fields preserved as-is
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A button offered on the platform alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    /// Identifier reported back on interaction (`view`, `check-in`, `dismiss`)
    pub action: String,
    pub title: String,
}

impl NotificationAction {
    pub fn new(action: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            title: title.into(),
        }
    }
}

/// A persisted notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    #[serde(default)]
    pub data: NotificationData,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
    pub read: bool,
    /// Receipt time
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
}

impl NotificationRecord {
    /// Flip `read` to true. Returns false if the record was already read,
    /// in which case `read_at` keeps its original value.
    pub fn mark_read(&mut self, now: DateTime<Utc>) -> bool {
        if self.read {
            return false;
        }
        self.read = true;
        self.read_at = Some(now);
        true
    }
}

//! Push payload parsing and normalization
//!
//! Push bodies are untyped JSON from an external sender, expected to look
//! like `{ title, body, data: { notificationType, eventId?, url? } }`.
//! Parsing never fails: anything that is not a JSON object degrades to a
//! plain-text notification whose body is the raw payload.

use crate::shared::{NotificationAction, NotificationData, NotificationRecord, NotificationType};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

const DEFAULT_TITLE: &str = "Volunteer Hub";
const DEFAULT_BODY: &str = "You have a new notification";

/// Best-effort parse of a push body
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedPush {
    /// A JSON object
    Structured(PushPayload),
    /// Anything else, kept verbatim
    Text(String),
    /// No body at all
    Empty,
}

/// Fields picked out of a structured payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub notification_type: Option<NotificationType>,
    pub event_id: Option<String>,
    pub url: Option<String>,
    /// Remaining `data` fields
    pub extra: Map<String, Value>,
}

impl ParsedPush {
    pub fn parse(raw: Option<&[u8]>) -> Self {
        let raw = match raw {
            Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            None => return ParsedPush::Empty,
        };
        if raw.trim().is_empty() {
            return ParsedPush::Empty;
        }

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(object)) => ParsedPush::Structured(PushPayload::from_object(object)),
            Ok(Value::String(text)) if !text.trim().is_empty() => ParsedPush::Text(text),
            Ok(_) | Err(_) => {
                tracing::debug!("[Push] Payload is not a JSON object, using it as text");
                ParsedPush::Text(raw)
            }
        }
    }
}

impl PushPayload {
    fn from_object(mut object: Map<String, Value>) -> Self {
        let mut data = match object.remove("data") {
            Some(Value::Object(data)) => data,
            _ => Map::new(),
        };

        let type_field = data
            .get("notificationType")
            .or_else(|| object.get("notificationType"))
            .or_else(|| object.get("type"))
            .and_then(Value::as_str);

        let notification_type = type_field.and_then(NotificationType::parse);
        if type_field.is_some() && notification_type.is_none() {
            tracing::debug!("[Push] Unknown notification type {:?}, treating as system", type_field);
        }

        let event_id = data.remove("eventId").and_then(lenient_string);
        let url = data.remove("url").and_then(lenient_string);

        Self {
            title: object.remove("title").and_then(lenient_string),
            body: object.remove("body").and_then(lenient_string),
            notification_type,
            event_id,
            url,
            extra: data,
        }
    }
}

/// Accept strings and numbers; ignore empty strings and everything else
fn lenient_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// In-app destination a notification opens by default
pub fn default_target(notification_type: NotificationType, event_id: Option<&str>) -> String {
    match (notification_type, event_id) {
        (NotificationType::EventReminder, Some(id))
        | (NotificationType::EventUpdate, Some(id))
        | (NotificationType::CheckInReminder, Some(id)) => format!("/events/{}", id),
        (NotificationType::EventReminder, None) | (NotificationType::EventUpdate, None) => "/events".to_string(),
        (NotificationType::CheckInReminder, None) => "/check-in".to_string(),
        (NotificationType::Achievement, _) => "/profile".to_string(),
        (NotificationType::System, _) => "/notifications".to_string(),
    }
}

/// Buttons offered for each notification type
pub fn actions_for(notification_type: NotificationType) -> Vec<NotificationAction> {
    match notification_type {
        NotificationType::EventReminder => vec![NotificationAction::new("view", "View Event")],
        NotificationType::CheckInReminder => vec![
            NotificationAction::new("check-in", "Check In"),
            NotificationAction::new("view", "View Event"),
        ],
        _ => vec![
            NotificationAction::new("view", "View"),
            NotificationAction::new("dismiss", "Dismiss"),
        ],
    }
}

fn default_title(notification_type: NotificationType) -> &'static str {
    match notification_type {
        NotificationType::EventReminder => "Event Reminder",
        NotificationType::EventUpdate => "Event Update",
        NotificationType::CheckInReminder => "Time to Check In",
        NotificationType::Achievement => "Achievement Unlocked",
        NotificationType::System => DEFAULT_TITLE,
    }
}

/// Build the persisted record for a push message received at `now`
pub fn normalize(parsed: ParsedPush, now: DateTime<Utc>) -> NotificationRecord {
    let payload = match parsed {
        ParsedPush::Structured(payload) => payload,
        ParsedPush::Text(text) => PushPayload {
            body: Some(text),
            ..Default::default()
        },
        ParsedPush::Empty => PushPayload::default(),
    };

    let notification_type = payload.notification_type.unwrap_or(NotificationType::System);
    let url = payload
        .url
        .unwrap_or_else(|| default_target(notification_type, payload.event_id.as_deref()));

    NotificationRecord {
        id: Uuid::new_v4().to_string(),
        title: payload
            .title
            .unwrap_or_else(|| default_title(notification_type).to_string()),
        body: payload.body.unwrap_or_else(|| DEFAULT_BODY.to_string()),
        notification_type,
        data: NotificationData {
            event_id: payload.event_id,
            url: Some(url),
            extra: payload.extra,
        },
        actions: actions_for(notification_type),
        read: false,
        timestamp: now,
        read_at: None,
    }
}

//! Property-based tests for push payload degradation

use chrono::Utc;
use proptest::prelude::*;
use volunteer_sync::shared::NotificationType;
use volunteer_sync::worker::push::{normalize, ParsedPush};

proptest! {
    #[test]
    fn test_plain_text_becomes_body(text in "[a-zA-Z][a-zA-Z ,.!]{0,80}") {
        let record = normalize(ParsedPush::parse(Some(text.as_bytes())), Utc::now());
        prop_assert_eq!(&record.body, &text);
        prop_assert_eq!(record.notification_type, NotificationType::System);
        prop_assert!(!record.read);
    }

    #[test]
    fn test_any_bytes_yield_displayable_record(raw in prop::collection::vec(any::<u8>(), 0..256)) {
        let record = normalize(ParsedPush::parse(Some(&raw)), Utc::now());
        prop_assert!(!record.title.trim().is_empty());
        prop_assert!(!record.body.trim().is_empty());
        prop_assert!(record.data.url.is_some());
        prop_assert!(!record.id.is_empty());
    }

    #[test]
    fn test_event_id_routes_to_event(event_id in "[a-z0-9-]{1,24}") {
        let raw = format!(r#"{{"data":{{"notificationType":"event_update","eventId":"{}"}}}}"#, event_id);
        let record = normalize(ParsedPush::parse(Some(raw.as_bytes())), Utc::now());
        prop_assert_eq!(record.data.url, Some(format!("/events/{}", event_id)));
        prop_assert_eq!(record.notification_type, NotificationType::EventUpdate);
    }
}

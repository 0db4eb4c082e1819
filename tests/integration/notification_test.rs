//! Push delivery through to notification clicks

use crate::common::*;
use std::sync::Arc;
use volunteer_sync::shared::{BroadcastMessage, NotificationType, Topic};
use volunteer_sync::worker::notifications::Interaction;

const REMINDER: &[u8] =
    br#"{"title":"Event Reminder: Tomorrow","body":"Beach cleanup starts at 9:00","data":{"notificationType":"event_reminder","eventId":"evt-7"}}"#;

#[tokio::test]
async fn test_push_then_view_opens_event() {
    let t = TestEngine::start().await;
    let mut ui = t.engine.subscribe(&[Topic::Notifications]);

    let outcome = t.engine.push().receive(Some(REMINDER)).await;
    assert!(outcome.persisted && outcome.rendered);
    assert_eq!(outcome.delivered_to, 1);
    assert_eq!(outcome.record.notification_type, NotificationType::EventReminder);
    assert_eq!(assert_ok!(t.engine.inbox().unread_count().await), 1);

    match ui.recv().await {
        Some(BroadcastMessage::NewNotification { notification, .. }) => assert_eq!(notification.id, outcome.record.id),
        other => panic!("unexpected broadcast: {:?}", other),
    }

    let alert = &t.presenter.alerts()[0];
    assert_eq!(alert.title, "Event Reminder: Tomorrow");
    assert!(alert.require_interaction);

    let windows = Arc::new(FakeWindows::default());
    let router = assert_ok!(t.engine.interaction_router(windows.clone()));
    let interaction = assert_ok!(router.handle(&outcome.record, Some("view")).await);

    match interaction {
        Interaction::Navigated {
            target,
            focused_existing,
            ..
        } => {
            assert_eq!(target, "/events/evt-7");
            assert!(!focused_existing);
        }
        other => panic!("unexpected interaction: {:?}", other),
    }
    assert_eq!(windows.urls(), vec!["/events/evt-7".to_string()]);
    assert_eq!(assert_ok!(t.engine.inbox().unread_count().await), 0);

    match ui.recv().await {
        Some(BroadcastMessage::NotificationClicked { notification_id, action }) => {
            assert_eq!(notification_id, outcome.record.id);
            assert_eq!(action, "view");
        }
        other => panic!("unexpected broadcast: {:?}", other),
    }
}

#[tokio::test]
async fn test_check_in_action_focuses_open_window() {
    let t = TestEngine::start().await;
    let outcome = t.engine.push().receive(Some(REMINDER)).await;

    let windows = Arc::new(FakeWindows::with_open(&[
        "http://localhost:3000/dashboard",
        "http://localhost:3000/check-in?eventId=evt-7",
    ]));
    let router = assert_ok!(t.engine.interaction_router(windows.clone()));
    let interaction = assert_ok!(router.handle(&outcome.record, Some("check-in")).await);

    match interaction {
        Interaction::Navigated { focused_existing, .. } => assert!(focused_existing),
        other => panic!("unexpected interaction: {:?}", other),
    }
    assert_eq!(windows.focused(), vec!["win-1".to_string()]);
    assert_eq!(windows.urls().len(), 2);
}

#[tokio::test]
async fn test_dismiss_leaves_notification_unread() {
    let t = TestEngine::start().await;
    let outcome = t.engine.push().receive(Some(b"Your shift was moved")).await;
    assert_eq!(outcome.record.body, "Your shift was moved");

    let windows = Arc::new(FakeWindows::default());
    let router = assert_ok!(t.engine.interaction_router(windows.clone()));
    let interaction = assert_ok!(router.handle(&outcome.record, Some("dismiss")).await);

    assert!(matches!(interaction, Interaction::Dismissed));
    assert!(windows.urls().is_empty());
    assert_eq!(assert_ok!(t.engine.inbox().unread_count().await), 1);
}

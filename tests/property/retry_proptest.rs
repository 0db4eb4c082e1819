//! Property-based tests for the retry state machine

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use serde_json::Value;
use volunteer_sync::worker::offline::{
    record_attempt, AttemptOutcome, OperationKind, OperationStatus, PendingOperation, SyncError,
};

fn fresh_operation() -> PendingOperation {
    PendingOperation {
        id: 1,
        kind: OperationKind::CheckIn,
        foreign_key: "evt-1".to_string(),
        user_id: "volunteer-1".to_string(),
        payload: Value::Null,
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
        status: OperationStatus::Pending,
        attempt_count: 0,
        last_attempt_at: None,
        last_error: None,
    }
}

fn http_status() -> impl Strategy<Value = u16> {
    prop_oneof![200u16..300, 400u16..500, 500u16..600]
}

proptest! {
    #[test]
    fn test_status_classification(status in http_status(), body in "[a-z ]{0,300}") {
        let outcome = AttemptOutcome::from_status(status, &body);
        let expected = match status {
            200..=299 => OperationStatus::Synced,
            408 | 429 => OperationStatus::Pending,
            400..=499 => OperationStatus::Failed,
            _ => OperationStatus::Pending,
        };
        prop_assert_eq!(outcome.target_status(), expected);

        if let AttemptOutcome::Rejected { reason, .. } | AttemptOutcome::Transient { reason } = outcome {
            let prefix = format!("HTTP {}", status);
            prop_assert!(reason.starts_with(&prefix));
            prop_assert!(reason.chars().count() <= prefix.len() + 2 + 200);
        }
    }

    #[test]
    fn test_attempts_count_until_terminal(statuses in prop::collection::vec(http_status(), 1..12)) {
        let mut operation = fresh_operation();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();

        for (i, status) in statuses.into_iter().enumerate() {
            let now = start + Duration::minutes(i as i64);
            let before = operation.clone();
            let outcome = AttemptOutcome::from_status(status, "");

            match record_attempt(&mut operation, &outcome, now) {
                Ok(transition) => {
                    prop_assert_eq!(before.status, OperationStatus::Pending);
                    prop_assert_eq!(operation.attempt_count, before.attempt_count + 1);
                    prop_assert_eq!(transition.attempt_count, operation.attempt_count);
                    prop_assert_eq!(operation.last_attempt_at, Some(now));
                    prop_assert_eq!(operation.status, outcome.target_status());
                    prop_assert_eq!(operation.last_error.is_none(), outcome == AttemptOutcome::Success);
                }
                Err(SyncError::InvalidTransition { from, .. }) => {
                    // Terminal states are sticky and the record is untouched.
                    prop_assert!(from.is_terminal());
                    prop_assert_eq!(&operation, &before);
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }
    }
}

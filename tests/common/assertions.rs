//! Assertion macros shared by the integration suites

/// Unwrap a `Result`, panicking with the error's debug form
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a string contains a substring
#[macro_export]
macro_rules! assert_contains {
    ($haystack:expr, $needle:expr) => {
        assert!(
            $haystack.contains($needle),
            "Expected '{}' to contain '{}'",
            $haystack,
            $needle
        );
    };
}

/// Assert the stored state of a queued operation
#[macro_export]
macro_rules! assert_operation {
    ($queue:expr, $id:expr, $status:expr, attempts = $attempts:expr) => {
        let operation = $crate::assert_ok!($queue.get($id).await).expect("operation should still be queued");
        assert_eq!(operation.status, $status, "status of operation {}", $id);
        assert_eq!(operation.attempt_count, $attempts, "attempts of operation {}", $id);
    };
}

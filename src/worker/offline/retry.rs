//! # Retry State Machine
//!
//! Per-operation state transitions, kept free of networking and storage so
//! they can be tested on their own.
//!
//! ```text
//!            2xx                    4xx (not 408/429)
//!   synced <----- pending -----------------------> failed
//!                  |  ^
//!                  +--+  5xx, 408, 429, timeout, connection error
//! ```
//!
//! Every attempt, successful or not, increments `attemptCount` and stamps
//! `lastAttemptAt`. Applying an outcome to a terminal operation is an error.

use crate::shared::SharedError;
use crate::worker::api_client::{ApiResponse, TransportError};
use crate::worker::local_db::StoreError;
use crate::worker::offline::operation::{OperationStatus, PendingOperation};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Longest server body excerpt kept in `lastError`
const ERROR_EXCERPT_CHARS: usize = 200;

/// Operation queue and sync failures
#[derive(Debug, Error)]
pub enum SyncError {
    /// The local store failed; aborts the current drain
    #[error("local store error: {0}")]
    Store(#[from] StoreError),
    #[error("cannot apply {outcome} to a {from} operation")]
    InvalidTransition {
        from: OperationStatus,
        outcome: &'static str,
    },
    #[error(transparent)]
    Invalid(#[from] SharedError),
    #[error("operation {0} not found")]
    NotFound(i64),
}

/// Classified result of one network attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// 2xx
    Success,
    /// Client-side rejection, never retried
    Rejected { status: u16, reason: String },
    /// Worth retrying on the next drain
    Transient { reason: String },
}

impl AttemptOutcome {
    /// Classify a raw API result
    pub fn classify(result: &Result<ApiResponse, TransportError>) -> Self {
        match result {
            Ok(response) => Self::from_status(response.status, &response.body),
            Err(err) => AttemptOutcome::Transient {
                reason: err.to_string(),
            },
        }
    }

    /// Classify by HTTP status. 408 and 429 are client-range codes that
    /// signal a retryable condition, so they count as transient.
    pub fn from_status(status: u16, body: &str) -> Self {
        let reason = http_reason(status, body);
        match status {
            200..=299 => AttemptOutcome::Success,
            408 | 429 => AttemptOutcome::Transient { reason },
            400..=499 => AttemptOutcome::Rejected { status, reason },
            _ => AttemptOutcome::Transient { reason },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Rejected { .. } => "rejection",
            AttemptOutcome::Transient { .. } => "transient failure",
        }
    }

    /// Status an operation moves to after this outcome
    pub fn target_status(&self) -> OperationStatus {
        match self {
            AttemptOutcome::Success => OperationStatus::Synced,
            AttemptOutcome::Rejected { .. } => OperationStatus::Failed,
            AttemptOutcome::Transient { .. } => OperationStatus::Pending,
        }
    }
}

/// Applied state change, for logging and broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: OperationStatus,
    pub to: OperationStatus,
    pub attempt_count: u32,
}

/// Record one attempt on `operation`.
///
/// Fails with [`SyncError::InvalidTransition`] if the operation already
/// reached `synced` or `failed`; the operation is left untouched then.
pub fn record_attempt(
    operation: &mut PendingOperation,
    outcome: &AttemptOutcome,
    now: DateTime<Utc>,
) -> Result<Transition, SyncError> {
    if operation.status.is_terminal() {
        return Err(SyncError::InvalidTransition {
            from: operation.status,
            outcome: outcome.name(),
        });
    }

    let from = operation.status;
    operation.attempt_count = operation.attempt_count.saturating_add(1);
    operation.last_attempt_at = Some(now);
    operation.status = outcome.target_status();
    match outcome {
        AttemptOutcome::Success => operation.last_error = None,
        AttemptOutcome::Rejected { reason, .. } | AttemptOutcome::Transient { reason } => {
            operation.last_error = Some(reason.clone())
        }
    }

    Ok(Transition {
        from,
        to: operation.status,
        attempt_count: operation.attempt_count,
    })
}

fn http_reason(status: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return format!("HTTP {}", status);
    }
    let excerpt: String = body.chars().take(ERROR_EXCERPT_CHARS).collect();
    format!("HTTP {}: {}", status, excerpt)
}

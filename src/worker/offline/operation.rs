//! Pending operations
//!
//! A `PendingOperation` is one user action (event registration or check-in)
//! that the server has not yet confirmed. It is stored in the `operations`
//! collection and indexed by `status` and `foreignKey`.

use crate::shared::SharedError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Action kinds the remote API accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    /// `POST /events/{id}/register`
    Registration,
    /// `POST /events/{id}/check-in`
    CheckIn,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Registration => "registration",
            OperationKind::CheckIn => "check-in",
        }
    }

    /// Last path segment of the endpoint under `/events/{id}/`
    pub fn endpoint(&self) -> &'static str {
        match self {
            OperationKind::Registration => "register",
            OperationKind::CheckIn => "check-in",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a queued operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    /// Waiting for the next drain
    Pending,
    /// Confirmed by the server (terminal)
    Synced,
    /// Permanently rejected by the server (terminal)
    Failed,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationStatus::Pending)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Synced => "synced",
            OperationStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A user action awaiting server confirmation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    /// Locally assigned, auto-increment
    pub id: i64,
    pub kind: OperationKind,
    /// Event identifier the operation targets
    pub foreign_key: String,
    /// Originating user
    pub user_id: String,
    /// Action-specific request body
    #[serde(default)]
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub status: OperationStatus,
    pub attempt_count: u32,
    #[serde(default)]
    pub last_attempt_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl PendingOperation {
    /// Whether `other` targets the same (kind, event, user) slot
    pub fn same_slot(&self, kind: OperationKind, foreign_key: &str, user_id: &str) -> bool {
        self.kind == kind && self.foreign_key == foreign_key && self.user_id == user_id
    }
}

/// An operation before it has been given a local id
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOperation {
    pub kind: OperationKind,
    pub foreign_key: String,
    pub user_id: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub status: OperationStatus,
    pub attempt_count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl NewOperation {
    pub fn new(
        kind: OperationKind,
        foreign_key: impl Into<String>,
        user_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            kind,
            foreign_key: foreign_key.into(),
            user_id: user_id.into(),
            payload,
            created_at: Utc::now(),
            status: OperationStatus::Pending,
            attempt_count: 0,
            last_attempt_at: None,
            last_error: None,
        }
    }

    /// Reject drafts the remote API could never accept
    pub fn validate(&self) -> Result<(), SharedError> {
        if self.foreign_key.trim().is_empty() {
            return Err(SharedError::validation("foreignKey", "Event id cannot be empty"));
        }
        if self.foreign_key.contains('/') {
            return Err(SharedError::validation("foreignKey", "Event id cannot contain '/'"));
        }
        if !(self.payload.is_object() || self.payload.is_null()) {
            return Err(SharedError::validation("payload", "Payload must be a JSON object"));
        }
        Ok(())
    }

    /// Attach the id assigned by the store
    pub fn with_id(self, id: i64) -> PendingOperation {
        PendingOperation {
            id,
            kind: self.kind,
            foreign_key: self.foreign_key,
            user_id: self.user_id,
            payload: self.payload,
            created_at: self.created_at,
            status: self.status,
            attempt_count: self.attempt_count,
            last_attempt_at: self.last_attempt_at,
            last_error: self.last_error,
        }
    }
}

//! Shared Error Types
//!
//! Error types that are meaningful on both sides of the wire: validation
//! of user-submitted actions before they are sent or queued.
//!
//! # Usage
//!
//! ```rust
//! use volunteer_sync::shared::error::SharedError;
//!
//! let error = SharedError::validation("foreignKey", "Event id cannot be empty");
//! assert!(error.to_string().contains("foreignKey"));
//! ```
use thiserror::Error;

/// Shared error types that can occur in both the worker and the backend
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharedError {
    /// Data validation error
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },
}

impl SharedError {
    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

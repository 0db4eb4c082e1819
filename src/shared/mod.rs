//! Shared Module
//!
//! Types shared between the on-device worker and the server-side
//! collaborators: notification records, foreground broadcast messages,
//! configuration and error types. Everything here is plain data designed
//! for serialization.

/// Foreground broadcast messages
pub mod event;

/// Shared error types
pub mod error;

/// Engine configuration
pub mod config;

/// Notification records
pub mod notification;

pub use config::{ConfigError, EngineConfig, EngineConfigBuilder};
pub use error::SharedError;
pub use event::{BroadcastMessage, Topic};
pub use notification::{NotificationAction, NotificationData, NotificationRecord, NotificationType};

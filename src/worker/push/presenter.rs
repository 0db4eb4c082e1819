//! Platform alert rendering
//!
//! The visible, OS-level notification. The engine only needs "show this";
//! the embedding platform decides how.

use crate::shared::{NotificationAction, NotificationData};
use async_trait::async_trait;
use thiserror::Error;

/// A platform-level alert
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    /// Alerts with the same tag replace each other
    pub tag: String,
    pub title: String,
    pub body: String,
    pub actions: Vec<NotificationAction>,
    pub data: NotificationData,
    /// Stay on screen until the user acts
    pub require_interaction: bool,
}

impl Alert {
    pub fn new(tag: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            title: title.into(),
            body: body.into(),
            actions: Vec::new(),
            data: NotificationData::default(),
            require_interaction: false,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("alert could not be shown: {0}")]
pub struct PresentError(pub String);

/// Renders alerts on the platform
#[async_trait]
pub trait AlertPresenter: Send + Sync {
    async fn show(&self, alert: Alert) -> Result<(), PresentError>;
}

/// Presenter for headless runs: alerts are written to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPresenter;

#[async_trait]
impl AlertPresenter for LogPresenter {
    async fn show(&self, alert: Alert) -> Result<(), PresentError> {
        let actions: Vec<&str> = alert.actions.iter().map(|a| a.action.as_str()).collect();
        tracing::info!(
            "[Alert] {} | {} ({}) actions={:?}",
            alert.title,
            alert.body,
            alert.tag,
            actions
        );
        Ok(())
    }
}

//! Foreground windows
//!
//! The platform's list of open UI windows, as seen by the interaction
//! router. A window shows a destination when origin, path and query all
//! match; the fragment is ignored and relative window URLs resolve
//! against the app origin.

use async_trait::async_trait;
use reqwest::Url;
use thiserror::Error;

/// An open foreground window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientWindow {
    pub id: String,
    /// Absolute URL or app-relative path
    pub url: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("window operation failed: {0}")]
pub struct WindowError(pub String);

/// Window management offered by the hosting platform
#[async_trait]
pub trait WindowHost: Send + Sync {
    async fn windows(&self) -> Vec<ClientWindow>;
    async fn focus(&self, window_id: &str) -> Result<(), WindowError>;
    async fn open(&self, url: &str) -> Result<ClientWindow, WindowError>;
}

/// Whether `window_url` shows `target` (an app-relative path)
pub fn shows_destination(origin: &Url, window_url: &str, target: &str) -> bool {
    match (origin.join(window_url), origin.join(target)) {
        (Ok(window), Ok(target)) => {
            window.origin() == target.origin() && window.path() == target.path() && window.query() == target.query()
        }
        _ => false,
    }
}

//! Recording stand-ins for the platform seams

use async_trait::async_trait;
use std::sync::Mutex;
use volunteer_sync::worker::notifications::{ClientWindow, WindowError, WindowHost};
use volunteer_sync::worker::push::{Alert, AlertPresenter, PresentError};

/// Alert presenter that keeps every alert it was asked to show
#[derive(Default)]
pub struct RecordingPresenter {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingPresenter {
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn tags(&self) -> Vec<String> {
        self.alerts().into_iter().map(|a| a.tag).collect()
    }
}

#[async_trait]
impl AlertPresenter for RecordingPresenter {
    async fn show(&self, alert: Alert) -> Result<(), PresentError> {
        self.alerts.lock().unwrap().push(alert);
        Ok(())
    }
}

/// In-memory window list
#[derive(Default)]
pub struct FakeWindows {
    open: Mutex<Vec<ClientWindow>>,
    focused: Mutex<Vec<String>>,
}

impl FakeWindows {
    pub fn with_open(urls: &[&str]) -> Self {
        let windows = urls
            .iter()
            .enumerate()
            .map(|(i, url)| ClientWindow {
                id: format!("win-{}", i),
                url: url.to_string(),
            })
            .collect();
        Self {
            open: Mutex::new(windows),
            focused: Mutex::new(Vec::new()),
        }
    }

    pub fn focused(&self) -> Vec<String> {
        self.focused.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.open.lock().unwrap().iter().map(|w| w.url.clone()).collect()
    }
}

#[async_trait]
impl WindowHost for FakeWindows {
    async fn windows(&self) -> Vec<ClientWindow> {
        self.open.lock().unwrap().clone()
    }

    async fn focus(&self, window_id: &str) -> Result<(), WindowError> {
        self.focused.lock().unwrap().push(window_id.to_string());
        Ok(())
    }

    async fn open(&self, url: &str) -> Result<ClientWindow, WindowError> {
        let mut open = self.open.lock().unwrap();
        let window = ClientWindow {
            id: format!("win-{}", open.len()),
            url: url.to_string(),
        };
        open.push(window.clone());
        Ok(window)
    }
}

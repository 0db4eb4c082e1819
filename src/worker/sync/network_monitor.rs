//! # Network Monitor
//!
//! Online/offline signal shared by the operation queue and the background
//! sync worker. Platform glue calls [`NetworkMonitor::set_online`]; the
//! worker waits on [`NetworkMonitor::subscribe`] and drains the queue on
//! every offline -> online transition.

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Online,
    Offline,
}

/// Cloneable connectivity flag
#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    tx: watch::Sender<NetworkStatus>,
}

impl NetworkMonitor {
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(if online { NetworkStatus::Online } else { NetworkStatus::Offline });
        Self { tx }
    }

    pub fn get_status(&self) -> NetworkStatus {
        *self.tx.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.get_status() == NetworkStatus::Online
    }

    /// Report connectivity. Returns true if the status changed.
    pub fn set_online(&self, online: bool) -> bool {
        let status = if online { NetworkStatus::Online } else { NetworkStatus::Offline };
        let changed = self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            tracing::info!("[Network] Connectivity changed: {:?}", status);
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.tx.subscribe()
    }
}

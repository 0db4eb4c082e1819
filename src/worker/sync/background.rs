//! # Background Sync Worker
//!
//! A spawned task that runs drain passes in response to:
//! - an offline -> online transition of the [`NetworkMonitor`]
//! - an explicit request ([`SyncWorkerHandle::request_sync`])
//! - a periodic background wake-up (skipped while offline)
//!
//! Passes run one at a time. The worker keeps no queue state of its own:
//! everything it needs is re-read from the local store on each pass.
//!
//! ## Usage
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use volunteer_sync::worker::sync::{NetworkMonitor, SyncExecutor, SyncWorker};
//! # async fn example(executor: Arc<SyncExecutor>, network: NetworkMonitor) {
//! let handle = SyncWorker::new(executor, network.clone(), std::time::Duration::from_secs(300)).spawn();
//!
//! network.set_online(true); // drains
//! handle.request_sync();    // drains again
//! handle.shutdown().await;
//! # }
//! ```

use super::network_monitor::{NetworkMonitor, NetworkStatus};
use super::{DrainReport, SyncExecutor, SyncTrigger};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Pending explicit requests beyond this are coalesced
const TRIGGER_BUFFER: usize = 8;

/// Background sync worker, not yet started
pub struct SyncWorker {
    executor: Arc<SyncExecutor>,
    network: NetworkMonitor,
    interval: Duration,
}

/// Control handle of a running [`SyncWorker`]
#[derive(Debug)]
pub struct SyncWorkerHandle {
    trigger_tx: mpsc::Sender<SyncTrigger>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    reports: watch::Receiver<Option<DrainReport>>,
    task: JoinHandle<()>,
}

impl SyncWorker {
    pub fn new(executor: Arc<SyncExecutor>, network: NetworkMonitor, interval: Duration) -> Self {
        Self {
            executor,
            network,
            interval,
        }
    }

    /// Start the worker on the current tokio runtime
    pub fn spawn(self) -> SyncWorkerHandle {
        let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_BUFFER);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (report_tx, reports) = watch::channel(None);
        // Capture the starting status here: a transition between `spawn` and
        // the task's first poll must still count as a change.
        let network_rx = self.network.subscribe();
        let initial = *network_rx.borrow();

        let task = tokio::spawn(self.run(initial, network_rx, trigger_rx, shutdown_rx, report_tx));

        SyncWorkerHandle {
            trigger_tx,
            shutdown_tx: Some(shutdown_tx),
            reports,
            task,
        }
    }

    async fn run(
        self,
        initial: NetworkStatus,
        mut network_rx: watch::Receiver<NetworkStatus>,
        mut trigger_rx: mpsc::Receiver<SyncTrigger>,
        mut shutdown_rx: oneshot::Receiver<()>,
        report_tx: watch::Sender<Option<DrainReport>>,
    ) {
        tracing::info!("[Sync] Background worker started");

        let mut last_status = initial;

        let period = self.interval.max(Duration::from_millis(1));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let trigger = tokio::select! {
                _ = &mut shutdown_rx => break,
                Some(trigger) = trigger_rx.recv() => trigger,
                changed = network_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = *network_rx.borrow_and_update();
                    let restored = last_status == NetworkStatus::Offline && status == NetworkStatus::Online;
                    last_status = status;
                    if !restored {
                        continue;
                    }
                    SyncTrigger::ConnectivityRestored
                }
                _ = ticker.tick() => {
                    if !self.network.is_online() {
                        tracing::debug!("[Sync] Skipping background wake-up while offline");
                        continue;
                    }
                    SyncTrigger::BackgroundWakeup
                }
            };

            match self.executor.drain(trigger).await {
                Ok(report) => {
                    report_tx.send_replace(Some(report));
                }
                Err(e) => {
                    // Queue stays durable; the next trigger retries.
                    tracing::error!("[Sync] Drain ({}) aborted: {}", trigger, e);
                }
            }
        }

        tracing::info!("[Sync] Background worker stopped");
    }
}

impl SyncWorkerHandle {
    /// Ask for a drain pass. Returns false if the worker is gone or already
    /// has enough requests queued.
    pub fn request_sync(&self) -> bool {
        self.trigger_tx.try_send(SyncTrigger::Manual).is_ok()
    }

    /// Receiver of the most recent successful drain report
    pub fn reports(&self) -> watch::Receiver<Option<DrainReport>> {
        self.reports.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop after the current pass and wait for the task to exit
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            tracing::error!("[Sync] Background worker panicked: {}", e);
        }
    }
}

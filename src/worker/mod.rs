//! # Worker
//!
//! The on-device background context: it owns the durable local store,
//! queues user actions while offline, drains them when connectivity
//! returns, receives push messages and routes notification clicks.
//!
//! ## Module Structure
//!
//! ```text
//! worker/
//! ├── mod.rs          - SyncEngine wiring
//! ├── main.rs         - volunteer-sync binary
//! ├── api_client.rs   - RemoteApi over reqwest
//! ├── local_db/       - SQLite-backed document store
//! ├── offline/        - Operation model, retry state machine, queue
//! ├── sync/           - Sync executor, network monitor, background worker
//! ├── cache/          - Cache strategy router, response and entity caches
//! ├── push/           - Push payload handling and alert presentation
//! └── notifications/  - Inbox queries and click routing
//! ```
//!
//! [`SyncEngine`] wires the pieces together from an [`EngineConfig`].

pub mod api_client;
pub mod cache;
pub mod local_db;
pub mod notifications;
pub mod offline;
pub mod push;
pub mod sync;

use crate::backend::realtime::{Broadcaster, ChannelBroadcaster, ForegroundSubscription};
use crate::backend::reminders::{ReminderScheduler, ReminderSink};
use crate::shared::{ConfigError, EngineConfig, Topic};
use api_client::{HttpRemoteApi, RemoteApi, TransportError};
use cache::{CacheRouter, Fetcher, Scope};
use local_db::{LocalStore, StoreError};
use notifications::{InteractionRouter, NotificationInbox, WindowHost};
use offline::{NewOperation, OperationQueue, Submitted, SyncError};
use push::{AlertPresenter, PushReceiver};
use reqwest::Url;
use std::sync::Arc;
use sync::{NetworkMonitor, SyncExecutor, SyncWorker, SyncWorkerHandle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("HTTP client setup failed: {0}")]
    Transport(#[from] TransportError),
}

/// Every worker component, sharing one store and one broadcaster
pub struct SyncEngine {
    config: EngineConfig,
    store: LocalStore,
    queue: OperationQueue,
    inbox: NotificationInbox,
    network: NetworkMonitor,
    broadcaster: Arc<ChannelBroadcaster>,
    api: Arc<dyn RemoteApi>,
    executor: Arc<SyncExecutor>,
    push: PushReceiver,
}

impl SyncEngine {
    /// Open the store at `config.database_path` and talk to the configured API
    pub async fn open(config: EngineConfig, presenter: Arc<dyn AlertPresenter>) -> Result<Self, EngineError> {
        config.validate()?;
        let store = LocalStore::open(&config.database_path).await?;
        let api = Arc::new(HttpRemoteApi::from_config(&config)?);
        Ok(Self::with_parts(config, store, api, presenter))
    }

    /// Assemble from an already-open store and API
    pub fn with_parts(
        config: EngineConfig,
        store: LocalStore,
        api: Arc<dyn RemoteApi>,
        presenter: Arc<dyn AlertPresenter>,
    ) -> Self {
        let queue = OperationQueue::new(store.clone());
        let inbox = NotificationInbox::new(store.clone());
        let broadcaster = Arc::new(ChannelBroadcaster::new(config.broadcast_capacity));
        let executor = Arc::new(
            SyncExecutor::new(
                queue.clone(),
                Arc::clone(&api),
                broadcaster.clone(),
                Arc::clone(&presenter),
                config.synced_retention,
            )
            .with_cache_retention(config.cache_retention),
        );
        let push = PushReceiver::new(inbox.clone(), broadcaster.clone(), presenter);

        tracing::info!(
            "[Sync] Engine ready (schema v{}, api {})",
            store.schema_version(),
            config.api_base_url
        );

        Self {
            config,
            store,
            queue,
            inbox,
            network: NetworkMonitor::new(true),
            broadcaster,
            api,
            executor,
            push,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn queue(&self) -> &OperationQueue {
        &self.queue
    }

    pub fn inbox(&self) -> &NotificationInbox {
        &self.inbox
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    pub fn executor(&self) -> Arc<SyncExecutor> {
        Arc::clone(&self.executor)
    }

    pub fn push(&self) -> &PushReceiver {
        &self.push
    }

    pub fn broadcaster(&self) -> Arc<dyn Broadcaster> {
        self.broadcaster.clone()
    }

    /// Attach a foreground context
    pub fn subscribe(&self, topics: &[Topic]) -> ForegroundSubscription {
        self.broadcaster.subscribe(topics)
    }

    /// Perform a user action now, or queue it if that is not possible
    pub async fn submit(&self, draft: NewOperation) -> Result<Submitted, SyncError> {
        self.queue.submit(draft, self.api.as_ref(), &self.network).await
    }

    /// Start the background sync loop
    pub fn spawn_worker(&self) -> SyncWorkerHandle {
        SyncWorker::new(self.executor(), self.network.clone(), self.config.background_sync_interval).spawn()
    }

    /// Click router for the given window host
    pub fn interaction_router(&self, windows: Arc<dyn WindowHost>) -> Result<InteractionRouter, EngineError> {
        let origin = parse_url(&self.config.app_origin)?;
        Ok(InteractionRouter::new(self.inbox.clone(), self.broadcaster.clone(), windows, origin))
    }

    /// Cache router in front of `fetcher`
    pub fn cache_router(&self, fetcher: Arc<dyn Fetcher>) -> Result<CacheRouter, EngineError> {
        let scope = Scope::new(parse_url(&self.config.app_origin)?, parse_url(&self.config.api_base_url)?);
        Ok(CacheRouter::new(self.store.clone(), fetcher, scope, self.config.offline_page.clone()))
    }

    /// Reminder scheduler over the configured lookahead window
    pub fn reminder_scheduler(&self, sink: Arc<dyn ReminderSink>) -> ReminderScheduler {
        ReminderScheduler::new(sink, self.config.reminder_lookahead)
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}

fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|_| ConfigError::InvalidUrl(raw.to_string()))
}

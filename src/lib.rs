//! Volunteer Sync - Main Library
//!
//! Offline-first sync and notification delivery for the volunteer platform.
//! User actions (event registration, check-in) taken without connectivity
//! are queued durably on the device and replayed against the REST API once
//! the network returns; push messages become persisted notifications,
//! foreground broadcasts and platform alerts.
//!
//! # Module Structure
//!
//! - **`shared`** - Types shared with the server side
//!   - Notification records, broadcast messages
//!   - Engine configuration
//!   - Error types
//!
//! - **`worker`** - The on-device background context
//!   - SQLite-backed local store with versioned migrations
//!   - Operation queue, retry state machine, sync executor
//!   - Cache strategy router
//!   - Push receiver and notification interaction router
//!
//! - **`backend`** - Collaborators outside the worker
//!   - Foreground broadcast channel
//!   - Event reminder scheduling
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use volunteer_sync::shared::EngineConfig;
//! use volunteer_sync::worker::push::LogPresenter;
//! use volunteer_sync::worker::SyncEngine;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = SyncEngine::open(EngineConfig::from_env()?, Arc::new(LogPresenter)).await?;
//! let worker = engine.spawn_worker();
//! worker.request_sync();
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! - `shared::SharedError` for validation of submitted actions
//! - `worker::local_db::StoreError` for the local store
//! - `worker::offline::SyncError` for queue and drain failures
//! - `worker::EngineError` for engine setup

/// Shared types and data structures
pub mod shared;

/// Broadcasting and reminder scheduling
pub mod backend;

/// On-device sync engine
pub mod worker;

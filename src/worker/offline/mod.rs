//! # Offline Operations
//!
//! Offline-first handling of user actions that need the remote API.
//!
//! ## Architecture
//!
//! - **Operation model** (`operation.rs`): the persisted `PendingOperation`
//! - **Retry state machine** (`retry.rs`): pure `pending -> synced | failed`
//!   transitions plus outcome classification
//! - **Operation Queue** (`queue.rs`): durable enqueue / dedupe / requeue /
//!   statistics over the local store
//!
//! Draining the queue lives in [`crate::worker::sync`].

pub mod operation;
pub mod queue;
pub mod retry;

// Re-export main types
pub use operation::{NewOperation, OperationKind, OperationStatus, PendingOperation};
pub use queue::{Enqueued, OperationQueue, QueueStats, Submitted};
pub use retry::{record_attempt, AttemptOutcome, SyncError, Transition};

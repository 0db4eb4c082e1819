//! Backend Module
//!
//! Collaborators that sit outside the on-device worker but that the worker
//! relies on:
//!
//! - **`realtime`** - Broadcast channel between the worker and foreground
//!   UI instances
//! - **`reminders`** - Server-side scheduling of event reminders, which
//!   reach devices as push messages
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs          - Module exports and documentation
//! ├── realtime/       - Foreground broadcasting
//! └── reminders.rs    - Event reminder scheduling
//! ```

/// Foreground broadcasting
pub mod realtime;

/// Event reminder scheduling
pub mod reminders;

pub use realtime::{Broadcaster, ChannelBroadcaster, ForegroundSubscription};
pub use reminders::{ReminderScheduler, ReminderSink, ScheduledEvent};

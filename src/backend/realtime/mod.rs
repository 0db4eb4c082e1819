//! Real-time Update Module
//!
//! Cross-context broadcast between the background worker and foreground UI
//! instances.
//!
//! # Module Structure
//!
//! ```text
//! realtime/
//! ├── mod.rs          - Module exports and documentation
//! └── broadcast.rs    - Broadcaster trait and tokio-backed implementation
//! ```

/// Foreground broadcasting
pub mod broadcast;

pub use broadcast::{Broadcaster, ChannelBroadcaster, Envelope, ForegroundSubscription};

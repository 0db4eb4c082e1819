//! Common test utilities and helpers
//!
//! - Engine fixtures wired to a wiremock API
//! - Recording fakes for the platform seams (alerts, windows)
//! - Custom assertion macros

#[macro_use]
pub mod assertions;
pub mod fakes;
pub mod fixtures;

pub use fakes::*;
pub use fixtures::*;

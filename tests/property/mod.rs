//! Property-based tests

mod payload_proptest;
mod retry_proptest;

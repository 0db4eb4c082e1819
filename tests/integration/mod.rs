//! Integration tests
//!
//! End-to-end scenarios against a wiremock REST API

mod cache_test;
mod notification_test;
mod store_test;
mod sync_test;

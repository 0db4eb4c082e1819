//! Engine fixtures
//!
//! Every fixture runs against a fresh in-memory store and a wiremock
//! server standing in for the REST API under `/api`.

use super::fakes::RecordingPresenter;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use volunteer_sync::shared::EngineConfig;
use volunteer_sync::worker::api_client::HttpRemoteApi;
use volunteer_sync::worker::local_db::LocalStore;
use volunteer_sync::worker::offline::{NewOperation, OperationKind};
use volunteer_sync::worker::SyncEngine;
use wiremock::MockServer;

pub const TEST_USER: &str = "volunteer-1";

pub struct TestEngine {
    pub server: MockServer,
    pub engine: SyncEngine,
    pub presenter: Arc<RecordingPresenter>,
}

impl TestEngine {
    pub async fn start() -> Self {
        Self::with_timeout(Duration::from_secs(5)).await
    }

    pub async fn with_timeout(timeout: Duration) -> Self {
        let server = MockServer::start().await;
        let config = EngineConfig::builder()
            .api_base_url(format!("{}/api", server.uri()))
            .app_origin("http://localhost:3000")
            .auth_token("test-token")
            .request_timeout(timeout)
            .build()
            .expect("test config is valid");

        let store = LocalStore::open_in_memory().await.expect("in-memory store");
        let api = HttpRemoteApi::from_config(&config).expect("http client");
        let presenter = Arc::new(RecordingPresenter::default());
        let engine = SyncEngine::with_parts(config, store, Arc::new(api), presenter.clone());

        Self {
            server,
            engine,
            presenter,
        }
    }

    /// Put an action straight into the queue; returns its id
    pub async fn queue(&self, draft: NewOperation) -> i64 {
        self.engine
            .queue()
            .enqueue(draft)
            .await
            .expect("enqueue")
            .operation()
            .id
    }
}

pub fn registration(event_id: &str) -> NewOperation {
    NewOperation::new(OperationKind::Registration, event_id, TEST_USER, json!({"shift": "morning"}))
}

pub fn check_in(event_id: &str) -> NewOperation {
    NewOperation::new(OperationKind::CheckIn, event_id, TEST_USER, json!({"method": "qr"}))
}

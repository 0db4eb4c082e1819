//! Remote API Client
//!
//! The two endpoints the sync executor replays queued operations against:
//! `POST /events/{id}/register` and `POST /events/{id}/check-in`. Responses
//! are treated as opaque: only the status code and a body excerpt matter.

use crate::shared::EngineConfig;
use crate::worker::offline::PendingOperation;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Response of a replayed operation, whatever its status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced an HTTP response
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Remote side of the operation queue
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Send one operation to its endpoint.
    ///
    /// Any HTTP status is `Ok`; `Err` means no response was received.
    async fn submit(&self, operation: &PendingOperation) -> Result<ApiResponse, TransportError>;
}

/// `RemoteApi` over HTTP with a bearer token
#[derive(Debug, Clone)]
pub struct HttpRemoteApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpRemoteApi {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, TransportError> {
        let base_url = Url::parse(base_url).map_err(|e| TransportError::Request(format!("invalid base url: {}", e)))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, TransportError> {
        Self::new(&config.api_base_url, config.auth_token.clone(), config.request_timeout)
    }

    /// `{base}/events/{foreignKey}/{endpoint}` with the event id percent-encoded
    pub fn endpoint_url(&self, operation: &PendingOperation) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::Request(format!("base url cannot take a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["events", operation.foreign_key.as_str(), operation.kind.endpoint()]);
        Ok(url)
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn submit(&self, operation: &PendingOperation) -> Result<ApiResponse, TransportError> {
        let url = self.endpoint_url(operation)?;
        let body = match &operation.payload {
            Value::Null => Value::Object(Default::default()),
            payload => payload.clone(),
        };

        let mut request = self.client.post(url.clone()).json(&body);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        tracing::debug!("[Api] POST {} for operation {}", url, operation.id);
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(ApiResponse { status, body })
    }
}

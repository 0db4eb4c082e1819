//! # Cache Strategy Router
//!
//! Sits beneath every outbound GET and serves it with the policy of its
//! resource class (see [`strategy`]):
//!
//! - **cache-first**: cached copy if any, otherwise network (cached on 200)
//! - **network-first**: network (cached on 200), otherwise cached copy,
//!   otherwise an offline fallback: an empty-collection JSON body for API
//!   calls, the cached offline page for navigations
//! - **stale-while-revalidate**: cached copy at once while a background
//!   fetch refreshes it; without a cached copy, wait for the network
//!
//! Cache writes are best effort: a store failure is logged and the response
//! is still served.

pub mod entities;
pub mod fetch;
pub mod response_cache;
pub mod strategy;

pub use entities::{CachedEntity, EntityCache};
pub use fetch::{Destination, FetchRequest, FetchResponse, Fetcher, HttpFetcher};
pub use response_cache::ResponseCache;
pub use strategy::{CacheStrategy, ResourceClass, Scope};

use crate::worker::api_client::TransportError;
use crate::worker::local_db::{LocalStore, Result as StoreResult};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Url;
use serde::Serializer;
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    /// Synthesized or offline page
    OfflineFallback,
}

#[derive(Debug)]
pub enum RouteOutcome {
    /// Not intercepted; the caller performs the request itself
    Passthrough,
    Served {
        response: FetchResponse,
        source: ResponseSource,
        /// Background refresh started by stale-while-revalidate
        revalidation: Option<JoinHandle<()>>,
    },
    /// Neither network nor cache could answer
    Unavailable(TransportError),
}

impl RouteOutcome {
    pub fn response(&self) -> Option<&FetchResponse> {
        match self {
            RouteOutcome::Served { response, .. } => Some(response),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<ResponseSource> {
        match self {
            RouteOutcome::Served { source, .. } => Some(*source),
            _ => None,
        }
    }
}

pub struct CacheRouter {
    fetcher: Arc<dyn Fetcher>,
    responses: ResponseCache,
    entities: EntityCache,
    scope: Scope,
    offline_page: String,
}

impl CacheRouter {
    pub fn new(store: LocalStore, fetcher: Arc<dyn Fetcher>, scope: Scope, offline_page: impl Into<String>) -> Self {
        Self {
            fetcher,
            responses: ResponseCache::new(store.clone()),
            entities: EntityCache::new(store),
            scope,
            offline_page: offline_page.into(),
        }
    }

    pub fn entities(&self) -> &EntityCache {
        &self.entities
    }

    /// Pre-cache app-shell resources (offline page, icons, ...) so they are
    /// available before the first offline navigation. Returns how many were
    /// stored.
    pub async fn precache(&self, paths: &[&str]) -> usize {
        let mut stored = 0;
        for path in paths {
            let url = match self.scope.app_origin().join(path) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!("[Cache] Invalid precache path {}: {}", path, e);
                    continue;
                }
            };
            let request = FetchRequest::get(url, Destination::Document);
            match self.fetcher.fetch(&request).await {
                Ok(response) if response.is_cacheable() => {
                    if store_response(&self.responses, &request.url, &response).await {
                        stored += 1;
                    }
                }
                Ok(response) => tracing::warn!("[Cache] Precache of {} returned {}", path, response.status),
                Err(e) => tracing::warn!("[Cache] Precache of {} failed: {}", path, e),
            }
        }
        tracing::info!("[Cache] Precached {}/{} resources", stored, paths.len());
        stored
    }

    /// Serve one request according to its resource class
    pub async fn handle(&self, request: &FetchRequest) -> RouteOutcome {
        let class = match self.scope.classify(request) {
            Some(class) => class,
            None => return RouteOutcome::Passthrough,
        };

        match class.strategy() {
            CacheStrategy::CacheFirst => self.cache_first(request).await,
            CacheStrategy::NetworkFirst => self.network_first(request, class).await,
            CacheStrategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
        }
    }

    async fn cache_first(&self, request: &FetchRequest) -> RouteOutcome {
        if let Some(response) = self.cached(&request.url).await {
            return served(response, ResponseSource::Cache);
        }
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    store_response(&self.responses, &request.url, &response).await;
                }
                served(response, ResponseSource::Network)
            }
            Err(e) => RouteOutcome::Unavailable(e),
        }
    }

    async fn network_first(&self, request: &FetchRequest, class: ResourceClass) -> RouteOutcome {
        let error = match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    store_response(&self.responses, &request.url, &response).await;
                    if class == ResourceClass::Api {
                        self.snapshot_entity(&request.url, &response).await;
                    }
                }
                return served(response, ResponseSource::Network);
            }
            Err(e) => e,
        };

        tracing::debug!("[Cache] Network failed for {} ({}), trying cache", request.url, error);
        if let Some(response) = self.cached(&request.url).await {
            return served(response, ResponseSource::Cache);
        }

        match class {
            ResourceClass::Api => served(offline_api_response(), ResponseSource::OfflineFallback),
            ResourceClass::Document => match self.offline_page().await {
                Some(page) => served(page, ResponseSource::OfflineFallback),
                None => RouteOutcome::Unavailable(error),
            },
            _ => RouteOutcome::Unavailable(error),
        }
    }

    async fn stale_while_revalidate(&self, request: &FetchRequest) -> RouteOutcome {
        match self.cached(&request.url).await {
            Some(response) => {
                let fetcher = Arc::clone(&self.fetcher);
                let responses = self.responses.clone();
                let request = request.clone();
                let revalidation = tokio::spawn(async move {
                    match fetcher.fetch(&request).await {
                        Ok(fresh) if fresh.is_cacheable() => {
                            store_response(&responses, &request.url, &fresh).await;
                        }
                        Ok(fresh) => tracing::debug!("[Cache] Revalidation of {} returned {}", request.url, fresh.status),
                        Err(e) => tracing::debug!("[Cache] Revalidation of {} failed: {}", request.url, e),
                    }
                });
                RouteOutcome::Served {
                    response,
                    source: ResponseSource::Cache,
                    revalidation: Some(revalidation),
                }
            }
            None => match self.fetcher.fetch(request).await {
                Ok(response) => {
                    if response.is_cacheable() {
                        store_response(&self.responses, &request.url, &response).await;
                    }
                    served(response, ResponseSource::Network)
                }
                Err(e) => RouteOutcome::Unavailable(e),
            },
        }
    }

    async fn cached(&self, url: &Url) -> Option<FetchResponse> {
        match self.responses.get(url.as_str()).await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!("[Cache] Cache read for {} failed: {}", url, e);
                None
            }
        }
    }

    async fn offline_page(&self) -> Option<FetchResponse> {
        let url = self.scope.app_origin().join(&self.offline_page).ok()?;
        self.cached(&url).await
    }

    /// `GET {api}/{collection}/{id}` returning a JSON object updates the
    /// entity snapshot
    async fn snapshot_entity(&self, url: &Url, response: &FetchResponse) {
        let segments = self.scope.api_segments(url);
        let (collection, entity_id) = match segments.as_slice() {
            [collection, entity_id] => (*collection, *entity_id),
            _ => return,
        };
        let attributes: serde_json::Value = match serde_json::from_slice(&response.body) {
            Ok(value @ serde_json::Value::Object(_)) => value,
            _ => return,
        };
        if let Err(e) = self.entities.put(collection, entity_id, attributes).await {
            tracing::warn!("[Cache] Failed to snapshot {}/{}: {}", collection, entity_id, e);
        }
    }
}

fn served(response: FetchResponse, source: ResponseSource) -> RouteOutcome {
    RouteOutcome::Served {
        response,
        source,
        revalidation: None,
    }
}

async fn store_response(cache: &ResponseCache, url: &Url, response: &FetchResponse) -> bool {
    match cache.put(url.as_str(), response).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("[Cache] Failed to cache {}: {}", url, e);
            false
        }
    }
}

/// Delete response and entity snapshots cached before `cutoff`.
/// Returns `(responses, entities)` removed.
pub async fn prune_caches(store: &LocalStore, cutoff: DateTime<Utc>) -> StoreResult<(usize, usize)> {
    let responses = ResponseCache::new(store.clone()).prune_older_than(cutoff).await?;
    let entities = EntityCache::new(store.clone()).prune_older_than(cutoff).await?;
    Ok((responses, entities))
}

/// `cachedAt` in fixed-width RFC 3339 so the index sorts chronologically
pub(crate) fn index_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn serialize_cached_at<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&index_timestamp(at))
}

/// Deterministic body served for API calls while offline
pub fn offline_api_response() -> FetchResponse {
    FetchResponse::json(
        200,
        &json!({
            "data": [],
            "offline": true,
            "message": "You are offline. Showing cached data where available.",
        }),
    )
}

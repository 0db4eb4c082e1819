//! HTTP responses kept by the cache router, in the `responseCache` collection.
//! Bodies are stored base64-encoded inside the JSON record.

use super::fetch::FetchResponse;
use crate::worker::local_db::schema::RESPONSE_CACHE;
use crate::worker::local_db::{LocalStore, Result, TransactionMode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedResponse {
    url: String,
    status: u16,
    content_type: Option<String>,
    body: String,
    #[serde(serialize_with = "super::serialize_cached_at")]
    cached_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ResponseCache {
    store: LocalStore,
}

impl ResponseCache {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, url: &str) -> Result<Option<FetchResponse>> {
        let cached: Option<CachedResponse> = self.store.get(RESPONSE_CACHE, url).await?;
        Ok(cached.and_then(|c| match STANDARD.decode(c.body.as_bytes()) {
            Ok(body) => Some(FetchResponse {
                status: c.status,
                content_type: c.content_type,
                body: body.into(),
            }),
            Err(e) => {
                tracing::warn!("[Cache] Dropping undecodable cache entry for {}: {}", url, e);
                None
            }
        }))
    }

    pub async fn put(&self, url: &str, response: &FetchResponse) -> Result<()> {
        let record = CachedResponse {
            url: url.to_string(),
            status: response.status,
            content_type: response.content_type.clone(),
            body: STANDARD.encode(&response.body),
            cached_at: Utc::now(),
        };
        self.store.put(RESPONSE_CACHE, &record).await?;
        Ok(())
    }

    /// Delete entries cached before `cutoff`. Returns how many.
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut tx = self.store.transaction(&[RESPONSE_CACHE], TransactionMode::ReadWrite).await?;
        let expired: Vec<CachedResponse> = tx
            .get_all_by_index_below(RESPONSE_CACHE, "cachedAt", super::index_timestamp(&cutoff))
            .await?;
        let mut removed = 0;
        for entry in expired {
            if tx.delete(RESPONSE_CACHE, entry.url).await? {
                removed += 1;
            }
        }
        tx.commit().await?;
        if removed > 0 {
            tracing::debug!("[Cache] Pruned {} cached responses", removed);
        }
        Ok(removed)
    }
}

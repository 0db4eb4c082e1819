//! Cached domain entities
//!
//! Read-through snapshots of server entities (events, organizations, ...),
//! written whenever an API read succeeds and read back when the network is
//! not available. Snapshots may be stale and are never used for writes.

use crate::worker::local_db::schema::CACHED_ENTITIES;
use crate::worker::local_db::{LocalStore, Result, TransactionMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedEntity {
    /// `{collection}/{entityId}`
    pub id: String,
    pub collection: String,
    pub entity_id: String,
    /// Last-known attributes as returned by the server
    pub attributes: Value,
    #[serde(serialize_with = "super::serialize_cached_at")]
    pub cached_at: DateTime<Utc>,
}

impl CachedEntity {
    pub fn key(collection: &str, entity_id: &str) -> String {
        format!("{}/{}", collection, entity_id)
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.cached_at
    }
}

#[derive(Debug, Clone)]
pub struct EntityCache {
    store: LocalStore,
}

impl EntityCache {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub async fn put(&self, collection: &str, entity_id: &str, attributes: Value) -> Result<CachedEntity> {
        let entity = CachedEntity {
            id: CachedEntity::key(collection, entity_id),
            collection: collection.to_string(),
            entity_id: entity_id.to_string(),
            attributes,
            cached_at: Utc::now(),
        };
        self.store.put(CACHED_ENTITIES, &entity).await?;
        Ok(entity)
    }

    pub async fn get(&self, collection: &str, entity_id: &str) -> Result<Option<CachedEntity>> {
        self.store
            .get(CACHED_ENTITIES, CachedEntity::key(collection, entity_id))
            .await
    }

    /// Snapshot no older than `max_age`
    pub async fn get_fresh(
        &self,
        collection: &str,
        entity_id: &str,
        max_age: chrono::Duration,
    ) -> Result<Option<CachedEntity>> {
        let now = Utc::now();
        Ok(self
            .get(collection, entity_id)
            .await?
            .filter(|entity| entity.age(now) <= max_age))
    }

    /// Delete snapshots cached before `cutoff`. Returns how many.
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut tx = self.store.transaction(&[CACHED_ENTITIES], TransactionMode::ReadWrite).await?;
        let expired: Vec<CachedEntity> = tx
            .get_all_by_index_below(CACHED_ENTITIES, "cachedAt", super::index_timestamp(&cutoff))
            .await?;
        let mut removed = 0;
        for entity in expired {
            if tx.delete(CACHED_ENTITIES, entity.id).await? {
                removed += 1;
            }
        }
        tx.commit().await?;
        if removed > 0 {
            tracing::debug!("[Cache] Pruned {} entity snapshots", removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn cache() -> EntityCache {
        EntityCache::new(LocalStore::open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_put_overwrites_snapshot() {
        let cache = cache().await;
        cache.put("events", "evt-7", json!({"title": "Beach cleanup"})).await.unwrap();
        cache.put("events", "evt-7", json!({"title": "Beach cleanup (moved)"})).await.unwrap();
        cache.put("organizations", "org-1", json!({"name": "Shore Club"})).await.unwrap();

        let entity = cache.get("events", "evt-7").await.unwrap().unwrap();
        assert_eq!(entity.attributes["title"], "Beach cleanup (moved)");
        let all: Vec<CachedEntity> = cache.store.get_all(CACHED_ENTITIES).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_freshness() {
        let cache = cache().await;
        cache.put("events", "evt-1", json!({})).await.unwrap();
        assert!(cache.get_fresh("events", "evt-1", chrono::Duration::minutes(5)).await.unwrap().is_some());
        assert!(cache.get_fresh("events", "evt-1", chrono::Duration::seconds(-1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prune() {
        let cache = cache().await;
        cache.put("events", "evt-1", json!({})).await.unwrap();
        let removed = cache.prune_older_than(Utc::now() + chrono::Duration::seconds(1)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(cache.get("events", "evt-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prune_keeps_recent_snapshots() {
        let cache = cache().await;
        let mut old = cache.put("events", "evt-1", json!({})).await.unwrap();
        old.cached_at = Utc::now() - chrono::Duration::days(10);
        cache.store.put(CACHED_ENTITIES, &old).await.unwrap();
        cache.put("events", "evt-2", json!({})).await.unwrap();

        let removed = cache.prune_older_than(Utc::now() - chrono::Duration::days(7)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(cache.get("events", "evt-1").await.unwrap().is_none());
        assert!(cache.get("events", "evt-2").await.unwrap().is_some());
    }
}

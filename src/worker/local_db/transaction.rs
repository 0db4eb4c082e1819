//! Scoped store transactions
//!
//! A `StoreTransaction` wraps one SQLite transaction and only admits the
//! collections it was opened for. Dropping it without calling
//! [`commit`](StoreTransaction::commit) rolls every change back, so a
//! multi-record update is never partially visible.

use super::schema::{CollectionMeta, SchemaCatalog};
use super::{Result, StoreError, StoreKey};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::{Sqlite, SqliteConnection, Transaction};
use std::fmt;
use std::sync::Arc;

/// Access mode of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

/// Atomic unit of work over one or more collections
pub struct StoreTransaction {
    tx: Transaction<'static, Sqlite>,
    catalog: Arc<SchemaCatalog>,
    scope: Vec<String>,
    mode: TransactionMode,
}

impl fmt::Debug for StoreTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreTransaction")
            .field("scope", &self.scope)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl StoreTransaction {
    pub(super) fn new(
        tx: Transaction<'static, Sqlite>,
        catalog: Arc<SchemaCatalog>,
        scope: Vec<String>,
        mode: TransactionMode,
    ) -> Self {
        Self { tx, catalog, scope, mode }
    }

    /// Insert or replace `record`, returning its key.
    ///
    /// The key is read from the collection's key path. In an auto-increment
    /// collection a record without a key gets the next one assigned and
    /// written back into its body.
    pub async fn put<T: Serialize>(&mut self, collection: &str, record: &T) -> Result<StoreKey> {
        let meta = self.writable(collection)?.clone();
        let mut body = serde_json::to_value(record)?;
        let object = body
            .as_object_mut()
            .ok_or_else(|| StoreError::NotAnObject(collection.to_string()))?;

        let key = match object.get(&meta.key_path).and_then(StoreKey::from_value) {
            Some(key) => {
                if meta.auto_increment {
                    if let StoreKey::Int(id) = key {
                        bump_next_key(&mut *self.tx, collection, id).await?;
                    }
                }
                key
            }
            None if meta.auto_increment => {
                let id = allocate_key(&mut *self.tx, collection).await?;
                object.insert(meta.key_path.clone(), Value::from(id));
                StoreKey::Int(id)
            }
            None => return Err(StoreError::MissingKey(collection.to_string())),
        };

        let encoded = key.encode();
        sqlx::query(
            "INSERT INTO records (collection, key, body) VALUES (?, ?, ?)
             ON CONFLICT(collection, key) DO UPDATE SET body = excluded.body",
        )
        .bind(collection)
        .bind(&encoded)
        .bind(body.to_string())
        .execute(&mut *self.tx)
        .await?;

        write_index_entries(&mut *self.tx, collection, &meta, &encoded, &body).await?;
        Ok(key)
    }

    /// Fetch one record by key
    pub async fn get<T: DeserializeOwned>(
        &mut self,
        collection: &str,
        key: impl Into<StoreKey>,
    ) -> Result<Option<T>> {
        self.readable(collection)?;
        let body: Option<String> =
            sqlx::query_scalar("SELECT body FROM records WHERE collection = ? AND key = ?")
                .bind(collection)
                .bind(key.into().encode())
                .fetch_optional(&mut *self.tx)
                .await?;
        body.map(|b| serde_json::from_str(&b).map_err(StoreError::from))
            .transpose()
    }

    /// Every record of a collection, in insertion order
    pub async fn get_all<T: DeserializeOwned>(&mut self, collection: &str) -> Result<Vec<T>> {
        self.readable(collection)?;
        let bodies: Vec<String> =
            sqlx::query_scalar("SELECT body FROM records WHERE collection = ? ORDER BY rowid")
                .bind(collection)
                .fetch_all(&mut *self.tx)
                .await?;
        decode_all(bodies)
    }

    /// Records whose indexed field equals `value`, in insertion order
    pub async fn get_all_by_index<T: DeserializeOwned, V: Serialize>(
        &mut self,
        collection: &str,
        index: &str,
        value: V,
    ) -> Result<Vec<T>> {
        self.index(collection, index)?;
        let bodies: Vec<String> = sqlx::query_scalar(
            "SELECT r.body FROM record_index_entries e
             JOIN records r ON r.collection = e.collection AND r.key = e.key
             WHERE e.collection = ? AND e.index_name = ? AND e.value = ?
             ORDER BY r.rowid",
        )
        .bind(collection)
        .bind(index)
        .bind(serde_json::to_string(&value)?)
        .fetch_all(&mut *self.tx)
        .await?;
        decode_all(bodies)
    }

    /// Records whose indexed value sorts strictly below `upper`, in index order.
    ///
    /// Index values compare as their JSON text, so this is only meaningful
    /// for fields written in a fixed-width sortable form (timestamps).
    pub async fn get_all_by_index_below<T: DeserializeOwned, V: Serialize>(
        &mut self,
        collection: &str,
        index: &str,
        upper: V,
    ) -> Result<Vec<T>> {
        self.index(collection, index)?;
        let bodies: Vec<String> = sqlx::query_scalar(
            "SELECT r.body FROM record_index_entries e
             JOIN records r ON r.collection = e.collection AND r.key = e.key
             WHERE e.collection = ? AND e.index_name = ? AND e.value < ?
             ORDER BY e.value, r.rowid",
        )
        .bind(collection)
        .bind(index)
        .bind(serde_json::to_string(&upper)?)
        .fetch_all(&mut *self.tx)
        .await?;
        decode_all(bodies)
    }

    /// Number of records whose indexed field equals `value`
    pub async fn count_by_index<V: Serialize>(
        &mut self,
        collection: &str,
        index: &str,
        value: V,
    ) -> Result<u64> {
        self.index(collection, index)?;
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM record_index_entries
             WHERE collection = ? AND index_name = ? AND value = ?",
        )
        .bind(collection)
        .bind(index)
        .bind(serde_json::to_string(&value)?)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count as u64)
    }

    /// Remove a record. Returns whether it existed.
    pub async fn delete(&mut self, collection: &str, key: impl Into<StoreKey>) -> Result<bool> {
        self.writable(collection)?;
        let encoded = key.into().encode();
        sqlx::query("DELETE FROM record_index_entries WHERE collection = ? AND key = ?")
            .bind(collection)
            .bind(&encoded)
            .execute(&mut *self.tx)
            .await?;
        let result = sqlx::query("DELETE FROM records WHERE collection = ? AND key = ?")
            .bind(collection)
            .bind(&encoded)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Make every change of this transaction durable
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    /// Discard every change of this transaction
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }

    fn readable(&self, collection: &str) -> Result<&CollectionMeta> {
        if !self.scope.iter().any(|c| c == collection) {
            return Err(StoreError::OutOfScope(collection.to_string()));
        }
        self.catalog
            .collection(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))
    }

    fn writable(&self, collection: &str) -> Result<&CollectionMeta> {
        if self.mode == TransactionMode::ReadOnly {
            return Err(StoreError::ReadOnly(collection.to_string()));
        }
        self.readable(collection)
    }

    fn index(&self, collection: &str, index: &str) -> Result<()> {
        let meta = self.readable(collection)?;
        if !meta.indexes.contains_key(index) {
            return Err(StoreError::UnknownIndex {
                collection: collection.to_string(),
                index: index.to_string(),
            });
        }
        Ok(())
    }
}

/// Replace the index entries of one record
pub(super) async fn write_index_entries(
    conn: &mut SqliteConnection,
    collection: &str,
    meta: &CollectionMeta,
    encoded_key: &str,
    body: &Value,
) -> Result<()> {
    sqlx::query("DELETE FROM record_index_entries WHERE collection = ? AND key = ?")
        .bind(collection)
        .bind(encoded_key)
        .execute(&mut *conn)
        .await?;

    for (index_name, key_path) in &meta.indexes {
        insert_index_entry(&mut *conn, collection, index_name, key_path, encoded_key, body).await?;
    }
    Ok(())
}

/// Index one record under one index. Records lacking the field (or holding
/// null there) are simply not indexed.
pub(super) async fn insert_index_entry(
    conn: &mut SqliteConnection,
    collection: &str,
    index_name: &str,
    key_path: &str,
    encoded_key: &str,
    body: &Value,
) -> Result<()> {
    let value = match body.get(key_path) {
        Some(Value::Null) | None => return Ok(()),
        Some(value) => value.to_string(),
    };
    sqlx::query(
        "INSERT OR REPLACE INTO record_index_entries (collection, index_name, value, key)
         VALUES (?, ?, ?, ?)",
    )
    .bind(collection)
    .bind(index_name)
    .bind(value)
    .bind(encoded_key)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn allocate_key(conn: &mut SqliteConnection, collection: &str) -> Result<i64> {
    let next: i64 = sqlx::query_scalar("SELECT next_key FROM store_collections WHERE name = ?")
        .bind(collection)
        .fetch_one(&mut *conn)
        .await?;
    sqlx::query("UPDATE store_collections SET next_key = ? WHERE name = ?")
        .bind(next + 1)
        .bind(collection)
        .execute(&mut *conn)
        .await?;
    Ok(next)
}

/// Keep the generator ahead of explicitly keyed records
async fn bump_next_key(conn: &mut SqliteConnection, collection: &str, used: i64) -> Result<()> {
    sqlx::query("UPDATE store_collections SET next_key = ? WHERE name = ? AND next_key <= ?")
        .bind(used + 1)
        .bind(collection)
        .bind(used)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn decode_all<T: DeserializeOwned>(bodies: Vec<String>) -> Result<Vec<T>> {
    bodies
        .iter()
        .map(|b| serde_json::from_str(b).map_err(StoreError::from))
        .collect()
}

//! # Local Database Module
//!
//! The durable local store: a transactional, schema-versioned document store
//! on top of SQLite. Records live in named collections, each with a key path
//! and optional secondary indexes, and survive worker restarts.
//!
//! ## Architecture
//!
//! - **records**: JSON bodies keyed by `(collection, key)`; `rowid` gives
//!   insertion order, which upserts preserve
//! - **record_index_entries**: one row per `(collection, index, value, key)`,
//!   maintained on every put/delete inside the same transaction
//! - **store_collections / store_indexes**: the catalog created by migrations
//! - **schema_migrations**: applied versions, so each migration runs once
//!
//! ## Usage
//!
//! ```rust,no_run
//! use volunteer_sync::worker::local_db::{LocalStore, TransactionMode, schema::OPERATIONS};
//!
//! # async fn example() -> Result<(), volunteer_sync::worker::local_db::StoreError> {
//! let store = LocalStore::open("/tmp/volunteer-sync.db").await?;
//!
//! let mut tx = store.transaction(&[OPERATIONS], TransactionMode::ReadWrite).await?;
//! let pending: Vec<serde_json::Value> = tx.get_all_by_index(OPERATIONS, "status", "pending").await?;
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```

pub mod schema;
pub mod transaction;

pub use transaction::{StoreTransaction, TransactionMode};

use schema::{CollectionMeta, SchemaCatalog, SchemaStep, CURRENT_SCHEMA_VERSION};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for local store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Local store failures. Any of them aborts the surrounding transaction.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Database(#[from] sqlx::Error),
    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("unknown collection '{0}'")]
    UnknownCollection(String),
    #[error("unknown index '{index}' on collection '{collection}'")]
    UnknownIndex { collection: String, index: String },
    #[error("collection '{0}' is not part of this transaction")]
    OutOfScope(String),
    #[error("write to '{0}' in a read-only transaction")]
    ReadOnly(String),
    #[error("record for '{0}' has no key")]
    MissingKey(String),
    #[error("record for '{0}' is not a JSON object")]
    NotAnObject(String),
    #[error("migration failed: {0}")]
    Migration(String),
}

/// Primary key of a record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreKey {
    Int(i64),
    Text(String),
}

impl StoreKey {
    /// Canonical JSON text used as the stored key
    pub fn encode(&self) -> String {
        match self {
            StoreKey::Int(id) => id.to_string(),
            StoreKey::Text(text) => Value::String(text.clone()).to_string(),
        }
    }

    pub fn from_value(value: &Value) -> Option<StoreKey> {
        match value {
            Value::Number(n) => n.as_i64().map(StoreKey::Int),
            Value::String(s) => Some(StoreKey::Text(s.clone())),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            StoreKey::Int(id) => Some(*id),
            StoreKey::Text(_) => None,
        }
    }
}

impl From<i64> for StoreKey {
    fn from(id: i64) -> Self {
        StoreKey::Int(id)
    }
}

impl From<&str> for StoreKey {
    fn from(text: &str) -> Self {
        StoreKey::Text(text.to_string())
    }
}

impl From<String> for StoreKey {
    fn from(text: String) -> Self {
        StoreKey::Text(text)
    }
}

impl From<&String> for StoreKey {
    fn from(text: &String) -> Self {
        StoreKey::Text(text.clone())
    }
}

const BASE_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS schema_migrations (
        version INTEGER PRIMARY KEY,
        applied_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS store_collections (
        name TEXT PRIMARY KEY,
        key_path TEXT NOT NULL,
        auto_increment INTEGER NOT NULL,
        next_key INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS store_indexes (
        collection TEXT NOT NULL,
        name TEXT NOT NULL,
        key_path TEXT NOT NULL,
        PRIMARY KEY (collection, name)
    )",
    "CREATE TABLE IF NOT EXISTS records (
        collection TEXT NOT NULL,
        key TEXT NOT NULL,
        body TEXT NOT NULL,
        PRIMARY KEY (collection, key)
    )",
    "CREATE TABLE IF NOT EXISTS record_index_entries (
        collection TEXT NOT NULL,
        index_name TEXT NOT NULL,
        value TEXT NOT NULL,
        key TEXT NOT NULL,
        PRIMARY KEY (collection, index_name, key)
    )",
    "CREATE INDEX IF NOT EXISTS idx_record_index_lookup
        ON record_index_entries (collection, index_name, value)",
];

/// How long a writer waits for the database lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the durable local store. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LocalStore {
    pool: SqlitePool,
    catalog: Arc<SchemaCatalog>,
}

impl LocalStore {
    /// Open or create a file-backed store and bring its schema up to date.
    ///
    /// Uses WAL mode so foreground readers do not block a draining worker.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Database(sqlx::Error::Io(e)))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Open a private in-memory store (tests, ephemeral workers)
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.busy_timeout(BUSY_TIMEOUT);
        // A single connection that is never recycled: closing it would drop the database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, running any pending migrations
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let mut conn = pool.acquire().await?;
        for statement in BASE_TABLES {
            sqlx::query(statement).execute(&mut *conn).await?;
        }
        drop(conn);

        let version = migrate(&pool).await?;
        let catalog = load_catalog(&pool, version).await?;
        tracing::debug!(
            "[Store] Opened local store at schema version {} ({} collections)",
            version,
            catalog.collection_names().count()
        );

        Ok(Self {
            pool,
            catalog: Arc::new(catalog),
        })
    }

    /// Schema version the store was migrated to
    pub fn schema_version(&self) -> i64 {
        self.catalog.version
    }

    /// Catalog of collections and indexes
    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// Begin a transaction scoped to `collections`.
    ///
    /// Read-write transactions take the database write lock up front
    /// (`BEGIN IMMEDIATE`), waiting up to the busy timeout for another
    /// writer to finish. A deferred transaction that read first could not
    /// upgrade once a concurrent writer committed.
    pub async fn transaction(&self, collections: &[&str], mode: TransactionMode) -> Result<StoreTransaction> {
        for name in collections {
            if self.catalog.collection(name).is_none() {
                return Err(StoreError::UnknownCollection(name.to_string()));
            }
        }
        let tx = match mode {
            TransactionMode::ReadOnly => self.pool.begin().await?,
            TransactionMode::ReadWrite => self.pool.begin_with("BEGIN IMMEDIATE").await?,
        };
        Ok(StoreTransaction::new(
            tx,
            Arc::clone(&self.catalog),
            collections.iter().map(|c| c.to_string()).collect(),
            mode,
        ))
    }

    /// Single-record put in its own transaction
    pub async fn put<T: Serialize>(&self, collection: &str, record: &T) -> Result<StoreKey> {
        let mut tx = self.transaction(&[collection], TransactionMode::ReadWrite).await?;
        let key = tx.put(collection, record).await?;
        tx.commit().await?;
        Ok(key)
    }

    /// Single-record get in its own transaction
    pub async fn get<T: DeserializeOwned>(&self, collection: &str, key: impl Into<StoreKey>) -> Result<Option<T>> {
        let mut tx = self.transaction(&[collection], TransactionMode::ReadOnly).await?;
        let record = tx.get(collection, key).await?;
        tx.commit().await?;
        Ok(record)
    }

    pub async fn get_all<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        let mut tx = self.transaction(&[collection], TransactionMode::ReadOnly).await?;
        let records = tx.get_all(collection).await?;
        tx.commit().await?;
        Ok(records)
    }

    pub async fn get_all_by_index<T: DeserializeOwned, V: Serialize>(
        &self,
        collection: &str,
        index: &str,
        value: V,
    ) -> Result<Vec<T>> {
        let mut tx = self.transaction(&[collection], TransactionMode::ReadOnly).await?;
        let records = tx.get_all_by_index(collection, index, value).await?;
        tx.commit().await?;
        Ok(records)
    }

    pub async fn count_by_index<V: Serialize>(&self, collection: &str, index: &str, value: V) -> Result<u64> {
        let mut tx = self.transaction(&[collection], TransactionMode::ReadOnly).await?;
        let count = tx.count_by_index(collection, index, value).await?;
        tx.commit().await?;
        Ok(count)
    }

    pub async fn delete(&self, collection: &str, key: impl Into<StoreKey>) -> Result<bool> {
        let mut tx = self.transaction(&[collection], TransactionMode::ReadWrite).await?;
        let existed = tx.delete(collection, key).await?;
        tx.commit().await?;
        Ok(existed)
    }

    /// Close the underlying pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Apply pending migrations in one transaction. Returns the resulting version.
async fn migrate(pool: &SqlitePool) -> Result<i64> {
    let mut tx = pool.begin_with("BEGIN IMMEDIATE").await?;

    let current: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
        .fetch_one(&mut *tx)
        .await?;

    if current > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::Migration(format!(
            "database is at version {} but this build only knows {}",
            current, CURRENT_SCHEMA_VERSION
        )));
    }

    for migration in schema::pending_migrations(current) {
        tracing::info!("[Store] Applying schema migration {}", migration.version);
        for step in migration.steps {
            apply_step(&mut tx, step).await?;
        }
        sqlx::query("INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?, ?)")
            .bind(migration.version)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(current.max(CURRENT_SCHEMA_VERSION))
}

async fn apply_step(conn: &mut SqliteConnection, step: &SchemaStep) -> Result<()> {
    match *step {
        SchemaStep::CreateCollection {
            name,
            key_path,
            auto_increment,
        } => {
            sqlx::query(
                "INSERT OR IGNORE INTO store_collections (name, key_path, auto_increment, next_key)
                 VALUES (?, ?, ?, 1)",
            )
            .bind(name)
            .bind(key_path)
            .bind(auto_increment)
            .execute(&mut *conn)
            .await?;
        }
        SchemaStep::CreateIndex {
            collection,
            name,
            key_path,
        } => {
            sqlx::query("INSERT OR IGNORE INTO store_indexes (collection, name, key_path) VALUES (?, ?, ?)")
                .bind(collection)
                .bind(name)
                .bind(key_path)
                .execute(&mut *conn)
                .await?;

            // Index records written before this index existed
            let rows: Vec<(String, String)> =
                sqlx::query_as("SELECT key, body FROM records WHERE collection = ?")
                    .bind(collection)
                    .fetch_all(&mut *conn)
                    .await?;
            for (key, body) in rows {
                let body: Value = serde_json::from_str(&body)?;
                transaction::insert_index_entry(&mut *conn, collection, name, key_path, &key, &body).await?;
            }
        }
    }
    Ok(())
}

async fn load_catalog(pool: &SqlitePool, version: i64) -> Result<SchemaCatalog> {
    let collections: Vec<(String, String, bool)> =
        sqlx::query_as("SELECT name, key_path, auto_increment FROM store_collections")
            .fetch_all(pool)
            .await?;
    let indexes: Vec<(String, String, String)> =
        sqlx::query_as("SELECT collection, name, key_path FROM store_indexes")
            .fetch_all(pool)
            .await?;

    let mut catalog: HashMap<String, CollectionMeta> = collections
        .into_iter()
        .map(|(name, key_path, auto_increment)| {
            (
                name,
                CollectionMeta {
                    key_path,
                    auto_increment,
                    indexes: Default::default(),
                },
            )
        })
        .collect();

    for (collection, name, key_path) in indexes {
        match catalog.get_mut(&collection) {
            Some(meta) => {
                meta.indexes.insert(name, key_path);
            }
            None => {
                return Err(StoreError::Migration(format!(
                    "index '{}' refers to missing collection '{}'",
                    name, collection
                )))
            }
        }
    }

    Ok(SchemaCatalog::new(version, catalog))
}

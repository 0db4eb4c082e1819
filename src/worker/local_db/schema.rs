//! Database Schema Definitions
//!
//! Collections and indexes of the local store, expressed as an ordered list
//! of additive migrations. A migration may only create collections or
//! indexes; nothing is ever dropped, so queued operations survive upgrades.

use std::collections::{BTreeMap, HashMap};

/// Pending user actions awaiting server confirmation
pub const OPERATIONS: &str = "operations";
/// Notification inbox
pub const NOTIFICATIONS: &str = "notifications";
/// Read-through snapshots of server entities
pub const CACHED_ENTITIES: &str = "cachedEntities";
/// HTTP responses kept by the cache router
pub const RESPONSE_CACHE: &str = "responseCache";

/// Current database schema version
pub const CURRENT_SCHEMA_VERSION: i64 = 3;

/// One additive schema change
#[derive(Debug, Clone, Copy)]
pub enum SchemaStep {
    CreateCollection {
        name: &'static str,
        key_path: &'static str,
        auto_increment: bool,
    },
    CreateIndex {
        collection: &'static str,
        name: &'static str,
        key_path: &'static str,
    },
}

/// Steps applied together when upgrading to `version`
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub steps: &'static [SchemaStep],
}

/// Every migration, in version order
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        steps: &[
            SchemaStep::CreateCollection {
                name: OPERATIONS,
                key_path: "id",
                auto_increment: true,
            },
            SchemaStep::CreateIndex {
                collection: OPERATIONS,
                name: "status",
                key_path: "status",
            },
            SchemaStep::CreateIndex {
                collection: OPERATIONS,
                name: "foreignKey",
                key_path: "foreignKey",
            },
            SchemaStep::CreateCollection {
                name: NOTIFICATIONS,
                key_path: "id",
                auto_increment: false,
            },
        ],
    },
    Migration {
        version: 2,
        steps: &[
            SchemaStep::CreateIndex {
                collection: NOTIFICATIONS,
                name: "read",
                key_path: "read",
            },
            SchemaStep::CreateCollection {
                name: CACHED_ENTITIES,
                key_path: "id",
                auto_increment: false,
            },
            SchemaStep::CreateIndex {
                collection: CACHED_ENTITIES,
                name: "cachedAt",
                key_path: "cachedAt",
            },
        ],
    },
    Migration {
        version: 3,
        steps: &[
            SchemaStep::CreateCollection {
                name: RESPONSE_CACHE,
                key_path: "url",
                auto_increment: false,
            },
            SchemaStep::CreateIndex {
                collection: RESPONSE_CACHE,
                name: "cachedAt",
                key_path: "cachedAt",
            },
        ],
    },
];

/// Check if database needs migration
pub fn needs_migration(current_version: i64) -> bool {
    current_version < CURRENT_SCHEMA_VERSION
}

/// Migrations not yet applied at `current_version`
pub fn pending_migrations(current_version: i64) -> impl Iterator<Item = &'static Migration> {
    MIGRATIONS.iter().filter(move |m| m.version > current_version)
}

/// Runtime description of one collection, loaded from the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionMeta {
    pub key_path: String,
    pub auto_increment: bool,
    /// Index name -> key path
    pub indexes: BTreeMap<String, String>,
}

/// Collections and indexes known to an opened store
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    pub version: i64,
    collections: HashMap<String, CollectionMeta>,
}

impl SchemaCatalog {
    pub fn new(version: i64, collections: HashMap<String, CollectionMeta>) -> Self {
        Self { version, collections }
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionMeta> {
        self.collections.get(name)
    }

    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }
}

//! Durable key-value storage abstraction
//!
//! Collections are persisted as whole-collection JSON blobs under opaque
//! string keys; there are no transactions and no schema beyond one blob per
//! key. The store and sync engine only ever see this trait.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::Result;

mod file;

pub use file::FileStorage;

/// Storage keys for persisted collections and farm identity
pub mod keys {
    pub const ENTRIES: &str = "farmseed_entries";
    pub const FIELDS: &str = "farmseed_fields";
    pub const INVENTORY: &str = "farmseed_inventory";
    pub const INVENTORY_USAGE: &str = "farmseed_inventory_usage";
    pub const PENDING_DELETES: &str = "farmseed_pending_deletes";

    pub const FARM_ID: &str = "farmseed_farm_id";
    pub const FARM_NAME: &str = "farmseed_farm_name";
    pub const USER_NAME: &str = "farmseed_user_name";
    pub const DEVICE_ID: &str = "farmseed_device_id";
    pub const IS_ADMIN: &str = "farmseed_is_admin";
    pub const LAST_SYNC: &str = "farmseed_last_sync";
    pub const SYNC_WATERMARK: &str = "farmseed_sync_watermark";
}

/// Abstract durable store with get/set/remove by key
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the value stored under `key`, `None` when absent
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Durably write `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing an absent key is not an error
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory storage backend for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().expect("storage lock poisoned");
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().expect("storage lock poisoned");
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().expect("storage lock poisoned");
        values.remove(key);
        Ok(())
    }
}

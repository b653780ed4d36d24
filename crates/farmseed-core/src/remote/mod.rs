//! Remote service contracts: the farm data table and the membership
//! directory
//!
//! The backend stores every record kind in one composite table keyed by
//! `(id, farm_id)`, with the serialized record in a JSON column and the
//! record's own update timestamp alongside for merge decisions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::models::{Farm, FarmMember, NewMember, RecordId};

mod memory;
mod postgrest;

pub use memory::MemoryRemote;
pub use postgrest::PostgrestRemote;

/// Discriminator for the composite data table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Entry,
    Field,
    Inventory,
    InventoryUsage,
    /// Rows written by a newer app version; tolerated on pull, never sent
    #[serde(other)]
    Unknown,
}

impl DataKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Field => "field",
            Self::Inventory => "inventory",
            Self::InventoryUsage => "inventory_usage",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Uniform row shape for the composite farm data table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRow {
    pub id: RecordId,
    pub farm_id: String,
    pub data_type: DataKind,
    /// The serialized record, exactly as the owning device produced it
    pub data: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Abstract remote data service for record rows
///
/// Upserts are idempotent and keyed by `(id, farm_id)`; an upsert overwrites
/// remote content unconditionally. There is no incremental query - pulls are
/// full snapshots per farm.
#[async_trait]
pub trait RemoteDataService: Send + Sync {
    /// Insert-or-overwrite a batch of rows
    async fn upsert_rows(&self, rows: &[DataRow]) -> Result<()>;

    /// Fetch every row belonging to the farm
    async fn select_all(&self, farm_id: &str) -> Result<Vec<DataRow>>;

    /// Delete one row; deleting an absent row is not an error
    async fn delete_row(&self, id: RecordId, farm_id: &str) -> Result<()>;

    /// Bulk-delete every row of one kind for the farm
    async fn delete_by_kind(&self, farm_id: &str, kind: DataKind) -> Result<()>;
}

/// Abstract farm membership service
#[async_trait]
pub trait FarmDirectory: Send + Sync {
    /// Register a new farm; fails with `FarmAlreadyExists` on id collision
    async fn create_farm(&self, farm: &Farm) -> Result<()>;

    /// Look up a farm by id
    async fn get_farm(&self, id: &str) -> Result<Option<Farm>>;

    /// Insert-or-refresh a membership row keyed by `(farm_id, device_id)`
    async fn upsert_member(&self, member: &NewMember) -> Result<()>;

    /// Membership rows ordered by join time
    async fn list_members(&self, farm_id: &str) -> Result<Vec<FarmMember>>;

    /// Remove one membership row by its row id
    async fn delete_member(&self, member_id: &str) -> Result<()>;

    /// Remove a farm and everything attached to it
    async fn delete_farm(&self, farm_id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_kind_wire_format_is_snake_case() {
        assert_eq!(
            serde_json::to_string(&DataKind::InventoryUsage).unwrap(),
            "\"inventory_usage\""
        );
        let kind: DataKind = serde_json::from_str("\"entry\"").unwrap();
        assert_eq!(kind, DataKind::Entry);
    }

    #[test]
    fn unknown_data_kind_is_tolerated() {
        let kind: DataKind = serde_json::from_str("\"hologram\"").unwrap();
        assert_eq!(kind, DataKind::Unknown);
    }
}

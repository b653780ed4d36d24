//! Per-record merge policy and wire-row conversion
//!
//! Entries, fields, and inventory items merge last-writer-wins by update
//! timestamp, with ties going to the remote copy: convergence across devices
//! beats preserving an in-flight local edit stamped at the exact same
//! instant. Usage events are immutable, so their merge is a pure set-union
//! by id.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::models::{Field, InventoryItem, InventoryUsage, RecordId, SeedEntry};
use crate::remote::{DataKind, DataRow};
use crate::store::Snapshot;

/// A record kind that participates in timestamp-based sync
pub trait Replicated: Clone {
    fn record_id(&self) -> RecordId;
    fn last_updated(&self) -> DateTime<Utc>;
}

impl Replicated for SeedEntry {
    fn record_id(&self) -> RecordId {
        self.id
    }

    fn last_updated(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Replicated for Field {
    fn record_id(&self) -> RecordId {
        self.id
    }

    fn last_updated(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Replicated for InventoryItem {
    fn record_id(&self) -> RecordId {
        self.id
    }

    fn last_updated(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Replicated for InventoryUsage {
    fn record_id(&self) -> RecordId {
        self.id
    }

    /// Usage events are immutable; their creation time is their version
    fn last_updated(&self) -> DateTime<Utc> {
        self.used_at
    }
}

/// Merge remote records into local ones, last writer wins
///
/// A remote record replaces the local copy when its `updated_at` is greater
/// than or equal to the local one; otherwise the local copy stands. Locals
/// keep their order, unmatched remotes append in pull order.
pub fn merge_by_timestamp<T: Replicated>(local: Vec<T>, remote: Vec<T>) -> Vec<T> {
    let mut merged = local;
    let mut index: HashMap<RecordId, usize> = merged
        .iter()
        .enumerate()
        .map(|(position, record)| (record.record_id(), position))
        .collect();

    for candidate in remote {
        match index.get(&candidate.record_id()) {
            Some(&position) => {
                if candidate.last_updated() >= merged[position].last_updated() {
                    merged[position] = candidate;
                }
            }
            None => {
                index.insert(candidate.record_id(), merged.len());
                merged.push(candidate);
            }
        }
    }
    merged
}

/// Merge remote usage events by set-union: only unknown ids are added,
/// nothing local is overwritten or removed
pub fn merge_usage(
    local: Vec<InventoryUsage>,
    remote: Vec<InventoryUsage>,
) -> Vec<InventoryUsage> {
    let mut merged = local;
    let mut known: HashSet<RecordId> = merged.iter().map(|usage| usage.id).collect();
    for candidate in remote {
        if known.insert(candidate.id) {
            merged.push(candidate);
        }
    }
    merged
}

/// The four collections recovered from a pulled snapshot
#[derive(Debug, Default)]
pub struct PulledData {
    pub entries: Vec<SeedEntry>,
    pub fields: Vec<Field>,
    pub inventory: Vec<InventoryItem>,
    pub usage: Vec<InventoryUsage>,
}

/// Partition remote rows by kind, decoding each payload
///
/// A row that fails to decode, or carries a kind this version does not know,
/// is logged and skipped; one bad row must not wedge the sync loop.
pub fn partition_rows(rows: Vec<DataRow>) -> PulledData {
    let mut pulled = PulledData::default();
    for row in rows {
        match row.data_type {
            DataKind::Entry => decode_into(&mut pulled.entries, row),
            DataKind::Field => decode_into(&mut pulled.fields, row),
            DataKind::Inventory => decode_into(&mut pulled.inventory, row),
            DataKind::InventoryUsage => decode_into(&mut pulled.usage, row),
            DataKind::Unknown => {
                tracing::debug!(id = %row.id, "skipping row of unknown kind");
            }
        }
    }
    pulled
}

fn decode_into<T: DeserializeOwned>(target: &mut Vec<T>, row: DataRow) {
    let id = row.id;
    let kind = row.data_type;
    match serde_json::from_value(row.data) {
        Ok(record) => target.push(record),
        Err(error) => {
            tracing::warn!(%id, %kind, %error, "skipping undecodable remote row");
        }
    }
}

/// Serialize the full local snapshot into upload rows
pub fn rows_for_upload(snapshot: &Snapshot, farm_id: &str) -> Result<Vec<DataRow>> {
    let mut rows = Vec::with_capacity(
        snapshot.entries.len()
            + snapshot.fields.len()
            + snapshot.inventory.len()
            + snapshot.usage.len(),
    );
    for entry in &snapshot.entries {
        rows.push(make_row(entry, DataKind::Entry, farm_id)?);
    }
    for field in &snapshot.fields {
        rows.push(make_row(field, DataKind::Field, farm_id)?);
    }
    for item in &snapshot.inventory {
        rows.push(make_row(item, DataKind::Inventory, farm_id)?);
    }
    for usage in &snapshot.usage {
        rows.push(make_row(usage, DataKind::InventoryUsage, farm_id)?);
    }
    Ok(rows)
}

fn make_row<T: Serialize + Replicated>(record: &T, kind: DataKind, farm_id: &str) -> Result<DataRow> {
    Ok(DataRow {
        id: record.record_id(),
        farm_id: farm_id.to_string(),
        data_type: kind,
        data: serde_json::to_value(record)?,
        updated_at: record.last_updated(),
    })
}

//! Inventory models: stock items and immutable consumption events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{monotonic_now, RecordId};

/// Stock-keeping unit for inventory quantities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryUnit {
    #[default]
    Bags,
    Boxes,
    Units,
}

impl fmt::Display for InventoryUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bags => write!(f, "bags"),
            Self::Boxes => write!(f, "boxes"),
            Self::Units => write!(f, "units"),
        }
    }
}

/// A stock-keeping record for a seed lot
///
/// `quantity` is decremented exclusively through the store's consume
/// operation and must never go negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: RecordId,
    pub name: String,
    pub producer: String,
    pub variety_name: String,
    pub lot_number: String,
    pub traits: Vec<String>,
    pub treatments: Vec<String>,
    pub quantity: f64,
    pub unit: InventoryUnit,
    pub seeds_per_unit: f64,
    pub germination_percent: String,
    pub purchase_date: String,
    pub expiration_date: String,
    pub notes: String,
    #[serde(default)]
    pub image_uri: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User-provided fields for a new inventory item
#[derive(Debug, Clone, Default)]
pub struct InventoryItemDraft {
    pub name: String,
    pub producer: String,
    pub variety_name: String,
    pub lot_number: String,
    pub traits: Vec<String>,
    pub treatments: Vec<String>,
    pub quantity: f64,
    pub unit: InventoryUnit,
    pub seeds_per_unit: f64,
    pub germination_percent: String,
    pub purchase_date: String,
    pub expiration_date: String,
    pub notes: String,
    pub image_uri: Option<String>,
}

/// Partial update for an inventory item; `None` fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct InventoryItemPatch {
    pub name: Option<String>,
    pub producer: Option<String>,
    pub variety_name: Option<String>,
    pub lot_number: Option<String>,
    pub traits: Option<Vec<String>>,
    pub treatments: Option<Vec<String>>,
    pub quantity: Option<f64>,
    pub unit: Option<InventoryUnit>,
    pub seeds_per_unit: Option<f64>,
    pub germination_percent: Option<String>,
    pub purchase_date: Option<String>,
    pub expiration_date: Option<String>,
    pub notes: Option<String>,
    pub image_uri: Option<Option<String>>,
}

impl InventoryItem {
    /// Create a new inventory item from a draft
    #[must_use]
    pub fn new(draft: InventoryItemDraft) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new(),
            name: draft.name,
            producer: draft.producer,
            variety_name: draft.variety_name,
            lot_number: draft.lot_number,
            traits: draft.traits,
            treatments: draft.treatments,
            quantity: draft.quantity,
            unit: draft.unit,
            seeds_per_unit: draft.seeds_per_unit,
            germination_percent: draft.germination_percent,
            purchase_date: draft.purchase_date,
            expiration_date: draft.expiration_date,
            notes: draft.notes,
            image_uri: draft.image_uri,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update, bumping `updated_at`
    pub fn apply(&mut self, patch: InventoryItemPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(producer) = patch.producer {
            self.producer = producer;
        }
        if let Some(variety_name) = patch.variety_name {
            self.variety_name = variety_name;
        }
        if let Some(lot_number) = patch.lot_number {
            self.lot_number = lot_number;
        }
        if let Some(traits) = patch.traits {
            self.traits = traits;
        }
        if let Some(treatments) = patch.treatments {
            self.treatments = treatments;
        }
        if let Some(quantity) = patch.quantity {
            self.quantity = quantity;
        }
        if let Some(unit) = patch.unit {
            self.unit = unit;
        }
        if let Some(seeds_per_unit) = patch.seeds_per_unit {
            self.seeds_per_unit = seeds_per_unit;
        }
        if let Some(germination_percent) = patch.germination_percent {
            self.germination_percent = germination_percent;
        }
        if let Some(purchase_date) = patch.purchase_date {
            self.purchase_date = purchase_date;
        }
        if let Some(expiration_date) = patch.expiration_date {
            self.expiration_date = expiration_date;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        if let Some(image_uri) = patch.image_uri {
            self.image_uri = image_uri;
        }
        self.updated_at = monotonic_now(self.updated_at);
    }
}

/// An immutable event linking one inventory consumption to one entry
///
/// Append-only: usage events are never updated, only created, and only
/// removed by the bulk administrative purge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryUsage {
    pub id: RecordId,
    pub inventory_item_id: RecordId,
    pub entry_id: RecordId,
    pub quantity_used: f64,
    pub used_at: DateTime<Utc>,
}

impl InventoryUsage {
    /// Record a consumption event
    #[must_use]
    pub fn new(inventory_item_id: RecordId, entry_id: RecordId, quantity_used: f64) -> Self {
        Self {
            id: RecordId::new(),
            inventory_item_id,
            entry_id,
            quantity_used,
            used_at: Utc::now(),
        }
    }
}

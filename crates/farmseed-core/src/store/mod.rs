//! Local record store: authoritative in-process state for the four record
//! collections, write-through persisted to durable storage.
//!
//! All reads by callers and by the sync engine go through this store. Every
//! mutation updates the in-memory collection and persists the whole
//! collection in the same call; a persistence failure is logged and the
//! in-memory update stands (memory/disk divergence on storage failure is an
//! accepted risk for a single-device process).

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::{
    monotonic_now, EntryDraft, EntryPatch, Field, FieldDraft, FieldPatch, InventoryItem,
    InventoryItemDraft, InventoryItemPatch, InventoryUsage, RecordId, SeedEntry,
};
use crate::storage::{keys, StorageBackend};

/// A point-in-time clone of all four collections
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub entries: Vec<SeedEntry>,
    pub fields: Vec<Field>,
    pub inventory: Vec<InventoryItem>,
    pub usage: Vec<InventoryUsage>,
}

#[derive(Debug, Default)]
struct Collections {
    entries: Vec<SeedEntry>,
    fields: Vec<Field>,
    inventory: Vec<InventoryItem>,
    usage: Vec<InventoryUsage>,
    pending_deletes: Vec<RecordId>,
}

/// Clonable handle to the shared record collections
#[derive(Clone)]
pub struct LocalStore {
    storage: Arc<dyn StorageBackend>,
    inner: Arc<Mutex<Collections>>,
}

impl LocalStore {
    /// Open the store over the given storage backend and load persisted
    /// collections
    ///
    /// Missing keys yield empty collections. A corrupt blob is logged and
    /// yields an empty collection; storage I/O failures propagate.
    pub async fn open(storage: Arc<dyn StorageBackend>) -> Result<Self> {
        let store = Self {
            storage,
            inner: Arc::new(Mutex::new(Collections::default())),
        };
        store.load().await?;
        Ok(store)
    }

    async fn load(&self) -> Result<()> {
        let mut data = self.inner.lock().await;
        data.entries = self.load_collection(keys::ENTRIES).await?;
        data.fields = self.load_collection(keys::FIELDS).await?;
        data.inventory = self.load_collection(keys::INVENTORY).await?;
        data.usage = self.load_collection(keys::INVENTORY_USAGE).await?;
        data.pending_deletes = self.load_collection(keys::PENDING_DELETES).await?;
        tracing::debug!(
            entries = data.entries.len(),
            fields = data.fields.len(),
            inventory = data.inventory.len(),
            usage = data.usage.len(),
            pending_deletes = data.pending_deletes.len(),
            "local store loaded"
        );
        Ok(())
    }

    async fn load_collection<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        let Some(blob) = self.storage.get(key).await? else {
            return Ok(T::default());
        };
        match serde_json::from_str(&blob) {
            Ok(value) => Ok(value),
            Err(error) => {
                tracing::warn!(key, %error, "corrupt collection blob, starting empty");
                Ok(T::default())
            }
        }
    }

    /// Write-through persist; failures are logged, never propagated
    async fn persist<T: Serialize>(&self, key: &str, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(error) => {
                tracing::warn!(key, %error, "failed to serialize collection");
                return;
            }
        };
        if let Err(error) = self.storage.set(key, &json).await {
            tracing::warn!(key, %error, "failed to persist collection");
        }
    }

    // --- entries ---

    pub async fn add_entry(&self, draft: EntryDraft) -> SeedEntry {
        let mut data = self.inner.lock().await;
        let entry = SeedEntry::new(draft);
        data.entries.push(entry.clone());
        self.persist(keys::ENTRIES, &data.entries).await;
        tracing::debug!(id = %entry.id, "entry added");
        entry
    }

    /// Partial update; a missing id is a silent no-op and returns `None`
    pub async fn update_entry(&self, id: RecordId, patch: EntryPatch) -> Option<SeedEntry> {
        let mut data = self.inner.lock().await;
        let entry = data.entries.iter_mut().find(|entry| entry.id == id)?;
        entry.apply(patch);
        let updated = entry.clone();
        self.persist(keys::ENTRIES, &data.entries).await;
        Some(updated)
    }

    /// Remove an entry and queue its id for remote deletion
    pub async fn delete_entry(&self, id: RecordId) -> bool {
        let mut data = self.inner.lock().await;
        let before = data.entries.len();
        data.entries.retain(|entry| entry.id != id);
        if data.entries.len() == before {
            return false;
        }
        Self::queue_delete(&mut data.pending_deletes, id);
        self.persist(keys::ENTRIES, &data.entries).await;
        self.persist(keys::PENDING_DELETES, &data.pending_deletes).await;
        true
    }

    pub async fn entries(&self) -> Vec<SeedEntry> {
        self.inner.lock().await.entries.clone()
    }

    pub async fn entry_by_id(&self, id: RecordId) -> Option<SeedEntry> {
        let data = self.inner.lock().await;
        data.entries.iter().find(|entry| entry.id == id).cloned()
    }

    /// Entries matching a case-insensitive search over variety, producer,
    /// field name, and map label
    pub async fn search_entries(&self, query: &str) -> Vec<SeedEntry> {
        let data = self.inner.lock().await;
        if query.trim().is_empty() {
            return data.entries.clone();
        }
        data.entries
            .iter()
            .filter(|entry| entry.matches_search(query))
            .cloned()
            .collect()
    }

    // --- fields ---

    pub async fn add_field(&self, draft: FieldDraft) -> Field {
        let mut data = self.inner.lock().await;
        let field = Field::new(draft);
        data.fields.push(field.clone());
        self.persist(keys::FIELDS, &data.fields).await;
        tracing::debug!(id = %field.id, "field added");
        field
    }

    /// Bulk insert used by the field upload flow
    pub async fn add_fields(&self, drafts: Vec<FieldDraft>) -> Vec<Field> {
        let mut data = self.inner.lock().await;
        let created: Vec<Field> = drafts.into_iter().map(Field::new).collect();
        data.fields.extend(created.iter().cloned());
        self.persist(keys::FIELDS, &data.fields).await;
        tracing::debug!(count = created.len(), "fields added");
        created
    }

    /// Partial update; a missing id is a silent no-op and returns `None`
    pub async fn update_field(&self, id: RecordId, patch: FieldPatch) -> Option<Field> {
        let mut data = self.inner.lock().await;
        let field = data.fields.iter_mut().find(|field| field.id == id)?;
        field.apply(patch);
        let updated = field.clone();
        self.persist(keys::FIELDS, &data.fields).await;
        Some(updated)
    }

    /// Remove a field and queue its id for remote deletion
    pub async fn delete_field(&self, id: RecordId) -> bool {
        let mut data = self.inner.lock().await;
        let before = data.fields.len();
        data.fields.retain(|field| field.id != id);
        if data.fields.len() == before {
            return false;
        }
        Self::queue_delete(&mut data.pending_deletes, id);
        self.persist(keys::FIELDS, &data.fields).await;
        self.persist(keys::PENDING_DELETES, &data.pending_deletes).await;
        true
    }

    pub async fn fields(&self) -> Vec<Field> {
        self.inner.lock().await.fields.clone()
    }

    pub async fn field_by_id(&self, id: RecordId) -> Option<Field> {
        let data = self.inner.lock().await;
        data.fields.iter().find(|field| field.id == id).cloned()
    }

    // --- inventory ---

    pub async fn add_inventory_item(&self, draft: InventoryItemDraft) -> InventoryItem {
        let mut data = self.inner.lock().await;
        let item = InventoryItem::new(draft);
        data.inventory.push(item.clone());
        self.persist(keys::INVENTORY, &data.inventory).await;
        tracing::debug!(id = %item.id, "inventory item added");
        item
    }

    /// Bulk insert used by the inventory upload flow
    pub async fn add_inventory_items(&self, drafts: Vec<InventoryItemDraft>) -> Vec<InventoryItem> {
        let mut data = self.inner.lock().await;
        let created: Vec<InventoryItem> = drafts.into_iter().map(InventoryItem::new).collect();
        data.inventory.extend(created.iter().cloned());
        self.persist(keys::INVENTORY, &data.inventory).await;
        tracing::debug!(count = created.len(), "inventory items added");
        created
    }

    /// Partial update; a missing id is a silent no-op and returns `None`
    pub async fn update_inventory_item(
        &self,
        id: RecordId,
        patch: InventoryItemPatch,
    ) -> Option<InventoryItem> {
        let mut data = self.inner.lock().await;
        let item = data.inventory.iter_mut().find(|item| item.id == id)?;
        item.apply(patch);
        let updated = item.clone();
        self.persist(keys::INVENTORY, &data.inventory).await;
        Some(updated)
    }

    /// Remove an inventory item and queue its id for remote deletion
    pub async fn delete_inventory_item(&self, id: RecordId) -> bool {
        let mut data = self.inner.lock().await;
        let before = data.inventory.len();
        data.inventory.retain(|item| item.id != id);
        if data.inventory.len() == before {
            return false;
        }
        Self::queue_delete(&mut data.pending_deletes, id);
        self.persist(keys::INVENTORY, &data.inventory).await;
        self.persist(keys::PENDING_DELETES, &data.pending_deletes).await;
        true
    }

    pub async fn inventory(&self) -> Vec<InventoryItem> {
        self.inner.lock().await.inventory.clone()
    }

    pub async fn inventory_item_by_id(&self, id: RecordId) -> Option<InventoryItem> {
        let data = self.inner.lock().await;
        data.inventory.iter().find(|item| item.id == id).cloned()
    }

    /// Consume stock from an inventory item against an entry
    ///
    /// Decrements the item's quantity and records a usage event as one
    /// atomic in-memory transaction under the store lock; both collections
    /// are persisted together. Fails without mutating when the item is
    /// missing or the requested amount exceeds the available quantity.
    pub async fn consume(
        &self,
        inventory_item_id: RecordId,
        entry_id: RecordId,
        quantity: f64,
    ) -> Result<InventoryUsage> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "consumption quantity must be positive, got {quantity}"
            )));
        }

        let mut data = self.inner.lock().await;
        let Some(item) = data
            .inventory
            .iter_mut()
            .find(|item| item.id == inventory_item_id)
        else {
            return Err(Error::RecordNotFound(inventory_item_id.to_string()));
        };

        if quantity > item.quantity {
            return Err(Error::InsufficientStock {
                requested: quantity,
                available: item.quantity,
            });
        }

        item.quantity -= quantity;
        item.updated_at = monotonic_now(item.updated_at);
        let unit = item.unit;
        let name = item.name.clone();

        let usage = InventoryUsage::new(inventory_item_id, entry_id, quantity);
        data.usage.push(usage.clone());

        self.persist(keys::INVENTORY, &data.inventory).await;
        self.persist(keys::INVENTORY_USAGE, &data.usage).await;
        tracing::debug!(quantity, %unit, item = %name, "inventory consumed");
        Ok(usage)
    }

    pub async fn usage(&self) -> Vec<InventoryUsage> {
        self.inner.lock().await.usage.clone()
    }

    pub async fn usage_for_item(&self, inventory_item_id: RecordId) -> Vec<InventoryUsage> {
        let data = self.inner.lock().await;
        data.usage
            .iter()
            .filter(|usage| usage.inventory_item_id == inventory_item_id)
            .cloned()
            .collect()
    }

    pub async fn total_used_for_item(&self, inventory_item_id: RecordId) -> f64 {
        let data = self.inner.lock().await;
        data.usage
            .iter()
            .filter(|usage| usage.inventory_item_id == inventory_item_id)
            .map(|usage| usage.quantity_used)
            .sum()
    }

    // --- sync primitives ---

    /// Clone all four collections at once
    pub async fn snapshot(&self) -> Snapshot {
        let data = self.inner.lock().await;
        Snapshot {
            entries: data.entries.clone(),
            fields: data.fields.clone(),
            inventory: data.inventory.clone(),
            usage: data.usage.clone(),
        }
    }

    /// Wholesale replacement of all four collections, persisted
    ///
    /// This is the commit primitive of the sync engine's merge, and the
    /// purge primitive for recovery.
    pub async fn replace_all(
        &self,
        entries: Vec<SeedEntry>,
        fields: Vec<Field>,
        inventory: Vec<InventoryItem>,
        usage: Vec<InventoryUsage>,
    ) {
        let mut data = self.inner.lock().await;
        data.entries = entries;
        data.fields = fields;
        data.inventory = inventory;
        data.usage = usage;
        self.persist(keys::ENTRIES, &data.entries).await;
        self.persist(keys::FIELDS, &data.fields).await;
        self.persist(keys::INVENTORY, &data.inventory).await;
        self.persist(keys::INVENTORY_USAGE, &data.usage).await;
    }

    /// Ids deleted locally but not yet confirmed deleted remotely
    pub async fn pending_deletes(&self) -> Vec<RecordId> {
        self.inner.lock().await.pending_deletes.clone()
    }

    /// Clear the tombstone queue after the sync engine confirms the drain
    pub async fn clear_pending_deletes(&self) {
        let mut data = self.inner.lock().await;
        data.pending_deletes.clear();
        self.persist(keys::PENDING_DELETES, &data.pending_deletes).await;
    }

    fn queue_delete(pending: &mut Vec<RecordId>, id: RecordId) {
        if !pending.contains(&id) {
            pending.push(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use pretty_assertions::assert_eq;

    async fn setup() -> LocalStore {
        LocalStore::open(Arc::new(MemoryStorage::new())).await.unwrap()
    }

    fn entry_draft(variety: &str) -> EntryDraft {
        EntryDraft {
            variety_name: variety.to_string(),
            producer: "Pioneer".to_string(),
            field_name: "North 40".to_string(),
            ..EntryDraft::default()
        }
    }

    fn item_draft(name: &str, quantity: f64) -> InventoryItemDraft {
        InventoryItemDraft {
            name: name.to_string(),
            quantity,
            ..InventoryItemDraft::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn add_and_get_entry() {
        let store = setup().await;
        let entry = store.add_entry(entry_draft("P1197")).await;

        let fetched = store.entry_by_id(entry.id).await.unwrap();
        assert_eq!(fetched, entry);
        assert_eq!(store.entries().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_missing_entry_is_silent_noop() {
        let store = setup().await;
        let result = store
            .update_entry(
                RecordId::new(),
                EntryPatch {
                    notes: Some("ghost".to_string()),
                    ..EntryPatch::default()
                },
            )
            .await;
        assert_eq!(result, None);
        assert!(store.entries().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_bumps_timestamp() {
        let store = setup().await;
        let entry = store.add_entry(entry_draft("P1197")).await;

        let updated = store
            .update_entry(
                entry.id,
                EntryPatch {
                    variety_name: Some("P0843".to_string()),
                    ..EntryPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.variety_name, "P0843");
        assert!(updated.updated_at >= entry.updated_at);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_queues_tombstone() {
        let store = setup().await;
        let field = store.add_field(FieldDraft::default()).await;

        assert!(store.delete_field(field.id).await);
        assert!(store.fields().await.is_empty());
        assert_eq!(store.pending_deletes().await, vec![field.id]);

        // Deleting again is a no-op and does not duplicate the tombstone
        assert!(!store.delete_field(field.id).await);
        assert_eq!(store.pending_deletes().await.len(), 1);

        store.clear_pending_deletes().await;
        assert!(store.pending_deletes().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn consume_decrements_and_records_usage() {
        let store = setup().await;
        let item = store.add_inventory_item(item_draft("DKC62-89", 5.0)).await;
        let entry = store.add_entry(entry_draft("DKC62-89")).await;

        let usage = store.consume(item.id, entry.id, 3.0).await.unwrap();
        assert!((usage.quantity_used - 3.0).abs() < f64::EPSILON);

        let item = store.inventory_item_by_id(item.id).await.unwrap();
        assert!((item.quantity - 2.0).abs() < f64::EPSILON);
        assert_eq!(store.usage_for_item(item.id).await.len(), 1);
        assert!((store.total_used_for_item(item.id).await - 3.0).abs() < f64::EPSILON);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn consume_rejects_insufficient_stock() {
        let store = setup().await;
        let item = store.add_inventory_item(item_draft("DKC62-89", 2.0)).await;
        let entry = store.add_entry(entry_draft("DKC62-89")).await;

        let error = store.consume(item.id, entry.id, 10.0).await.unwrap_err();
        match error {
            Error::InsufficientStock {
                requested,
                available,
            } => {
                assert!((requested - 10.0).abs() < f64::EPSILON);
                assert!((available - 2.0).abs() < f64::EPSILON);
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }

        // No mutation happened
        let item = store.inventory_item_by_id(item.id).await.unwrap();
        assert!((item.quantity - 2.0).abs() < f64::EPSILON);
        assert!(store.usage().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn consume_rejects_missing_item() {
        let store = setup().await;
        let error = store
            .consume(RecordId::new(), RecordId::new(), 1.0)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::RecordNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn consume_rejects_nonpositive_quantity() {
        let store = setup().await;
        let item = store.add_inventory_item(item_draft("DKC62-89", 2.0)).await;
        let error = store
            .consume(item.id, RecordId::new(), 0.0)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn write_through_persists_collections() {
        let storage = Arc::new(MemoryStorage::new());
        let store = LocalStore::open(storage.clone()).await.unwrap();
        store.add_entry(entry_draft("P1197")).await;

        let blob = storage.get(keys::ENTRIES).await.unwrap().unwrap();
        let persisted: Vec<SeedEntry> = serde_json::from_str(&blob).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].variety_name, "P1197");

        // A fresh store over the same backend sees the data
        let reloaded = LocalStore::open(storage).await.unwrap();
        assert_eq!(reloaded.entries().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn corrupt_blob_loads_as_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(keys::ENTRIES, "{not json").await.unwrap();

        let store = LocalStore::open(storage).await.unwrap();
        assert!(store.entries().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replace_all_swaps_everything() {
        let store = setup().await;
        store.add_entry(entry_draft("P1197")).await;
        store.add_field(FieldDraft::default()).await;

        store.replace_all(vec![], vec![], vec![], vec![]).await;
        assert!(store.entries().await.is_empty());
        assert!(store.fields().await.is_empty());
        assert!(store.inventory().await.is_empty());
        assert!(store.usage().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn bulk_adds_assign_fresh_ids() {
        let store = setup().await;
        let fields = store
            .add_fields(vec![FieldDraft::default(), FieldDraft::default()])
            .await;
        assert_eq!(fields.len(), 2);
        assert_ne!(fields[0].id, fields[1].id);
        assert_eq!(store.fields().await.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn search_entries_filters_by_query() {
        let store = setup().await;
        store.add_entry(entry_draft("P1197")).await;
        store.add_entry(entry_draft("DKC62-89")).await;

        assert_eq!(store.search_entries("dkc").await.len(), 1);
        assert_eq!(store.search_entries("  ").await.len(), 2);
    }
}

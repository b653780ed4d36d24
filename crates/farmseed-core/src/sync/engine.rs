//! The sync engine: farm lifecycle, upload/pull/merge orchestration, and
//! failure isolation
//!
//! One engine instance owns all farm-connection state; the single-flight
//! guard and the bound farm id live here, never in globals. Errors from a
//! sync cycle are recorded for display and never kill the loop.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Farm, FarmMember, NewMember, RecordId};
use crate::remote::{DataKind, FarmDirectory, RemoteDataService};
use crate::storage::{keys, StorageBackend};
use crate::store::LocalStore;
use crate::util::normalize_text_option;

use super::merge::{merge_by_timestamp, merge_usage, partition_rows, rows_for_upload};

/// Rows per upsert batch during upload
pub const UPLOAD_BATCH_SIZE: usize = 500;

/// Connection/activity state, for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Disconnected,
    Idle,
    Syncing,
    Error,
}

/// What a sync trigger actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A full cycle ran to completion
    Completed,
    /// Dropped: another sync was in flight
    AlreadyInFlight,
    /// Dropped: no farm is bound
    NotConnected,
}

/// The farm this device is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FarmLink {
    pub id: String,
    pub name: String,
    pub is_admin: bool,
}

/// Snapshot of engine state for status display
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub state: SyncState,
    pub farm: Option<FarmLink>,
    pub user_name: String,
    pub device_id: String,
    pub members: Vec<FarmMember>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct EngineState {
    farm: Option<FarmLink>,
    user_name: String,
    device_id: String,
    members: Vec<FarmMember>,
    last_sync_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    /// Start time of the last successful cycle; the next cycle only uploads
    /// rows modified at or after this point
    upload_watermark: Option<DateTime<Utc>>,
}

/// Clonable handle to the per-process sync engine
#[derive(Clone)]
pub struct SyncEngine {
    store: LocalStore,
    remote: Arc<dyn RemoteDataService>,
    farms: Arc<dyn FarmDirectory>,
    storage: Arc<dyn StorageBackend>,
    state: Arc<Mutex<EngineState>>,
    syncing: Arc<AtomicBool>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine").finish_non_exhaustive()
    }
}

impl SyncEngine {
    pub fn new(
        store: LocalStore,
        remote: Arc<dyn RemoteDataService>,
        farms: Arc<dyn FarmDirectory>,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            store,
            remote,
            farms,
            storage,
            state: Arc::new(Mutex::new(EngineState::default())),
            syncing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The record store this engine syncs
    pub const fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Restore identity and farm binding from durable storage
    ///
    /// Generates and persists a device id on first run. When a farm is
    /// bound, refreshes the farm name and member list best-effort; those
    /// failures are logged, not fatal (the device may simply be offline).
    pub async fn load(&self) -> Result<()> {
        let device_id = match self.storage.get(keys::DEVICE_ID).await? {
            Some(device_id) => device_id,
            None => {
                let device_id = format!("dev-{}", Uuid::now_v7());
                self.storage.set(keys::DEVICE_ID, &device_id).await?;
                device_id
            }
        };

        let user_name = self.storage.get(keys::USER_NAME).await?.unwrap_or_default();
        let farm_id = self.storage.get(keys::FARM_ID).await?;
        let farm_name = self.storage.get(keys::FARM_NAME).await?.unwrap_or_default();
        let is_admin = self.storage.get(keys::IS_ADMIN).await?.as_deref() == Some("true");
        let last_sync_at = self
            .storage
            .get(keys::LAST_SYNC)
            .await?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc));
        let upload_watermark = self
            .storage
            .get(keys::SYNC_WATERMARK)
            .await?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc));

        {
            let mut state = self.state.lock().await;
            state.device_id = device_id;
            state.user_name = user_name;
            state.last_sync_at = last_sync_at;
            state.upload_watermark = upload_watermark;
            state.farm = farm_id.map(|id| FarmLink {
                id,
                name: farm_name,
                is_admin,
            });
        }

        if let Some(farm_id) = self.current_farm_id().await {
            match self.farms.get_farm(&farm_id).await {
                Ok(Some(farm)) => {
                    let mut state = self.state.lock().await;
                    if let Some(link) = state.farm.as_mut() {
                        link.name = farm.name;
                    }
                }
                Ok(None) => tracing::warn!(%farm_id, "bound farm no longer exists remotely"),
                Err(error) => tracing::debug!(%error, "could not refresh farm info on load"),
            }
            if let Err(error) = self.refresh_members().await {
                tracing::debug!(%error, "could not refresh members on load");
            }
        }

        Ok(())
    }

    pub async fn current_farm_id(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.farm.as_ref().map(|farm| farm.id.clone())
    }

    pub async fn device_id(&self) -> String {
        self.state.lock().await.device_id.clone()
    }

    /// Whether a sync cycle is currently in flight
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    pub async fn status(&self) -> EngineStatus {
        let state = self.state.lock().await;
        let sync_state = if state.farm.is_none() {
            SyncState::Disconnected
        } else if self.is_syncing() {
            SyncState::Syncing
        } else if state.last_error.is_some() {
            SyncState::Error
        } else {
            SyncState::Idle
        };
        EngineStatus {
            state: sync_state,
            farm: state.farm.clone(),
            user_name: state.user_name.clone(),
            device_id: state.device_id.clone(),
            members: state.members.clone(),
            last_sync_at: state.last_sync_at,
            last_error: state.last_error.clone(),
        }
    }

    // --- farm lifecycle ---

    /// Create a farm, register this device as its admin, and push local data
    pub async fn create_farm(
        &self,
        id: &str,
        name: &str,
        user_name: &str,
        password: Option<String>,
    ) -> Result<()> {
        let id = require_value(id, "farm id")?;
        let name = require_value(name, "farm name")?;
        let user_name = require_value(user_name, "user name")?;

        if self.farms.get_farm(&id).await?.is_some() {
            return Err(Error::FarmAlreadyExists(id));
        }

        let farm = Farm {
            id: id.clone(),
            name: name.clone(),
            password: normalize_text_option(password),
        };
        self.farms.create_farm(&farm).await?;

        let device_id = self.device_id().await;
        self.farms
            .upsert_member(&NewMember {
                farm_id: id.clone(),
                device_id,
                user_name: user_name.clone(),
                is_admin: true,
            })
            .await?;

        self.bind_farm(
            FarmLink {
                id: id.clone(),
                name,
                is_admin: true,
            },
            user_name,
        )
        .await?;

        self.upload_all(&id).await?;
        if let Err(error) = self.refresh_members().await {
            tracing::debug!(%error, "could not refresh members after create");
        }
        tracing::info!(farm_id = %id, "farm created");
        Ok(())
    }

    /// Join an existing farm and reconcile local data with it
    pub async fn join_farm(
        &self,
        id: &str,
        user_name: &str,
        password: Option<String>,
    ) -> Result<()> {
        let id = require_value(id, "farm id")?;
        let user_name = require_value(user_name, "user name")?;

        let Some(farm) = self.farms.get_farm(&id).await? else {
            return Err(Error::FarmNotFound(id));
        };
        if !farm.accepts_password(normalize_text_option(password).as_deref()) {
            return Err(Error::IncorrectPassword);
        }

        let device_id = self.device_id().await;
        self.farms
            .upsert_member(&NewMember {
                farm_id: id.clone(),
                device_id,
                user_name: user_name.clone(),
                is_admin: false,
            })
            .await?;

        self.bind_farm(
            FarmLink {
                id: id.clone(),
                name: farm.name,
                is_admin: false,
            },
            user_name,
        )
        .await?;

        self.upload_all(&id).await?;
        self.pull_and_merge(&id, &HashSet::new()).await?;
        if let Err(error) = self.refresh_members().await {
            tracing::debug!(%error, "could not refresh members after join");
        }
        tracing::info!(farm_id = %id, "joined farm");
        Ok(())
    }

    /// Leave the bound farm: remove our membership row best-effort, clear
    /// farm identity locally, keep local records
    pub async fn leave_farm(&self) -> Result<()> {
        let Some(farm_id) = self.current_farm_id().await else {
            return Ok(());
        };
        let device_id = self.device_id().await;

        match self.farms.list_members(&farm_id).await {
            Ok(members) => {
                if let Some(own) = members.iter().find(|member| member.device_id == device_id) {
                    if let Err(error) = self.farms.delete_member(&own.id).await {
                        tracing::warn!(%error, "could not remove own membership row");
                    }
                }
            }
            Err(error) => tracing::warn!(%error, "could not list members while leaving"),
        }

        self.clear_farm_state().await?;
        tracing::info!(%farm_id, "left farm");
        Ok(())
    }

    /// Remove another device's membership row; admin only (silent no-op
    /// otherwise)
    pub async fn remove_member(&self, member_id: &str) -> Result<()> {
        let is_admin = {
            let state = self.state.lock().await;
            state.farm.as_ref().is_some_and(|farm| farm.is_admin)
        };
        if !is_admin {
            tracing::debug!("remove_member ignored: not connected as admin");
            return Ok(());
        }
        self.farms.delete_member(member_id).await?;
        self.refresh_members().await
    }

    /// Delete a farm outright; clears local identity when it targets the
    /// bound farm
    pub async fn delete_farm(&self, farm_id: &str) -> Result<()> {
        self.farms.delete_farm(farm_id).await?;
        if self.current_farm_id().await.as_deref() == Some(farm_id) {
            self.clear_farm_state().await?;
        }
        tracing::info!(farm_id, "farm deleted");
        Ok(())
    }

    /// Re-fetch the member list for the bound farm
    pub async fn refresh_members(&self) -> Result<()> {
        let Some(farm_id) = self.current_farm_id().await else {
            return Ok(());
        };
        let members = self.farms.list_members(&farm_id).await?;
        self.state.lock().await.members = members;
        Ok(())
    }

    /// Persist a new display name and push it to our membership row
    /// best-effort
    pub async fn save_user_name(&self, name: &str) -> Result<()> {
        let name = require_value(name, "user name")?;
        let (farm, device_id) = {
            let mut state = self.state.lock().await;
            state.user_name = name.clone();
            (state.farm.clone(), state.device_id.clone())
        };
        self.storage.set(keys::USER_NAME, &name).await?;

        if let Some(farm) = farm {
            let update = NewMember {
                farm_id: farm.id,
                device_id,
                user_name: name,
                is_admin: farm.is_admin,
            };
            if let Err(error) = self.farms.upsert_member(&update).await {
                tracing::debug!(%error, "could not update user name remotely");
            }
        }
        Ok(())
    }

    // --- sync ---

    /// Run one sync cycle: drain tombstones, upload, pull, merge, commit
    ///
    /// Returns without doing anything when no farm is bound or when another
    /// cycle is already in flight (triggers are dropped, not queued; the
    /// periodic timer catches up). A failed cycle records its error for
    /// display and leaves whatever completed in place.
    pub async fn sync_now(&self) -> Result<SyncOutcome> {
        let Some(farm_id) = self.current_farm_id().await else {
            return Ok(SyncOutcome::NotConnected);
        };
        if self
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("sync already in flight, dropping trigger");
            return Ok(SyncOutcome::AlreadyInFlight);
        }

        // Captured before upload: a record mutated while this cycle runs
        // stamps a later time and is picked up by the next cycle
        let cycle_started = Utc::now();
        let result = self.run_cycle(&farm_id).await;
        self.syncing.store(false, Ordering::SeqCst);

        match result {
            Ok(()) => {
                // Leaving the farm mid-sync abandons the commit; don't stamp
                // sync state into the cleared identity
                if self.current_farm_id().await.as_deref() == Some(farm_id.as_str()) {
                    self.advance_watermark(cycle_started).await;
                    self.record_successful_sync().await;
                }
                tracing::debug!(%farm_id, "sync completed");
                Ok(SyncOutcome::Completed)
            }
            Err(error) => {
                tracing::warn!(%farm_id, %error, "sync failed");
                self.state.lock().await.last_error = Some(error.to_string());
                Err(error)
            }
        }
    }

    async fn run_cycle(&self, farm_id: &str) -> Result<()> {
        let drained = self.drain_tombstones(farm_id).await?;
        self.upload_changed(farm_id).await?;
        self.pull_and_merge(farm_id, &drained).await?;
        Ok(())
    }

    /// Propagate queued deletions to the remote
    ///
    /// All-or-nothing: any individual failure leaves the whole log in place
    /// for a full retry next cycle, so no pending deletion is silently
    /// forgotten. Returns the drained ids so the merge can keep priority
    /// over any stale remote copy still visible at pull time.
    async fn drain_tombstones(&self, farm_id: &str) -> Result<HashSet<RecordId>> {
        let pending = self.store.pending_deletes().await;
        if pending.is_empty() {
            return Ok(HashSet::new());
        }
        for id in &pending {
            self.remote.delete_row(*id, farm_id).await?;
        }
        self.store.clear_pending_deletes().await;
        tracing::debug!(count = pending.len(), "drained pending deletions");
        Ok(pending.into_iter().collect())
    }

    /// Push the full local snapshot; used when first contacting a farm
    async fn upload_all(&self, farm_id: &str) -> Result<()> {
        let snapshot = self.store.snapshot().await;
        self.upload_rows(&snapshot, farm_id).await
    }

    /// Push the rows this device owns changes for: everything modified at or
    /// after the watermark, or the whole snapshot when no cycle has
    /// succeeded yet. Uploads overwrite remote content unconditionally; a
    /// row this device has not touched since the last cycle is left for the
    /// pull-merge to resolve, so a newer copy from another device survives.
    async fn upload_changed(&self, farm_id: &str) -> Result<()> {
        let watermark = self.state.lock().await.upload_watermark;
        let mut snapshot = self.store.snapshot().await;
        if let Some(watermark) = watermark {
            snapshot.entries.retain(|entry| entry.updated_at >= watermark);
            snapshot.fields.retain(|field| field.updated_at >= watermark);
            snapshot.inventory.retain(|item| item.updated_at >= watermark);
            snapshot.usage.retain(|usage| usage.used_at >= watermark);
        }
        self.upload_rows(&snapshot, farm_id).await
    }

    async fn upload_rows(&self, snapshot: &crate::store::Snapshot, farm_id: &str) -> Result<()> {
        let rows = rows_for_upload(snapshot, farm_id)?;
        if rows.is_empty() {
            return Ok(());
        }
        for batch in rows.chunks(UPLOAD_BATCH_SIZE) {
            self.remote.upsert_rows(batch).await?;
        }
        tracing::debug!(count = rows.len(), farm_id, "uploaded local records");
        Ok(())
    }

    async fn advance_watermark(&self, to: DateTime<Utc>) {
        self.state.lock().await.upload_watermark = Some(to);
        if let Err(error) = self.storage.set(keys::SYNC_WATERMARK, &to.to_rfc3339()).await {
            tracing::warn!(%error, "failed to persist sync watermark");
        }
    }

    /// Pull the farm's rows, merge them into local state, and commit
    ///
    /// Deletion wins over merge: rows whose id was tombstoned before this
    /// cycle (`drained`) or while it was running are dropped before merging.
    /// The commit is abandoned if the bound farm changed mid-flight.
    async fn pull_and_merge(&self, farm_id: &str, drained: &HashSet<RecordId>) -> Result<()> {
        let rows = self.remote.select_all(farm_id).await?;

        let mut tombstones = drained.clone();
        tombstones.extend(self.store.pending_deletes().await);
        let rows: Vec<_> = rows
            .into_iter()
            .filter(|row| !tombstones.contains(&row.id))
            .collect();

        let pulled = partition_rows(rows);
        let snapshot = self.store.snapshot().await;
        let entries = merge_by_timestamp(snapshot.entries, pulled.entries);
        let fields = merge_by_timestamp(snapshot.fields, pulled.fields);
        let inventory = merge_by_timestamp(snapshot.inventory, pulled.inventory);
        let usage = merge_usage(snapshot.usage, pulled.usage);

        if self.current_farm_id().await.as_deref() != Some(farm_id) {
            tracing::warn!(farm_id, "farm changed mid-sync, abandoning commit");
            return Ok(());
        }
        self.store
            .replace_all(entries, fields, inventory, usage)
            .await;
        Ok(())
    }

    // --- admin recovery ---

    /// Remote bulk-delete of all inventory and usage rows, then clear both
    /// locally; entries and fields are untouched
    pub async fn force_delete_all_inventory(&self) -> Result<()> {
        let Some(farm_id) = self.current_farm_id().await else {
            return Ok(());
        };
        self.remote
            .delete_by_kind(&farm_id, DataKind::Inventory)
            .await?;
        self.remote
            .delete_by_kind(&farm_id, DataKind::InventoryUsage)
            .await?;

        let snapshot = self.store.snapshot().await;
        self.store
            .replace_all(snapshot.entries, snapshot.fields, vec![], vec![])
            .await;
        tracing::info!(%farm_id, "all inventory force deleted");
        Ok(())
    }

    /// Drop all local state and rebuild it from the remote, skipping merge;
    /// the remote is the sole source of truth. Recovery path for suspected
    /// local corruption.
    pub async fn purge_local_and_resync(&self) -> Result<()> {
        let Some(farm_id) = self.current_farm_id().await else {
            return Ok(());
        };
        self.store.replace_all(vec![], vec![], vec![], vec![]).await;
        self.store.clear_pending_deletes().await;

        let pull_started = Utc::now();
        let rows = self.remote.select_all(&farm_id).await?;
        let pulled = partition_rows(rows);
        self.store
            .replace_all(pulled.entries, pulled.fields, pulled.inventory, pulled.usage)
            .await;

        self.advance_watermark(pull_started).await;
        self.record_successful_sync().await;
        tracing::info!(%farm_id, "purged local state and resynced");
        Ok(())
    }

    // --- internals ---

    async fn bind_farm(&self, link: FarmLink, user_name: String) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            state.farm = Some(link.clone());
            state.user_name = user_name.clone();
            state.last_error = None;
        }
        self.storage.set(keys::FARM_ID, &link.id).await?;
        self.storage.set(keys::FARM_NAME, &link.name).await?;
        self.storage
            .set(keys::IS_ADMIN, if link.is_admin { "true" } else { "false" })
            .await?;
        self.storage.set(keys::USER_NAME, &user_name).await?;
        Ok(())
    }

    async fn clear_farm_state(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            state.farm = None;
            state.members.clear();
            state.last_sync_at = None;
            state.last_error = None;
            state.upload_watermark = None;
        }
        self.storage.remove(keys::FARM_ID).await?;
        self.storage.remove(keys::FARM_NAME).await?;
        self.storage.remove(keys::IS_ADMIN).await?;
        self.storage.remove(keys::LAST_SYNC).await?;
        self.storage.remove(keys::SYNC_WATERMARK).await?;
        Ok(())
    }

    async fn record_successful_sync(&self) {
        let now = Utc::now();
        {
            let mut state = self.state.lock().await;
            state.last_sync_at = Some(now);
            state.last_error = None;
        }
        if let Err(error) = self.storage.set(keys::LAST_SYNC, &now.to_rfc3339()).await {
            tracing::warn!(%error, "failed to persist last-sync time");
        }
    }
}

fn require_value(raw: &str, what: &str) -> Result<String> {
    normalize_text_option(Some(raw.to_string()))
        .ok_or_else(|| Error::InvalidInput(format!("{what} must not be empty")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use crate::storage::MemoryStorage;

    async fn setup() -> (SyncEngine, Arc<MemoryRemote>, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let remote = Arc::new(MemoryRemote::new());
        let store = LocalStore::open(storage.clone()).await.unwrap();
        let engine = SyncEngine::new(store, remote.clone(), remote.clone(), storage.clone());
        engine.load().await.unwrap();
        (engine, remote, storage)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn load_generates_device_id_once() {
        let (engine, _remote, storage) = setup().await;
        let device_id = engine.device_id().await;
        assert!(device_id.starts_with("dev-"));

        engine.load().await.unwrap();
        assert_eq!(engine.device_id().await, device_id);
        assert_eq!(
            storage.get(keys::DEVICE_ID).await.unwrap().as_deref(),
            Some(device_id.as_str())
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_without_farm_is_a_noop() {
        let (engine, remote, _storage) = setup().await;
        assert_eq!(engine.sync_now().await.unwrap(), SyncOutcome::NotConnected);
        assert_eq!(remote.select_calls(), 0);
        assert_eq!(engine.status().await.state, SyncState::Disconnected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_farm_rejects_duplicate_id() {
        let (engine, remote, _storage) = setup().await;
        engine
            .create_farm("smith-farm", "Smith Farm", "Sam", None)
            .await
            .unwrap();

        // A second device against the same backend
        let other_storage = Arc::new(MemoryStorage::new());
        let other_store = LocalStore::open(other_storage.clone()).await.unwrap();
        let other = SyncEngine::new(
            other_store,
            remote.clone(),
            remote.clone(),
            other_storage,
        );
        other.load().await.unwrap();

        let error = other
            .create_farm("smith-farm", "Other", "Pat", None)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::FarmAlreadyExists(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn status_reflects_error_until_next_success() {
        let (engine, remote, _storage) = setup().await;
        engine
            .create_farm("smith-farm", "Smith Farm", "Sam", None)
            .await
            .unwrap();

        remote.set_failing(true);
        assert!(engine.sync_now().await.is_err());
        let status = engine.status().await;
        assert_eq!(status.state, SyncState::Error);
        assert!(status.last_error.is_some());

        remote.set_failing(false);
        assert_eq!(engine.sync_now().await.unwrap(), SyncOutcome::Completed);
        let status = engine.status().await;
        assert_eq!(status.state, SyncState::Idle);
        assert_eq!(status.last_error, None);
        assert!(status.last_sync_at.is_some());
    }
}

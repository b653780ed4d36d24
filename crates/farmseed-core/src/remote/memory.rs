//! In-memory remote services for tests and offline demos
//!
//! `MemoryRemote` implements both remote traits over plain maps, counts
//! calls, and can simulate an outage so failure handling is testable.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Farm, FarmMember, NewMember, RecordId};

use super::{DataKind, DataRow, FarmDirectory, RemoteDataService};

#[derive(Debug, Default)]
struct RemoteState {
    rows: HashMap<(String, RecordId), DataRow>,
    farms: HashMap<String, Farm>,
    members: Vec<FarmMember>,
}

/// In-memory stand-in for the remote backend
#[derive(Debug, Default)]
pub struct MemoryRemote {
    state: Mutex<RemoteState>,
    failing: AtomicBool,
    upsert_calls: AtomicUsize,
    select_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail until reset
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Remote("simulated remote outage".to_string()));
        }
        Ok(())
    }

    /// Number of upsert batches received
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Number of full-snapshot pulls served
    pub fn select_calls(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }

    /// Number of row/bulk delete calls received
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Insert a row directly, as if another device had synced it
    pub fn seed_row(&self, row: DataRow) {
        let mut state = self.state.lock().expect("remote lock poisoned");
        state.rows.insert((row.farm_id.clone(), row.id), row);
    }

    /// Current rows for a farm, ordered by id for deterministic assertions
    pub fn rows_for(&self, farm_id: &str) -> Vec<DataRow> {
        let state = self.state.lock().expect("remote lock poisoned");
        let mut rows: Vec<DataRow> = state
            .rows
            .values()
            .filter(|row| row.farm_id == farm_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.id.as_str());
        rows
    }
}

#[async_trait]
impl RemoteDataService for MemoryRemote {
    async fn upsert_rows(&self, rows: &[DataRow]) -> Result<()> {
        self.check_available()?;
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().expect("remote lock poisoned");
        for row in rows {
            state
                .rows
                .insert((row.farm_id.clone(), row.id), row.clone());
        }
        Ok(())
    }

    async fn select_all(&self, farm_id: &str) -> Result<Vec<DataRow>> {
        self.check_available()?;
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows_for(farm_id))
    }

    async fn delete_row(&self, id: RecordId, farm_id: &str) -> Result<()> {
        self.check_available()?;
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().expect("remote lock poisoned");
        state.rows.remove(&(farm_id.to_string(), id));
        Ok(())
    }

    async fn delete_by_kind(&self, farm_id: &str, kind: DataKind) -> Result<()> {
        self.check_available()?;
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().expect("remote lock poisoned");
        state
            .rows
            .retain(|(farm, _), row| !(farm == farm_id && row.data_type == kind));
        Ok(())
    }
}

#[async_trait]
impl FarmDirectory for MemoryRemote {
    async fn create_farm(&self, farm: &Farm) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.lock().expect("remote lock poisoned");
        if state.farms.contains_key(&farm.id) {
            return Err(Error::FarmAlreadyExists(farm.id.clone()));
        }
        state.farms.insert(farm.id.clone(), farm.clone());
        Ok(())
    }

    async fn get_farm(&self, id: &str) -> Result<Option<Farm>> {
        self.check_available()?;
        let state = self.state.lock().expect("remote lock poisoned");
        Ok(state.farms.get(id).cloned())
    }

    async fn upsert_member(&self, member: &NewMember) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.lock().expect("remote lock poisoned");
        if let Some(existing) = state
            .members
            .iter_mut()
            .find(|m| m.farm_id == member.farm_id && m.device_id == member.device_id)
        {
            existing.user_name = member.user_name.clone();
            existing.is_admin = member.is_admin;
            return Ok(());
        }
        state.members.push(FarmMember {
            id: Uuid::now_v7().to_string(),
            farm_id: member.farm_id.clone(),
            device_id: member.device_id.clone(),
            user_name: member.user_name.clone(),
            is_admin: member.is_admin,
            joined_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_members(&self, farm_id: &str) -> Result<Vec<FarmMember>> {
        self.check_available()?;
        let state = self.state.lock().expect("remote lock poisoned");
        let mut members: Vec<FarmMember> = state
            .members
            .iter()
            .filter(|m| m.farm_id == farm_id)
            .cloned()
            .collect();
        members.sort_by_key(|m| m.joined_at);
        Ok(members)
    }

    async fn delete_member(&self, member_id: &str) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.lock().expect("remote lock poisoned");
        state.members.retain(|m| m.id != member_id);
        Ok(())
    }

    async fn delete_farm(&self, farm_id: &str) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.lock().expect("remote lock poisoned");
        state.farms.remove(farm_id);
        state.members.retain(|m| m.farm_id != farm_id);
        state.rows.retain(|(farm, _), _| farm != farm_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(farm_id: &str, kind: DataKind) -> DataRow {
        DataRow {
            id: RecordId::new(),
            farm_id: farm_id.to_string(),
            data_type: kind,
            data: json!({}),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_overwrites_by_composite_key() {
        let remote = MemoryRemote::new();
        let mut r = row("farm-a", DataKind::Entry);
        remote.upsert_rows(std::slice::from_ref(&r)).await.unwrap();

        r.data = json!({"notes": "updated"});
        remote.upsert_rows(std::slice::from_ref(&r)).await.unwrap();

        let rows = remote.select_all("farm-a").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].data, json!({"notes": "updated"}));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn farms_are_isolated() {
        let remote = MemoryRemote::new();
        remote
            .upsert_rows(&[row("farm-a", DataKind::Entry)])
            .await
            .unwrap();
        remote
            .upsert_rows(&[row("farm-b", DataKind::Entry)])
            .await
            .unwrap();

        assert_eq!(remote.select_all("farm-a").await.unwrap().len(), 1);
        assert_eq!(remote.select_all("farm-b").await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_by_kind_only_touches_that_kind() {
        let remote = MemoryRemote::new();
        remote
            .upsert_rows(&[
                row("farm-a", DataKind::Inventory),
                row("farm-a", DataKind::InventoryUsage),
                row("farm-a", DataKind::Entry),
            ])
            .await
            .unwrap();

        remote
            .delete_by_kind("farm-a", DataKind::Inventory)
            .await
            .unwrap();
        remote
            .delete_by_kind("farm-a", DataKind::InventoryUsage)
            .await
            .unwrap();

        let rows = remote.select_all("farm-a").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].data_type, DataKind::Entry);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn member_upsert_is_keyed_by_device() {
        let remote = MemoryRemote::new();
        let member = NewMember {
            farm_id: "farm-a".to_string(),
            device_id: "dev-1".to_string(),
            user_name: "Sam".to_string(),
            is_admin: true,
        };
        remote.upsert_member(&member).await.unwrap();
        remote
            .upsert_member(&NewMember {
                user_name: "Samantha".to_string(),
                ..member
            })
            .await
            .unwrap();

        let members = remote.list_members("farm-a").await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_name, "Samantha");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn simulated_outage_fails_every_call() {
        let remote = MemoryRemote::new();
        remote.set_failing(true);
        assert!(remote.select_all("farm-a").await.is_err());
        assert!(remote.get_farm("farm-a").await.is_err());

        remote.set_failing(false);
        assert!(remote.select_all("farm-a").await.is_ok());
    }
}

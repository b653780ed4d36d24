//! Shared wiring for CLI commands: opening the store and engine, id parsing.

use std::path::Path;
use std::sync::Arc;

use farmseed_core::models::RecordId;
use farmseed_core::remote::PostgrestRemote;
use farmseed_core::storage::FileStorage;
use farmseed_core::{LocalStore, SyncEngine};

use crate::config::resolve_remote_config;
use crate::error::CliError;

/// Open the local store over file storage in the data directory
pub async fn open_store(data_dir: &Path) -> Result<LocalStore, CliError> {
    let storage = Arc::new(FileStorage::open(data_dir)?);
    Ok(LocalStore::open(storage).await?)
}

/// Open a loaded sync engine; requires a configured remote
pub async fn open_engine(data_dir: &Path) -> Result<SyncEngine, CliError> {
    let Some(remote_config) = resolve_remote_config(data_dir)? else {
        return Err(CliError::RemoteNotConfigured);
    };
    tracing::debug!(data_dir = %data_dir.display(), "opening sync engine");
    let storage = Arc::new(FileStorage::open(data_dir)?);
    let store = LocalStore::open(storage.clone()).await?;
    let remote = Arc::new(PostgrestRemote::new(remote_config)?);
    let engine = SyncEngine::new(store, remote.clone(), remote, storage);
    engine.load().await?;
    Ok(engine)
}

pub fn parse_record_id(raw: &str) -> Result<RecordId, CliError> {
    raw.trim()
        .parse()
        .map_err(|_| CliError::InvalidRecordId(raw.to_string()))
}

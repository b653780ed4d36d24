//! farmseed-core - Core library for Farmseed
//!
//! This crate contains the shared models, the durable local store, and the
//! offline-first sync engine used by all Farmseed interfaces.

pub mod config;
pub mod error;
pub mod models;
pub mod remote;
pub mod storage;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::RecordId;
pub use store::LocalStore;
pub use sync::SyncEngine;

//! # Storage Module
//!
//! Persistence for feedings, toilet events and diary entries.
//!
//! Two interchangeable adapters implement [`EntryStorage`]:
//!
//! - **local**: a SQLite key-value table holding one JSON array per
//!   collection, private to this device
//! - **remote**: a shared PostgREST endpoint, one table per collection
//!
//! The adapter is chosen once at startup from the configuration and never
//! switched at runtime.

pub mod dedupe;
pub mod error;
pub mod local;
pub mod record;
pub mod remote;
pub mod traits;

use anyhow::Result;
use log::info;
use shared::StorageMode;
use std::sync::Arc;

pub use error::StorageError;
pub use local::{LocalStore, MigrationReport};
pub use record::StoredRecord;
pub use remote::RemoteStore;
pub use traits::{Collection, Entry, EntryStorage, EntryWhen, StoreSet};

use crate::backend::config::AppConfig;
use crate::backend::domain::clock::Clock;

/// Open the adapter selected by the configuration
pub async fn open_stores(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<StoreSet> {
    let zone = config.zone()?;
    let stores = match config.storage_mode() {
        StorageMode::Remote => {
            let store = RemoteStore::new(
                config.remote.url.as_deref().unwrap_or_default(),
                config.remote.anon_key.as_deref().unwrap_or_default(),
                zone,
            );
            let info = store.info();
            StoreSet::from_adapter(Arc::new(store), info)
        }
        StorageMode::Local => {
            let store = LocalStore::open(config.storage.clone(), zone, clock).await?;
            let info = store.info();
            StoreSet::from_adapter(Arc::new(store), info)
        }
    };
    info!("Storage: {}", stores.info.description);
    Ok(stores)
}

pub mod disk;
pub mod memory;

use crate::core::config::{AppConfig, StorageKind};
use crate::core::store::KeyValueStore;
use anyhow::{Context, Result};
use disk::DiskStore;
use memory::MemoryStore;
use std::sync::Arc;

/// Opens the settings store selected by the configuration.
pub fn open_store(config: &AppConfig) -> Result<Arc<dyn KeyValueStore>> {
    match config.storage {
        StorageKind::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageKind::Disk => {
            let path = config.data_path()?.join("store");
            let store = DiskStore::open(&path)
                .with_context(|| format!("Failed to open settings store: {}", path.display()))?;
            Ok(Arc::new(store))
        }
    }
}

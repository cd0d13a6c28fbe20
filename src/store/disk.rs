use crate::core::error::{RateError, Result};
use crate::core::store::KeyValueStore;
use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::debug;

const PARTITION: &str = "exchangerate";
const SETTINGS_KEY: &str = "settings";

/// Settings store persisted in a fjall keyspace on disk.
pub struct DiskStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl DiskStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(path)?;

        let keyspace = Config::new(path).open()?;
        let partition = keyspace.open_partition(PARTITION, PartitionCreateOptions::default())?;
        debug!("Opened settings store at {}", path.display());
        Ok(Self {
            keyspace,
            partition,
        })
    }
}

#[async_trait]
impl KeyValueStore for DiskStore {
    async fn load(&self) -> Result<Option<Vec<u8>>> {
        let value = self.partition.get(SETTINGS_KEY).map_err(RateError::store)?;
        debug!(present = value.is_some(), "DiskStore LOAD");
        Ok(value.map(|slice| slice.to_vec()))
    }

    async fn save(&self, blob: &[u8]) -> Result<()> {
        self.partition
            .insert(SETTINGS_KEY, blob)
            .map_err(RateError::store)?;
        self.keyspace
            .persist(PersistMode::SyncAll)
            .map_err(RateError::store)?;
        debug!(bytes = blob.len(), "DiskStore SAVE");
        Ok(())
    }
}

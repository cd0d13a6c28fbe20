use crate::core::error::Result;
use crate::core::store::KeyValueStore;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory settings store. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    blob: Mutex<Option<Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `blob`.
    pub fn with_blob(blob: Vec<u8>) -> Self {
        Self {
            blob: Mutex::new(Some(blob)),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn load(&self) -> Result<Option<Vec<u8>>> {
        let blob = self.blob.lock().await;
        debug!(present = blob.is_some(), "MemoryStore LOAD");
        Ok(blob.clone())
    }

    async fn save(&self, blob: &[u8]) -> Result<()> {
        let mut stored = self.blob.lock().await;
        debug!(bytes = blob.len(), "MemoryStore SAVE");
        *stored = Some(blob.to_vec());
        Ok(())
    }
}

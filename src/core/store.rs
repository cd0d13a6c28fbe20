//! Persistence abstraction for the settings blob.

use super::error::Result;
use async_trait::async_trait;

/// Load/save of a single opaque blob owned by the host.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns `None` when nothing has been saved yet.
    async fn load(&self) -> Result<Option<Vec<u8>>>;

    /// Replaces the stored blob.
    async fn save(&self, blob: &[u8]) -> Result<()>;
}

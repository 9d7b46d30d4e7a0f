pub mod disk;
pub mod memory;

use crate::core::store::PersistentStore;
use disk::DiskStore;
use fjall::{Keyspace, PartitionCreateOptions};
use memory::MemoryStore;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Opens one store per session under `data_dir`.
///
/// Falls back to memory-only stores when the keyspace can't be opened, so a
/// broken data directory only costs the cache.
pub struct Stores {
    keyspace: Option<Keyspace>,
    pub catalog: Arc<dyn PersistentStore>,
    pub rates: Arc<dyn PersistentStore>,
}

impl Stores {
    pub fn open(data_dir: &Path) -> Self {
        let cache_dir = data_dir.join("cache");
        match Self::open_disk(&cache_dir) {
            Ok(stores) => stores,
            Err(e) => {
                warn!(
                    "Failed to open cache at {}: {}. Using memory only",
                    cache_dir.display(),
                    e
                );
                Self::in_memory()
            }
        }
    }

    pub fn in_memory() -> Self {
        Self {
            keyspace: None,
            catalog: Arc::new(MemoryStore::new()),
            rates: Arc::new(MemoryStore::new()),
        }
    }

    fn open_disk(cache_dir: &Path) -> fjall::Result<Self> {
        let keyspace = fjall::Config::new(cache_dir).open()?;
        let catalog = keyspace.open_partition("catalog", PartitionCreateOptions::default())?;
        let rates = keyspace.open_partition("rates", PartitionCreateOptions::default())?;
        Ok(Self {
            catalog: Arc::new(DiskStore::new(catalog)),
            rates: Arc::new(DiskStore::new(rates)),
            keyspace: Some(keyspace),
        })
    }

    /// Flushes pending writes to disk; a no-op for memory stores.
    pub fn persist(&self) {
        if let Some(keyspace) = &self.keyspace {
            if let Err(e) = keyspace.persist(fjall::PersistMode::SyncAll) {
                warn!("Failed to persist cache: {}", e);
            }
        }
    }
}

use crate::core::store::PersistentStore;
use async_trait::async_trait;
use fjall::PartitionHandle;
use tracing::{debug, warn};

/// Store backed by a single fjall partition
pub struct DiskStore {
    partition: PartitionHandle,
}

impl DiskStore {
    pub fn new(partition: PartitionHandle) -> Self {
        Self { partition }
    }
}

#[async_trait]
impl PersistentStore for DiskStore {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self.partition.get(key) {
            Ok(Some(value)) => {
                debug!("Store HIT for key: {}", key);
                Some(value.to_vec())
            }
            Ok(None) => {
                debug!("Store MISS for key: {}", key);
                None
            }
            Err(e) => {
                warn!("DiskStore get error for key {}: {}", key, e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) {
        match self.partition.insert(key, value) {
            Ok(()) => debug!("Store SET for key: {}", key),
            Err(e) => warn!("DiskStore set error for key {}: {}", key, e),
        }
    }

    async fn clear(&self, key: &str) {
        match self.partition.remove(key) {
            Ok(()) => debug!("Store CLEAR for key: {}", key),
            Err(e) => warn!("DiskStore clear error for key {}: {}", key, e),
        }
    }
}

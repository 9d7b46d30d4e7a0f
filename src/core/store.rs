//! Durable key/value storage abstraction

use async_trait::async_trait;

/// Byte-oriented storage the sessions persist their snapshots and settings in.
///
/// Implementations swallow their own I/O failures: a failed read is reported
/// as a miss and a failed write is logged and dropped.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn set(&self, key: &str, value: Vec<u8>);
    async fn clear(&self, key: &str);
}

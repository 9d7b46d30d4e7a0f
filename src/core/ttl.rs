use super::currency::Timestamped;
use super::store::PersistentStore;
use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, de::DeserializeOwned};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default age, in minutes, after which cached provider data is refetched.
pub const DEFAULT_TTL_MINUTES: i64 = 30;

/// Returns true when a value stamped at `timestamp` has outlived `ttl`.
///
/// Only timestamps strictly in the past can expire; a timestamp at or after
/// `now` (clock skew) keeps the value valid.
pub fn is_expired(timestamp: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    timestamp < now && now.signed_duration_since(timestamp) > ttl
}

/// A single persisted value guarded by a time-to-live.
pub struct TtlCache<T> {
    store: Arc<dyn PersistentStore>,
    key: String,
    ttl: Duration,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TtlCache<T>
where
    T: Timestamped + Serialize + DeserializeOwned,
{
    pub fn new(store: Arc<dyn PersistentStore>, key: &str, ttl: Duration) -> Self {
        Self {
            store,
            key: key.to_string(),
            ttl,
            _marker: PhantomData,
        }
    }

    /// Persisted value if it decodes, is usable and is still fresh.
    pub async fn current_valid(&self) -> Option<T> {
        self.current_valid_at(Utc::now()).await
    }

    pub async fn current_valid_at(&self, now: DateTime<Utc>) -> Option<T> {
        let Some(bytes) = self.store.get(&self.key).await else {
            debug!("Cache MISS for key: {}", self.key);
            return None;
        };

        let value: T = match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                debug!("Cache entry for key {} failed to decode: {}", self.key, e);
                return None;
            }
        };

        if !value.is_usable() {
            debug!("Cache entry unusable for key: {}", self.key);
            return None;
        }
        if is_expired(value.timestamp(), now, self.ttl) {
            debug!("Cache entry expired for key: {}", self.key);
            return None;
        }

        debug!("Cache HIT for key: {}", self.key);
        Some(value)
    }

    /// Replaces whatever is persisted under this cache's key.
    pub async fn store(&self, value: &T) {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.store.set(&self.key, bytes).await;
                debug!("Cache PUT for key: {}", self.key);
            }
            Err(e) => warn!("Failed to encode cache entry for key {}: {}", self.key, e),
        }
    }

    pub async fn clear(&self) {
        self.store.clear(&self.key).await;
        debug!("Cache CLEAR for key: {}", self.key);
    }
}

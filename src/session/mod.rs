//! Stateful sessions that presentation code drives and observes.

pub mod catalog;
pub mod rates;

use crate::core::currency::Currency;
use crate::core::store::PersistentStore;
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

pub use catalog::{CatalogEntry, CatalogSession, CatalogState};
pub use rates::{RatesSession, RatesState};

/// Receives the currency picked in a [`CatalogSession`].
#[async_trait]
pub trait CurrencySelectionOutput: Send + Sync {
    async fn on_currency_selected(&self, currency: &Currency);
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

async fn load_json<T: DeserializeOwned>(store: &dyn PersistentStore, key: &str) -> Option<T> {
    let bytes = store.get(key).await?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Stored value for key {} failed to decode: {}", key, e);
            None
        }
    }
}

async fn save_json<T: Serialize>(store: &dyn PersistentStore, key: &str, value: &T) {
    match serde_json::to_vec(value) {
        Ok(bytes) => store.set(key, bytes).await,
        Err(e) => warn!("Failed to encode value for key {}: {}", key, e),
    }
}

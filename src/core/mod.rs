//! Caching and conversion engine

pub mod config;
pub mod conversion;
pub mod coordinator;
pub mod currency;
pub mod error;
pub mod log;
pub mod provider;
pub mod store;
pub mod ttl;

// Re-export main types for cleaner imports
pub use coordinator::RequestCoordinator;
pub use currency::{
    ConversionItem, ConversionTable, Currency, CurrencyCatalog, RateSnapshot, Timestamped,
};
pub use error::{Error, GENERIC_FAILURE_MESSAGE};
pub use provider::{CatalogResponse, ProviderClient, RatesResponse};
pub use store::PersistentStore;
pub use ttl::TtlCache;

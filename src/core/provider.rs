//! Exchange rate provider abstraction

use super::currency::{Currency, CurrencyCatalog, RateSnapshot};
use super::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Currency list as returned by the provider, keyed by ISO code.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogResponse {
    pub currencies: HashMap<String, String>,
}

/// Live quotes as returned by the provider, keyed by target ISO code.
#[derive(Debug, Clone, PartialEq)]
pub struct RatesResponse {
    pub source: String,
    pub quotes: HashMap<String, f64>,
    pub terms: Option<String>,
    pub privacy: Option<String>,
}

#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn fetch_catalog(&self) -> Result<CatalogResponse>;
    async fn fetch_rates(&self) -> Result<RatesResponse>;
}

impl CatalogResponse {
    pub fn into_catalog(self, timestamp: DateTime<Utc>) -> CurrencyCatalog {
        CurrencyCatalog {
            timestamp,
            entries: self
                .currencies
                .into_iter()
                .map(|(code, name)| (Currency::new(code), name))
                .collect(),
        }
    }
}

impl RatesResponse {
    pub fn into_snapshot(self, timestamp: DateTime<Utc>) -> RateSnapshot {
        RateSnapshot {
            timestamp,
            source_currency: Currency::new(self.source),
            quotes: self
                .quotes
                .into_iter()
                .map(|(code, quote)| (Currency::new(code), quote))
                .collect(),
            terms: self.terms,
            privacy: self.privacy,
        }
    }
}

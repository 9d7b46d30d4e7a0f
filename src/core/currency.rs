//! Currency and exchange rate data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::error::Error;

/// A three letter ISO 4217 currency code.
///
/// Equality, ordering and hashing all go through the code, so a `Currency` can
/// key maps and be sorted directly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    pub fn new(code: impl Into<String>) -> Self {
        Currency(code.into())
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::new("USD")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Currency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Currency(code))
        } else {
            Err(Error::Generic(format!("Invalid currency code: {s}")))
        }
    }
}

/// Values persisted behind a TTL check carry the instant they were built at.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;

    /// Whether the value may be served from cache at all, regardless of age.
    fn is_usable(&self) -> bool {
        true
    }
}

/// Currencies supported by the provider with their display names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyCatalog {
    pub timestamp: DateTime<Utc>,
    pub entries: HashMap<Currency, String>,
}

impl CurrencyCatalog {
    pub fn name_of(&self, currency: &Currency) -> Option<&str> {
        self.entries.get(currency).map(String::as_str)
    }
}

impl Timestamped for CurrencyCatalog {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Quotes from the provider, all relative to `source_currency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateSnapshot {
    pub timestamp: DateTime<Utc>,
    pub source_currency: Currency,
    pub quotes: HashMap<Currency, f64>,
    pub terms: Option<String>,
    pub privacy: Option<String>,
}

impl Timestamped for RateSnapshot {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    // An empty snapshot only ever signals a failed conversion
    fn is_usable(&self) -> bool {
        !self.quotes.is_empty()
    }
}

/// One row of a conversion table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionItem {
    pub id: Uuid,
    pub amount: f64,
    pub currency: Currency,
    pub quote: f64,
}

/// `amount` of `currency` expressed in every quoted currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionTable {
    pub amount: f64,
    pub currency: Currency,
    pub items: Vec<ConversionItem>,
}

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::core::error::{Error, Result};
use crate::core::provider::{CatalogResponse, ProviderClient, RatesResponse};

/// Fields every currencylayer response carries, successful or not.
#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    terms: Option<String>,
    privacy: Option<String>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: i64,
    info: String,
}

#[derive(Debug, Deserialize)]
struct ListBody {
    currencies: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct LiveBody {
    source: String,
    quotes: HashMap<String, f64>,
}

/// Quote keys are the source code followed by the target code, e.g. `USDEUR`.
fn target_code(pair: &str) -> Option<&str> {
    pair.get(pair.len().checked_sub(3)?..)
}

/// Client for the currencylayer.com `list` and `live` endpoints
pub struct CurrencylayerProvider {
    base_url: String,
    access_key: String,
    timeout: Duration,
}

impl CurrencylayerProvider {
    pub fn new(base_url: &str, access_key: &str, timeout: Duration) -> Self {
        CurrencylayerProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_key: access_key.to_string(),
            timeout,
        }
    }

    async fn request<B: DeserializeOwned>(&self, endpoint: &str) -> Result<(Envelope, B)> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, endpoint))
            .map_err(|e| Error::Generic(format!("Invalid provider URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("access_key", &self.access_key);
        debug!("Requesting {} from {}", endpoint, self.base_url);

        let client = reqwest::Client::builder()
            .user_agent("xrates/1.0")
            .timeout(self.timeout)
            .build()?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Generic(format!("Request error: {e} for endpoint: {endpoint}")))?;

        if !response.status().is_success() {
            return Err(Error::Generic(format!(
                "HTTP error: {} for endpoint: {}",
                response.status(),
                endpoint
            )));
        }

        let text = response.text().await?;
        let envelope: Envelope = serde_json::from_str(&text).map_err(|e| {
            Error::Generic(format!("Failed to parse JSON response for {endpoint}: {e}"))
        })?;

        if !envelope.success {
            return Err(match envelope.error {
                Some(ErrorBody { code, info }) => Error::Provider { code, info },
                None => Error::Generic(format!("Unsuccessful response for {endpoint}")),
            });
        }

        let body: B = serde_json::from_str(&text).map_err(|e| {
            Error::Generic(format!("Failed to parse JSON response for {endpoint}: {e}"))
        })?;
        Ok((envelope, body))
    }
}

#[async_trait]
impl ProviderClient for CurrencylayerProvider {
    #[instrument(name = "CurrencylayerList", skip(self))]
    async fn fetch_catalog(&self) -> Result<CatalogResponse> {
        let (_, body) = self.request::<ListBody>("list").await?;
        debug!(currencies = body.currencies.len(), "Received currency list");
        Ok(CatalogResponse {
            currencies: body.currencies,
        })
    }

    #[instrument(name = "CurrencylayerLive", skip(self))]
    async fn fetch_rates(&self) -> Result<RatesResponse> {
        let (envelope, body) = self.request::<LiveBody>("live").await?;
        let quotes = body
            .quotes
            .into_iter()
            .filter_map(|(pair, quote)| target_code(&pair).map(|code| (code.to_string(), quote)))
            .collect::<HashMap<_, _>>();
        debug!(source = %body.source, quotes = quotes.len(), "Received live quotes");

        Ok(RatesResponse {
            source: body.source,
            quotes,
            terms: envelope.terms,
            privacy: envelope.privacy,
        })
    }
}

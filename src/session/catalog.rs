use super::{CurrencySelectionOutput, read, write};
use crate::core::coordinator::RequestCoordinator;
use crate::core::currency::{Currency, CurrencyCatalog};
use crate::core::error::Result;
use crate::core::provider::{CatalogResponse, ProviderClient};
use crate::core::store::PersistentStore;
use crate::core::ttl::TtlCache;
use chrono::{Duration, Utc};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tracing::{debug, info, warn};

const CATALOG_KEY: &str = "currencies";

/// A currency with its display name, when the catalog knows it.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub title: Option<String>,
    pub currency: Currency,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogState {
    Idle,
    Loading,
    Content {
        current: CatalogEntry,
        items: Vec<CatalogEntry>,
    },
    Error(String),
}

struct CatalogInner {
    cache: TtlCache<CurrencyCatalog>,
    selection: RwLock<Currency>,
    output: Option<Arc<dyn CurrencySelectionOutput>>,
    state: watch::Sender<CatalogState>,
}

impl CatalogInner {
    fn publish_content(&self, catalog: &CurrencyCatalog) {
        let mut items: Vec<CatalogEntry> = catalog
            .entries
            .iter()
            .map(|(currency, name)| CatalogEntry {
                title: Some(name.clone()),
                currency: currency.clone(),
            })
            .collect();
        items.sort_by(|a, b| {
            a.title
                .cmp(&b.title)
                .then_with(|| a.currency.cmp(&b.currency))
        });

        let selection = read(&self.selection).clone();
        let current = CatalogEntry {
            title: catalog.name_of(&selection).map(str::to_string),
            currency: selection,
        };
        debug!(currencies = items.len(), "Publishing catalog");
        self.state.send_replace(CatalogState::Content { current, items });
    }

    async fn complete(&self, result: Result<CatalogResponse>) {
        match result {
            Ok(response) => {
                let catalog = response.into_catalog(Utc::now());
                self.cache.store(&catalog).await;
                self.publish_content(&catalog);
            }
            Err(e) => {
                warn!(error = %e, "Currency catalog fetch failed");
                self.state.send_replace(CatalogState::Error(e.user_message()));
            }
        }
    }
}

/// Loads the provider's currency list and tracks which currency is selected.
pub struct CatalogSession {
    inner: Arc<CatalogInner>,
    provider: Arc<dyn ProviderClient>,
    coordinator: RequestCoordinator,
}

impl CatalogSession {
    pub fn new(
        store: Arc<dyn PersistentStore>,
        provider: Arc<dyn ProviderClient>,
        ttl: Duration,
        output: Option<Arc<dyn CurrencySelectionOutput>>,
    ) -> Self {
        let (state, _) = watch::channel(CatalogState::Idle);
        Self {
            inner: Arc::new(CatalogInner {
                cache: TtlCache::new(store, CATALOG_KEY, ttl),
                selection: RwLock::new(Currency::default()),
                output,
                state,
            }),
            provider,
            coordinator: RequestCoordinator::new("catalog"),
        }
    }

    /// Sets the currency marked as current, without refetching.
    pub fn configure(&self, currency: Currency) {
        *write(&self.inner.selection) = currency;
    }

    pub fn selection(&self) -> Currency {
        read(&self.inner.selection).clone()
    }

    pub fn state(&self) -> CatalogState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CatalogState> {
        self.inner.state.subscribe()
    }

    /// Publishes the cached catalog, or starts fetching a fresh one.
    pub async fn prepare(&self) {
        if let Some(catalog) = self.inner.cache.current_valid().await {
            self.coordinator.cancel().await;
            self.inner.publish_content(&catalog);
            return;
        }

        self.inner.state.send_replace(CatalogState::Loading);
        let provider = Arc::clone(&self.provider);
        let inner = Arc::clone(&self.inner);
        self.coordinator
            .trigger(
                async move { provider.fetch_catalog().await },
                move |result| async move { inner.complete(result).await },
            )
            .await;
    }

    /// Selects `currency` and tells the output about it.
    pub async fn set_selection(&self, currency: Currency) {
        info!(currency = %currency, "Currency selected");
        self.configure(currency.clone());

        let republished = match self.state() {
            CatalogState::Content { items, .. } => {
                let title = items
                    .iter()
                    .find(|entry| entry.currency == currency)
                    .and_then(|entry| entry.title.clone());
                let current = CatalogEntry {
                    title,
                    currency: currency.clone(),
                };
                Some(CatalogState::Content { current, items })
            }
            _ => None,
        };
        if let Some(state) = republished {
            self.inner.state.send_replace(state);
        }

        if let Some(output) = &self.inner.output {
            output.on_currency_selected(&currency).await;
        }
    }

    pub async fn cancel(&self) {
        self.coordinator.cancel().await;
    }
}

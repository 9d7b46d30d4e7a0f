use super::catalog::CatalogSession;
use super::{CurrencySelectionOutput, load_json, read, save_json, write};
use crate::core::conversion;
use crate::core::coordinator::RequestCoordinator;
use crate::core::currency::{ConversionTable, Currency, RateSnapshot};
use crate::core::error::Result;
use crate::core::provider::{ProviderClient, RatesResponse};
use crate::core::store::PersistentStore;
use crate::core::ttl::TtlCache;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

const RATES_KEY: &str = "rates";
const TABLE_KEY: &str = "exchange_rates";
const AMOUNT_KEY: &str = "amount";
const CURRENCY_KEY: &str = "currency";

pub const DEFAULT_TERMS_URL: &str = "https://currencylayer.com/terms";
pub const DEFAULT_PRIVACY_URL: &str = "https://currencylayer.com/privacy";

#[derive(Debug, Clone, PartialEq)]
pub enum RatesState {
    Empty,
    Loading,
    Content(ConversionTable),
    Error(String),
}

/// Keeps only the characters a number can be made of and parses the rest.
///
/// A comma is read as the decimal separator. Anything unparsable is zero.
pub fn parse_amount(text: &str) -> f64 {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '-' | '.' | ','))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    digits.parse().unwrap_or(0.0)
}

fn parse_url(candidate: Option<&str>) -> Option<Url> {
    candidate.and_then(|s| Url::parse(s).ok())
}

struct Settings {
    amount: f64,
    currency: Currency,
    terms: String,
    privacy: String,
}

struct RatesInner {
    store: Arc<dyn PersistentStore>,
    rates: TtlCache<RateSnapshot>,
    settings: RwLock<Settings>,
    state: watch::Sender<RatesState>,
}

impl RatesInner {
    async fn adopt_currency(&self, currency: &Currency) {
        write(&self.settings).currency = currency.clone();
        save_json(self.store.as_ref(), CURRENCY_KEY, currency).await;
    }

    async fn complete(&self, result: Result<RatesResponse>, amount: f64, currency: &Currency) {
        match result {
            Ok(response) => {
                let snapshot = response.into_snapshot(Utc::now());
                self.rates.store(&snapshot).await;
                self.apply_snapshot(&snapshot, amount, currency).await;
            }
            Err(e) => {
                warn!(error = %e, "Exchange rates fetch failed");
                self.state.send_replace(RatesState::Error(e.user_message()));
            }
        }
    }

    async fn apply_snapshot(&self, snapshot: &RateSnapshot, amount: f64, currency: &Currency) {
        {
            let mut settings = write(&self.settings);
            if let Some(terms) = parse_url(snapshot.terms.as_deref()) {
                settings.terms = terms.into();
            }
            if let Some(privacy) = parse_url(snapshot.privacy.as_deref()) {
                settings.privacy = privacy.into();
            }
        }

        match conversion::derive(snapshot, amount, currency) {
            Ok(table) => {
                save_json(self.store.as_ref(), TABLE_KEY, &table).await;
                debug!(items = table.items.len(), "Publishing conversion table");
                self.state.send_replace(RatesState::Content(table));
            }
            Err(e) => {
                warn!(error = %e, "Discarding snapshot that cannot be converted");
                self.rates.clear().await;
                self.store.clear(TABLE_KEY).await;
                self.state.send_replace(RatesState::Error(e.user_message()));
            }
        }
    }
}

/// Forwards selections made in the catalog session back into the rates session.
struct SelectionForwarder {
    inner: Arc<RatesInner>,
}

#[async_trait]
impl CurrencySelectionOutput for SelectionForwarder {
    async fn on_currency_selected(&self, currency: &Currency) {
        self.inner.adopt_currency(currency).await;
    }
}

/// Converts the persisted amount from the selected currency into every
/// currency the provider quotes.
pub struct RatesSession {
    inner: Arc<RatesInner>,
    catalog: CatalogSession,
    provider: Arc<dyn ProviderClient>,
    coordinator: RequestCoordinator,
}

impl RatesSession {
    /// Restores the persisted amount and currency and wires up the catalog
    /// session so its selections flow back here.
    pub async fn new(
        store: Arc<dyn PersistentStore>,
        catalog_store: Arc<dyn PersistentStore>,
        provider: Arc<dyn ProviderClient>,
        ttl: Duration,
    ) -> Self {
        let amount = load_json::<f64>(store.as_ref(), AMOUNT_KEY)
            .await
            .unwrap_or(0.0);
        let currency = load_json::<Currency>(store.as_ref(), CURRENCY_KEY)
            .await
            .unwrap_or_default();
        debug!(amount, currency = %currency, "Restored rates settings");

        let settings = Settings {
            amount,
            currency: currency.clone(),
            terms: DEFAULT_TERMS_URL.to_string(),
            privacy: DEFAULT_PRIVACY_URL.to_string(),
        };
        let (state, _) = watch::channel(RatesState::Empty);
        let inner = Arc::new(RatesInner {
            rates: TtlCache::new(store.clone(), RATES_KEY, ttl),
            store,
            settings: RwLock::new(settings),
            state,
        });

        let forwarder: Arc<dyn CurrencySelectionOutput> = Arc::new(SelectionForwarder {
            inner: Arc::clone(&inner),
        });
        let catalog = CatalogSession::new(catalog_store, Arc::clone(&provider), ttl, Some(forwarder));
        catalog.configure(currency);

        Self {
            inner,
            catalog,
            provider,
            coordinator: RequestCoordinator::new("rates"),
        }
    }

    pub fn catalog(&self) -> &CatalogSession {
        &self.catalog
    }

    pub fn amount(&self) -> f64 {
        read(&self.inner.settings).amount
    }

    pub fn currency(&self) -> Currency {
        read(&self.inner.settings).currency.clone()
    }

    /// Provider terms of use, from the latest snapshot when it carried one.
    pub fn terms(&self) -> String {
        read(&self.inner.settings).terms.clone()
    }

    pub fn privacy_policy(&self) -> String {
        read(&self.inner.settings).privacy.clone()
    }

    pub fn state(&self) -> RatesState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RatesState> {
        self.inner.state.subscribe()
    }

    /// Shows the last persisted conversion table, if any.
    pub async fn prepare(&self) {
        if let Some(table) = load_json::<ConversionTable>(self.inner.store.as_ref(), TABLE_KEY).await
        {
            self.inner.state.send_replace(RatesState::Content(table));
        }
    }

    pub async fn set_amount(&self, text: &str) {
        let amount = parse_amount(text);
        debug!(input = text, amount, "Amount updated");
        write(&self.inner.settings).amount = amount;
        save_json(self.inner.store.as_ref(), AMOUNT_KEY, &amount).await;
    }

    pub async fn set_currency(&self, currency: Currency) {
        info!(currency = %currency, "Base currency changed");
        self.inner.adopt_currency(&currency).await;
        self.catalog.configure(currency);
    }

    /// Converts against the cached snapshot, fetching a new one when the cache
    /// is empty or stale.
    pub async fn reload(&self) {
        let (amount, currency) = {
            let settings = read(&self.inner.settings);
            (settings.amount, settings.currency.clone())
        };

        if let Some(snapshot) = self.inner.rates.current_valid().await {
            self.coordinator.cancel().await;
            self.inner.apply_snapshot(&snapshot, amount, &currency).await;
            return;
        }

        self.inner.state.send_replace(RatesState::Loading);
        let provider = Arc::clone(&self.provider);
        let inner = Arc::clone(&self.inner);
        self.coordinator
            .trigger(
                async move { provider.fetch_rates().await },
                move |result| async move { inner.complete(result, amount, &currency).await },
            )
            .await;
    }

    pub async fn cancel(&self) {
        self.coordinator.cancel().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GENERIC_FAILURE_MESSAGE;
    use crate::core::error::Error;
    use crate::session::testing::{GatedProvider, ScriptedProvider, catalog_response, rates_response};
    use crate::store::memory::MemoryStore;
    use std::collections::HashMap;

    fn ttl() -> Duration {
        Duration::minutes(30)
    }

    async fn new_session(provider: Arc<dyn ProviderClient>) -> (Arc<MemoryStore>, RatesSession) {
        let store = Arc::new(MemoryStore::new());
        let session = RatesSession::new(
            store.clone(),
            Arc::new(MemoryStore::new()),
            provider,
            ttl(),
        )
        .await;
        (store, session)
    }

    async fn wait_until_settled(session: &RatesSession) -> RatesState {
        let mut rx = session.subscribe();
        rx.wait_for(|s| matches!(s, RatesState::Content(_) | RatesState::Error(_)))
            .await
            .unwrap()
            .clone()
    }

    fn quote_for(table: &ConversionTable, code: &str) -> f64 {
        table
            .items
            .iter()
            .find(|item| item.currency.code() == code)
            .map(|item| item.quote)
            .unwrap()
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("100"), 100.0);
        assert_eq!(parse_amount("12,5"), 12.5);
        assert_eq!(parse_amount("$ 1 234.50"), 1234.5);
        assert_eq!(parse_amount("-3.25 EUR"), -3.25);
        assert_eq!(parse_amount(""), 0.0);
        assert_eq!(parse_amount("abc"), 0.0);
        assert_eq!(parse_amount("1,000.50"), 0.0);
    }

    #[tokio::test]
    async fn test_new_session_defaults() {
        let (_, session) = new_session(Arc::new(ScriptedProvider::default())).await;
        assert_eq!(session.amount(), 0.0);
        assert_eq!(session.currency(), Currency::new("USD"));
        assert_eq!(session.terms(), DEFAULT_TERMS_URL);
        assert_eq!(session.privacy_policy(), DEFAULT_PRIVACY_URL);
        assert_eq!(session.state(), RatesState::Empty);
    }

    #[tokio::test]
    async fn test_settings_are_restored() {
        let store = Arc::new(MemoryStore::new());
        let provider: Arc<dyn ProviderClient> = Arc::new(ScriptedProvider::default());
        {
            let session =
                RatesSession::new(store.clone(), Arc::new(MemoryStore::new()), provider.clone(), ttl())
                    .await;
            session.set_amount("42,5").await;
            session.set_currency(Currency::new("EUR")).await;
        }

        let session = RatesSession::new(store, Arc::new(MemoryStore::new()), provider, ttl()).await;
        assert_eq!(session.amount(), 42.5);
        assert_eq!(session.currency(), Currency::new("EUR"));
        assert_eq!(session.catalog().selection(), Currency::new("EUR"));
    }

    #[tokio::test]
    async fn test_reload_fetches_and_converts() {
        let provider = Arc::new(ScriptedProvider::default().with_rates(Ok(rates_response(0.9))));
        let (_, session) = new_session(provider.clone()).await;
        session.set_amount("100").await;
        session.set_currency(Currency::new("EUR")).await;

        session.reload().await;
        assert_eq!(session.state(), RatesState::Loading);

        let RatesState::Content(table) = wait_until_settled(&session).await else {
            panic!("Expected content");
        };
        assert_eq!(table.amount, 100.0);
        assert_eq!(table.currency, Currency::new("EUR"));
        assert!((quote_for(&table, "USD") - 1.111_111).abs() < 0.0001);
        assert_eq!(session.terms(), "https://example.com/terms");
        assert_eq!(session.privacy_policy(), "https://example.com/privacy");
        assert_eq!(provider.rate_calls(), 1);
    }

    #[tokio::test]
    async fn test_reload_reuses_valid_snapshot() {
        let provider = Arc::new(ScriptedProvider::default().with_rates(Ok(rates_response(0.9))));
        let (_, session) = new_session(provider.clone()).await;
        session.set_amount("10").await;

        session.reload().await;
        wait_until_settled(&session).await;

        session.set_currency(Currency::new("GBP")).await;
        session.reload().await;
        let RatesState::Content(table) = session.state() else {
            panic!("Expected content");
        };
        assert_eq!(table.currency, Currency::new("GBP"));
        assert_eq!(provider.rate_calls(), 1);
    }

    #[tokio::test]
    async fn test_invalid_metadata_urls_keep_defaults() {
        let mut response = rates_response(0.9);
        response.terms = Some("not a url".to_string());
        response.privacy = None;
        let provider = Arc::new(ScriptedProvider::default().with_rates(Ok(response)));
        let (_, session) = new_session(provider).await;

        session.reload().await;
        wait_until_settled(&session).await;
        assert_eq!(session.terms(), DEFAULT_TERMS_URL);
        assert_eq!(session.privacy_policy(), DEFAULT_PRIVACY_URL);
    }

    #[tokio::test]
    async fn test_fetch_error_is_published() {
        let provider = Arc::new(ScriptedProvider::default().with_rates(Err(Error::Provider {
            code: 104,
            info: "Monthly usage limit reached".to_string(),
        })));
        let (_, session) = new_session(provider).await;

        session.reload().await;
        assert_eq!(
            wait_until_settled(&session).await,
            RatesState::Error("Monthly usage limit reached".to_string())
        );
    }

    #[tokio::test]
    async fn test_unavailable_base_clears_cached_data() {
        let provider = Arc::new(
            ScriptedProvider::default()
                .with_rates(Ok(rates_response(0.9)))
                .with_rates(Ok(rates_response(0.0)))
                .with_rates(Ok(rates_response(0.9))),
        );
        let (store, session) = new_session(provider.clone()).await;
        session.set_amount("1").await;

        session.reload().await;
        wait_until_settled(&session).await;
        assert!(store.get(TABLE_KEY).await.is_some());

        // The cached snapshot doesn't quote JPY, so conversion fails and
        // both the snapshot and the table are dropped.
        session.set_currency(Currency::new("JPY")).await;
        session.reload().await;
        assert_eq!(
            session.state(),
            RatesState::Error(GENERIC_FAILURE_MESSAGE.to_string())
        );
        assert!(store.get(RATES_KEY).await.is_none());
        assert!(store.get(TABLE_KEY).await.is_none());

        // Nothing cached any more: the next reload has to refetch, and a zero
        // quote for the base fails the same way.
        session.set_currency(Currency::new("EUR")).await;
        session.reload().await;
        assert_eq!(session.state(), RatesState::Loading);
        assert_eq!(
            wait_until_settled(&session).await,
            RatesState::Error(GENERIC_FAILURE_MESSAGE.to_string())
        );
        assert_eq!(provider.rate_calls(), 2);
        assert!(store.get(RATES_KEY).await.is_none());

        session.reload().await;
        let RatesState::Content(table) = wait_until_settled(&session).await else {
            panic!("Expected content");
        };
        assert_eq!(table.currency, Currency::new("EUR"));
        assert_eq!(provider.rate_calls(), 3);
    }

    #[tokio::test]
    async fn test_prepare_restores_persisted_table() {
        let store = Arc::new(MemoryStore::new());
        let provider: Arc<dyn ProviderClient> =
            Arc::new(ScriptedProvider::default().with_rates(Ok(rates_response(0.9))));
        {
            let session =
                RatesSession::new(store.clone(), Arc::new(MemoryStore::new()), provider.clone(), ttl())
                    .await;
            session.set_amount("5").await;
            session.reload().await;
            wait_until_settled(&session).await;
        }

        let session = RatesSession::new(store, Arc::new(MemoryStore::new()), provider, ttl()).await;
        assert_eq!(session.state(), RatesState::Empty);
        session.prepare().await;
        let RatesState::Content(table) = session.state() else {
            panic!("Expected content");
        };
        assert_eq!(table.amount, 5.0);
        assert_eq!(table.items.len(), 3);
    }

    #[tokio::test]
    async fn test_prepare_without_table_stays_empty() {
        let (_, session) = new_session(Arc::new(ScriptedProvider::default())).await;
        session.prepare().await;
        assert_eq!(session.state(), RatesState::Empty);
    }

    #[tokio::test]
    async fn test_catalog_selection_reaches_rates_session() {
        let provider = Arc::new(ScriptedProvider::default().with_catalog(Ok(catalog_response())));
        let (store, session) = new_session(provider).await;

        session.catalog().set_selection(Currency::new("GBP")).await;

        assert_eq!(session.currency(), Currency::new("GBP"));
        let persisted: Currency =
            serde_json::from_slice(&store.get(CURRENCY_KEY).await.unwrap()).unwrap();
        assert_eq!(persisted, Currency::new("GBP"));
    }

    #[tokio::test]
    async fn test_superseded_fetch_has_no_effect() {
        let (provider, mut requests) = GatedProvider::new();
        let (_, session) = new_session(Arc::new(provider)).await;
        session.set_amount("100").await;

        session.reload().await;
        let first = requests.recv().await.unwrap();

        session.reload().await;
        let second = requests.recv().await.unwrap();

        second.send(Ok(rates_response(0.5))).unwrap();
        let RatesState::Content(table) = wait_until_settled(&session).await else {
            panic!("Expected content");
        };
        assert_eq!(quote_for(&table, "EUR"), 0.5);

        // The first fetch was cancelled; answering it late must change nothing.
        let _ = first.send(Ok(rates_response(0.7)));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let RatesState::Content(table) = session.state() else {
            panic!("Expected content");
        };
        assert_eq!(quote_for(&table, "EUR"), 0.5);
    }

    #[tokio::test]
    async fn test_cancel_keeps_loading_state() {
        let (provider, mut requests) = GatedProvider::new();
        let (_, session) = new_session(Arc::new(provider)).await;

        session.reload().await;
        let pending = requests.recv().await.unwrap();
        session.cancel().await;

        let _ = pending.send(Ok(rates_response(0.9)));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(session.state(), RatesState::Loading);
    }

    #[tokio::test]
    async fn test_snapshot_round_trips_through_store() {
        let store: Arc<dyn PersistentStore> = Arc::new(MemoryStore::new());
        let cache: TtlCache<RateSnapshot> = TtlCache::new(store, RATES_KEY, ttl());
        let snapshot = RateSnapshot {
            timestamp: Utc::now(),
            source_currency: Currency::new("USD"),
            quotes: HashMap::from([(Currency::new("EUR"), 0.912_345), (Currency::new("USD"), 1.0)]),
            terms: Some(DEFAULT_TERMS_URL.to_string()),
            privacy: Some(DEFAULT_PRIVACY_URL.to_string()),
        };

        cache.store(&snapshot).await;
        assert_eq!(cache.current_valid().await, Some(snapshot));
    }
}

pub mod cli;
pub mod core;
pub mod providers;
pub mod session;
pub mod store;

use crate::core::config::AppConfig;
use crate::providers::CurrencylayerProvider;
use crate::session::RatesSession;
use crate::store::Stores;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub enum AppCommand {
    Currencies,
    Select(String),
    Convert {
        amount: Option<String>,
        to: Option<String>,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("xrates starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!(base_url = %config.provider.base_url, "Loaded config");

    let access_key = config.provider.access_key.as_deref().with_context(|| {
        format!(
            "No currencylayer access key configured. Set provider.access_key or {}",
            crate::core::config::ACCESS_KEY_ENV
        )
    })?;
    let provider = Arc::new(CurrencylayerProvider::new(
        &config.provider.base_url,
        access_key,
        Duration::from_secs(config.provider.timeout_secs),
    ));

    let stores = Stores::open(&config.default_data_path()?);
    let session = RatesSession::new(
        Arc::clone(&stores.rates),
        Arc::clone(&stores.catalog),
        provider,
        config.cache_ttl(),
    )
    .await;

    let result = match command {
        AppCommand::Currencies => cli::currencies::run(session.catalog()).await,
        AppCommand::Select(code) => cli::currencies::select(session.catalog(), &code).await,
        AppCommand::Convert { amount, to } => {
            cli::convert::run(&session, amount.as_deref(), to.as_deref()).await
        }
    };

    session.cancel().await;
    session.catalog().cancel().await;
    stores.persist();
    result
}

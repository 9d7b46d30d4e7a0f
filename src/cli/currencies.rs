use super::ui;
use crate::core::currency::Currency;
use crate::session::{CatalogEntry, CatalogSession, CatalogState};
use anyhow::{Result, anyhow, bail};
use comfy_table::Cell;

/// Loads the catalog, waiting for a fetch if the cache can't serve it.
pub async fn load(session: &CatalogSession) -> Result<(CatalogEntry, Vec<CatalogEntry>)> {
    session.prepare().await;

    let mut rx = session.subscribe();
    let pb = matches!(*rx.borrow(), CatalogState::Loading)
        .then(|| ui::new_spinner("Fetching currencies..."));
    let state = rx
        .wait_for(|s| matches!(s, CatalogState::Content { .. } | CatalogState::Error(_)))
        .await
        .map_err(|_| anyhow!("Currency catalog session closed"))?
        .clone();
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    match state {
        CatalogState::Content { current, items } => Ok((current, items)),
        CatalogState::Error(message) => bail!(message),
        CatalogState::Idle | CatalogState::Loading => bail!("Currency catalog is unavailable"),
    }
}

pub fn display_as_table(current: &CatalogEntry, items: &[CatalogEntry]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Code"), ui::header_cell("Name")]);

    for entry in items {
        let is_current = entry.currency == current.currency;
        let code = if is_current {
            ui::style_text(entry.currency.code(), ui::StyleType::Highlight)
        } else {
            entry.currency.code().to_string()
        };
        table.add_row(vec![
            Cell::new(code),
            Cell::new(entry.title.as_deref().unwrap_or("N/A")),
        ]);
    }

    let current_name = current.title.as_deref().unwrap_or("unknown");
    format!(
        "{}\n\nSelected: {} ({})",
        table,
        ui::style_text(current.currency.code(), ui::StyleType::Highlight),
        current_name
    )
}

pub async fn run(session: &CatalogSession) -> Result<()> {
    let (current, items) = load(session).await?;
    println!(
        "{}\n\n{}",
        ui::style_text("Supported currencies", ui::StyleType::Title),
        display_as_table(&current, &items)
    );
    Ok(())
}

/// Selects `code` after checking the provider knows it.
pub async fn select(session: &CatalogSession, code: &str) -> Result<()> {
    let currency: Currency = code.parse()?;
    let (_, items) = load(session).await?;
    if !items.iter().any(|entry| entry.currency == currency) {
        bail!("Currency {} is not supported by the provider", currency);
    }

    session.set_selection(currency.clone()).await;
    println!(
        "Selected {}",
        ui::style_text(currency.code(), ui::StyleType::Highlight)
    );
    Ok(())
}

use super::ui;
use crate::core::currency::{ConversionTable, Currency};
use crate::session::{RatesSession, RatesState};
use anyhow::{Result, anyhow, bail};
use comfy_table::Cell;
use tracing::debug;

impl ConversionTable {
    pub fn display_as_table(&self) -> String {
        let base = self.currency.code();
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Currency"),
            ui::header_cell("Amount"),
            ui::header_cell(&format!("Rate (1 {base})")),
        ]);

        for item in &self.items {
            let is_base = item.currency == self.currency;
            table.add_row(vec![
                Cell::new(item.currency.code()),
                ui::number_cell(ui::format_amount(item.amount), is_base),
                ui::number_cell(ui::format_quote(item.quote), is_base),
            ]);
        }

        format!(
            "{} {}\n\n{}",
            ui::style_text(&ui::format_amount(self.amount), ui::StyleType::Title),
            ui::style_text(base, ui::StyleType::Title),
            table
        )
    }
}

pub async fn run(session: &RatesSession, amount: Option<&str>, to: Option<&str>) -> Result<()> {
    if let Some(text) = amount {
        session.set_amount(text).await;
    }
    if let Some(code) = to {
        let currency: Currency = code.parse()?;
        session.set_currency(currency).await;
    }
    debug!(amount = session.amount(), currency = %session.currency(), "Converting");

    session.prepare().await;
    session.reload().await;

    let mut rx = session.subscribe();
    let pb = matches!(*rx.borrow(), RatesState::Loading)
        .then(|| ui::new_spinner("Fetching exchange rates..."));
    let state = rx
        .wait_for(|s| !matches!(s, RatesState::Loading))
        .await
        .map_err(|_| anyhow!("Exchange rates session closed"))?
        .clone();
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    match state {
        RatesState::Content(table) => {
            println!("{}", table.display_as_table());
            println!(
                "\n{}\n{}",
                ui::style_text(&format!("Terms: {}", session.terms()), ui::StyleType::Subtle),
                ui::style_text(
                    &format!("Privacy: {}", session.privacy_policy()),
                    ui::StyleType::Subtle
                )
            );
            Ok(())
        }
        RatesState::Error(message) => {
            eprintln!("{}", ui::style_text(&message, ui::StyleType::Error));
            bail!(message)
        }
        RatesState::Empty | RatesState::Loading => bail!("No exchange rates available"),
    }
}

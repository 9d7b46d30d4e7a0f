//! Cross-rate derivation.
//!
//! Provider snapshots are always quoted against the provider's own source
//! currency. [`derive`] rebases them so that any quoted currency can act as
//! the base of the displayed table.

use super::currency::{ConversionItem, ConversionTable, Currency, RateSnapshot};
use super::error::{Error, Result};
use uuid::Uuid;

/// Expresses `amount` of `selected` in every currency quoted by `snapshot`.
///
/// Fails with [`Error::UnavailableConversion`] when `selected` has no quote or
/// a zero quote.
pub fn derive(snapshot: &RateSnapshot, amount: f64, selected: &Currency) -> Result<ConversionTable> {
    let base = match snapshot.quotes.get(selected) {
        Some(&quote) if quote != 0.0 => quote,
        _ => return Err(Error::UnavailableConversion(selected.clone())),
    };

    let source_amount = amount / base;
    let mut items: Vec<ConversionItem> = snapshot
        .quotes
        .iter()
        .map(|(currency, &quote)| ConversionItem {
            id: Uuid::new_v4(),
            amount: source_amount * quote,
            currency: currency.clone(),
            quote: quote / base,
        })
        .collect();
    items.sort_by(|a, b| a.currency.cmp(&b.currency));

    Ok(ConversionTable {
        amount,
        currency: selected.clone(),
        items,
    })
}

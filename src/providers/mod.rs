pub mod currencylayer;

pub use currencylayer::CurrencylayerProvider;

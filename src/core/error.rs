//! Error types shared by the provider, the conversion engine and the sessions.

use super::currency::Currency;
use thiserror::Error;

/// Message shown for any failure that doesn't come with a provider explanation.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    /// The provider answered but reported a failure of its own.
    #[error("{info}")]
    Provider { code: i64, info: String },

    /// The selected currency has no usable quote in the snapshot.
    #[error("Conversion unavailable for {0}")]
    UnavailableConversion(Currency),

    /// Transport, decoding or otherwise unexplained failure.
    #[error("{0}")]
    Generic(String),
}

impl Error {
    /// Text suitable for an `Error` session state.
    pub fn user_message(&self) -> String {
        match self {
            Error::Provider { info, .. } => info.clone(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Generic(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Generic(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

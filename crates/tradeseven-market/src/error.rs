//! Errors from price lookups.

use thiserror::Error;

/// Errors that can occur while fetching a quote
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    #[error("Unknown asset: {symbol}")]
    UnknownAsset { symbol: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Request failed: HTTP {status}")]
    RequestFailed { status: u16 },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("No price available for {symbol}")]
    NoPrice { symbol: String },

    #[error("Lookup for {symbol} timed out")]
    Timeout { symbol: String },
}

impl From<reqwest::Error> for MarketError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::RequestFailed {
                status: status.as_u16(),
            },
            None if e.is_decode() => Self::InvalidResponse {
                message: e.to_string(),
            },
            None => Self::NetworkError {
                message: e.to_string(),
            },
        }
    }
}

pub type MarketResult<T> = std::result::Result<T, MarketError>;

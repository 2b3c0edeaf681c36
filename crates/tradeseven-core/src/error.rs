//! Domain error types.

use rust_decimal::Decimal;
use thiserror::Error;

/// Why a portfolio was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PortfolioError {
    #[error("portfolio needs at least {min} assets, got {count}")]
    TooFewAssets { count: usize, min: usize },

    #[error("portfolio allows at most {max} assets, got {count}")]
    TooManyAssets { count: usize, max: usize },

    #[error("allocation for {symbol} is {percentage}%, must be between {min}% and {max}%")]
    AllocationOutOfRange {
        symbol: String,
        percentage: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("allocations sum to {total}%, must be 100%")]
    AllocationSum { total: Decimal },

    #[error("cannot mix stocks and crypto in one portfolio")]
    MixedAssetClasses,

    #[error("asset {0} appears more than once")]
    DuplicateAsset(String),

    #[error("unknown asset: {0}")]
    UnknownAsset(String),
}

/// All errors raised by the pure domain layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("invalid portfolio: {0}")]
    Portfolio(#[from] PortfolioError),

    #[error("portfolio name is required")]
    MissingName,

    #[error("challenge code is required")]
    MissingCode,

    #[error("username is required")]
    MissingUsername,

    #[error("no waiting battle with code {0}")]
    NotFound(String),

    #[error("you cannot join your own battle")]
    SelfJoin,

    #[error("portfolio type mismatch: battle requires {required}, got {provided}")]
    TypeMismatch { required: String, provided: String },
}

/// Result type for domain operations.
pub type CoreResult<T> = Result<T, CoreError>;

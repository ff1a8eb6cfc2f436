//! Error types for each stage of the refresh pipeline and the read path.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::currency::{Currency, CurrencyPair};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CurrencyError {
    #[error("invalid currency code: {0:?}")]
    InvalidCode(String),

    #[error("duplicate currency in supported list: {0}")]
    Duplicate(String),

    #[error("at least two supported currencies are required, got {0}")]
    TooFew(usize),
}

/// Failure of a single fetch. Scoped to one refresh cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport failure or non-success HTTP status.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("provider rate limited: {0}")]
    RateLimited(String),

    /// The payload carried `success: false` for a reason other than rate limiting.
    #[error("provider reported error {code}: {message}")]
    ProviderReported { code: i64, message: String },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    /// Whether trying again on a later tick can be expected to help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::ProviderUnavailable(_) | FetchError::RateLimited(_)
        )
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest errors may embed the request URL, which carries the API key.
        FetchError::ProviderUnavailable(err.without_url().to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::MalformedResponse(err.to_string())
    }
}

/// Failure to derive one pair. Never aborts the rest of the batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeriveError {
    #[error("missing quote for {0}")]
    MissingQuote(Currency),

    #[error("unusable quote {rate} for {currency}")]
    InvalidQuote { currency: Currency, rate: Decimal },

    #[error("rate for {0} exceeds the decimal range")]
    Overflow(CurrencyPair),

    /// The rate rounds to zero at the stored precision.
    #[error("rate for {0} is below the stored precision")]
    BelowPrecision(CurrencyPair),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("record already exists for {pair} at {observed_at}")]
    DuplicateRecord {
        pair: CurrencyPair,
        observed_at: chrono::DateTime<chrono::Utc>,
    },

    #[error("stored record is corrupt: {0}")]
    Corrupt(String),

    #[error("store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unsupported currency: {requested}. Supported currencies are: {supported}")]
    UnsupportedCurrency { requested: String, supported: String },

    #[error("base and target currency are both {0}")]
    SameCurrency(Currency),

    #[error("no rate recorded yet for {0}")]
    NotFound(CurrencyPair),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

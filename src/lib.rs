//! Keeps a table of foreign-exchange rates for a fixed set of currencies,
//! derived from a single USD-quoted provider feed, and serves the latest
//! rate and the rate history for any supported pair.

pub mod api;
pub mod config;
pub mod currency;
pub mod deriver;
pub mod error;
pub mod exchange_rate;
pub mod fetcher;
pub mod query;
pub mod quotes;
pub mod scheduler;
pub mod store;

pub use config::Config;
pub use currency::{Currency, CurrencyPair, SupportedCurrencies};
pub use exchange_rate::RateRecord;
pub use fetcher::{HttpQuoteFetcher, QuoteSource};
pub use query::QueryService;
pub use quotes::{QuoteSet, ResponseDialect};
pub use scheduler::{CycleOutcome, Refresher};
pub use store::{MemoryRateStore, PgRateStore, RateStore};

//! Append-only persistence of derived rates.

use async_trait::async_trait;

use crate::currency::Currency;
use crate::error::StoreError;
use crate::exchange_rate::RateRecord;

mod memory;
mod postgres;

pub use memory::MemoryRateStore;
pub use postgres::PgRateStore;

/// Storage contract shared by the refresher (writes) and the query path (reads).
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Persists a whole batch or nothing.
    async fn append(&self, records: &[RateRecord]) -> Result<(), StoreError>;

    /// Most recent record for the exact pair.
    async fn latest(
        &self,
        base: &Currency,
        target: &Currency,
    ) -> Result<Option<RateRecord>, StoreError>;

    /// Every record for the pair, newest first.
    async fn history(&self, base: &Currency, target: &Currency)
    -> Result<Vec<RateRecord>, StoreError>;

    /// All records sharing the globally most recent `observed_at`, ordered by pair.
    async fn latest_all(&self) -> Result<Vec<RateRecord>, StoreError>;
}

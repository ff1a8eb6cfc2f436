use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::RateStore;
use crate::currency::{Currency, CurrencyPair};
use crate::error::StoreError;
use crate::exchange_rate::RateRecord;

#[derive(Default)]
struct Series {
    // Per pair, ascending by observed_at.
    by_pair: HashMap<CurrencyPair, Vec<RateRecord>>,
    newest: Option<DateTime<Utc>>,
}

/// In-process store. A batch is validated and applied under one write lock,
/// so readers never observe part of it.
#[derive(Default)]
pub struct MemoryRateStore {
    series: RwLock<Series>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.series
            .read()
            .map(|s| s.by_pair.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    async fn append(&self, records: &[RateRecord]) -> Result<(), StoreError> {
        let mut series = self.series.write().map_err(|_| StoreError::Poisoned)?;

        for (i, record) in records.iter().enumerate() {
            let pair = record.pair();
            let clashes_stored = series
                .by_pair
                .get(&pair)
                .is_some_and(|rs| rs.iter().any(|r| r.observed_at == record.observed_at));
            let clashes_batch = records[..i]
                .iter()
                .any(|r| r.observed_at == record.observed_at && r.pair() == pair);
            if clashes_stored || clashes_batch {
                return Err(StoreError::DuplicateRecord {
                    pair,
                    observed_at: record.observed_at,
                });
            }
        }

        for record in records {
            let rs = series.by_pair.entry(record.pair()).or_default();
            let at = rs.partition_point(|r| r.observed_at <= record.observed_at);
            rs.insert(at, record.clone());
            if series.newest.is_none_or(|n| n < record.observed_at) {
                series.newest = Some(record.observed_at);
            }
        }

        Ok(())
    }

    async fn latest(
        &self,
        base: &Currency,
        target: &Currency,
    ) -> Result<Option<RateRecord>, StoreError> {
        let series = self.series.read().map_err(|_| StoreError::Poisoned)?;
        let pair = CurrencyPair::new(base.clone(), target.clone());
        Ok(series.by_pair.get(&pair).and_then(|rs| rs.last()).cloned())
    }

    async fn history(
        &self,
        base: &Currency,
        target: &Currency,
    ) -> Result<Vec<RateRecord>, StoreError> {
        let series = self.series.read().map_err(|_| StoreError::Poisoned)?;
        let pair = CurrencyPair::new(base.clone(), target.clone());
        Ok(series
            .by_pair
            .get(&pair)
            .map(|rs| rs.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn latest_all(&self) -> Result<Vec<RateRecord>, StoreError> {
        let series = self.series.read().map_err(|_| StoreError::Poisoned)?;
        let Some(newest) = series.newest else {
            return Ok(Vec::new());
        };
        let mut records: Vec<RateRecord> = series
            .by_pair
            .values()
            .filter_map(|rs| rs.last())
            .filter(|r| r.observed_at == newest)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            (&a.base_currency, &a.target_currency).cmp(&(&b.base_currency, &b.target_currency))
        });
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn cur(code: &str) -> Currency {
        code.parse().unwrap()
    }

    fn record(base: &str, target: &str, rate: Decimal, at: DateTime<Utc>) -> RateRecord {
        RateRecord::new(CurrencyPair::new(cur(base), cur(target)), rate, at)
    }

    #[tokio::test]
    async fn latest_is_not_found_before_first_append() {
        let store = MemoryRateStore::new();
        assert!(store.latest(&cur("EUR"), &cur("GBP")).await.unwrap().is_none());
        assert!(store.history(&cur("EUR"), &cur("GBP")).await.unwrap().is_empty());
        assert!(store.latest_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_returns_only_the_pair_newest_first() {
        let store = MemoryRateStore::new();
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(10);

        store
            .append(&[
                record("EUR", "GBP", dec!(0.88), t0),
                record("GBP", "EUR", dec!(1.13), t0),
            ])
            .await
            .unwrap();
        store
            .append(&[
                record("EUR", "GBP", dec!(0.89), t1),
                record("GBP", "EUR", dec!(1.12), t1),
            ])
            .await
            .unwrap();

        let history = store.history(&cur("EUR"), &cur("GBP")).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].observed_at, t1);
        assert_eq!(history[0].rate, dec!(0.89));
        assert_eq!(history[1].observed_at, t0);
        assert!(history.iter().all(|r| r.is_pair(&cur("EUR"), &cur("GBP"))));

        let latest = store.latest(&cur("GBP"), &cur("EUR")).await.unwrap().unwrap();
        assert_eq!(latest.rate, dec!(1.12));
    }

    #[tokio::test]
    async fn duplicate_rejects_whole_batch() {
        let store = MemoryRateStore::new();
        let t0 = Utc::now();
        store
            .append(&[record("USD", "EUR", dec!(0.9), t0)])
            .await
            .unwrap();

        let err = store
            .append(&[
                record("USD", "GBP", dec!(0.8), t0),
                record("USD", "EUR", dec!(0.91), t0),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::DuplicateRecord { .. }));
        assert_eq!(store.len(), 1);
        assert!(store.latest(&Currency::usd(), &cur("GBP")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_within_batch_is_rejected() {
        let store = MemoryRateStore::new();
        let t0 = Utc::now();
        let err = store
            .append(&[
                record("USD", "EUR", dec!(0.9), t0),
                record("USD", "EUR", dec!(0.9), t0),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateRecord { .. }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn latest_all_uses_global_newest_timestamp() {
        let store = MemoryRateStore::new();
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(10);

        store
            .append(&[
                record("USD", "EUR", dec!(0.9), t0),
                record("USD", "ILS", dec!(3.6), t0),
            ])
            .await
            .unwrap();
        // Second cycle lost ILS.
        store
            .append(&[record("USD", "EUR", dec!(0.91), t1)])
            .await
            .unwrap();

        let all = store.latest_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].rate, dec!(0.91));
        assert_eq!(all[0].observed_at, t1);
    }

    #[tokio::test]
    async fn latest_all_is_ordered_by_pair_not_batch_order() {
        let store = MemoryRateStore::new();
        let t0 = Utc::now();
        store
            .append(&[
                record("USD", "ILS", dec!(3.6), t0),
                record("GBP", "EUR", dec!(1.13), t0),
                record("EUR", "USD", dec!(1.1), t0),
                record("EUR", "GBP", dec!(0.88), t0),
            ])
            .await
            .unwrap();

        let pairs: Vec<String> = store
            .latest_all()
            .await
            .unwrap()
            .iter()
            .map(|r| r.pair().to_string())
            .collect();
        assert_eq!(pairs, vec!["EUR/GBP", "EUR/USD", "GBP/EUR", "USD/ILS"]);
    }

    #[tokio::test]
    async fn out_of_order_append_keeps_series_sorted() {
        let store = MemoryRateStore::new();
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(10);

        store
            .append(&[record("USD", "EUR", dec!(0.91), t1)])
            .await
            .unwrap();
        store
            .append(&[record("USD", "EUR", dec!(0.9), t0)])
            .await
            .unwrap();

        let latest = store.latest(&Currency::usd(), &cur("EUR")).await.unwrap().unwrap();
        assert_eq!(latest.observed_at, t1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn readers_see_whole_batches_during_appends() {
        let store = Arc::new(MemoryRateStore::new());
        let pairs: Vec<CurrencyPair> = ["EUR", "GBP", "ILS", "JPY"]
            .iter()
            .map(|c| CurrencyPair::new(Currency::usd(), cur(c)))
            .collect();
        let t0 = Utc::now();

        let writer = {
            let store = store.clone();
            let pairs = pairs.clone();
            tokio::spawn(async move {
                for i in 0..200 {
                    let at = t0 + Duration::seconds(i);
                    let batch: Vec<RateRecord> = pairs
                        .iter()
                        .map(|p| RateRecord::new(p.clone(), Decimal::from(i + 1), at))
                        .collect();
                    store.append(&batch).await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        while !writer.is_finished() {
            let all = store.latest_all().await.unwrap();
            assert!(all.is_empty() || all.len() == pairs.len(), "partial batch: {}", all.len());
            if let Some(first) = all.first() {
                assert!(all.iter().all(|r| r.observed_at == first.observed_at && r.rate == first.rate));
                // A pair's latest never lags the batch just read.
                let latest = store.latest(&Currency::usd(), &cur("EUR")).await.unwrap().unwrap();
                assert!(latest.observed_at >= first.observed_at);
            }
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();

        assert_eq!(store.latest_all().await.unwrap().len(), pairs.len());
        assert_eq!(store.len(), 200 * pairs.len());
    }
}

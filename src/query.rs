use std::sync::Arc;

use crate::currency::{Currency, CurrencyPair, SupportedCurrencies};
use crate::error::QueryError;
use crate::exchange_rate::RateRecord;
use crate::store::RateStore;

/// Read path over the rate store, validating currencies before every lookup.
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn RateStore>,
    supported: SupportedCurrencies,
    reject_same_currency: bool,
}

impl QueryService {
    pub fn new(store: Arc<dyn RateStore>, supported: SupportedCurrencies) -> Self {
        Self {
            store,
            supported,
            reject_same_currency: false,
        }
    }

    /// Reject `base == target` lookups instead of answering them with a rate of one.
    pub fn with_reject_same_currency(mut self, reject: bool) -> Self {
        self.reject_same_currency = reject;
        self
    }

    pub async fn get_latest(&self, base: &str, target: &str) -> Result<RateRecord, QueryError> {
        let pair = self.validate(base, target)?;
        self.store
            .latest(&pair.base, &pair.target)
            .await?
            .ok_or(QueryError::NotFound(pair))
    }

    pub async fn get_history(
        &self,
        base: &str,
        target: &str,
    ) -> Result<Vec<RateRecord>, QueryError> {
        let pair = self.validate(base, target)?;
        Ok(self.store.history(&pair.base, &pair.target).await?)
    }

    pub async fn get_all_latest(&self) -> Result<Vec<RateRecord>, QueryError> {
        Ok(self.store.latest_all().await?)
    }

    pub fn supported(&self) -> &SupportedCurrencies {
        &self.supported
    }

    fn validate(&self, base: &str, target: &str) -> Result<CurrencyPair, QueryError> {
        let base = self.supported_currency(base)?;
        let target = self.supported_currency(target)?;
        if self.reject_same_currency && base == target {
            return Err(QueryError::SameCurrency(base));
        }
        Ok(CurrencyPair::new(base, target))
    }

    fn supported_currency(&self, code: &str) -> Result<Currency, QueryError> {
        code.parse::<Currency>()
            .ok()
            .filter(|c| self.supported.contains(c))
            .ok_or_else(|| QueryError::UnsupportedCurrency {
                requested: code.to_string(),
                supported: self.supported.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRateStore;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn cur(code: &str) -> Currency {
        code.parse().unwrap()
    }

    async fn seeded() -> QueryService {
        let store = Arc::new(MemoryRateStore::new());
        let at = Utc::now();
        store
            .append(&[
                RateRecord::new(CurrencyPair::new(Currency::usd(), cur("EUR")), dec!(0.9), at),
                RateRecord::new(CurrencyPair::new(cur("EUR"), cur("EUR")), Decimal::ONE, at),
            ])
            .await
            .unwrap();
        let supported = SupportedCurrencies::parse_list("USD,EUR,GBP,ILS").unwrap();
        QueryService::new(store, supported)
    }

    #[tokio::test]
    async fn latest_passes_through_to_store() {
        let service = seeded().await;
        let record = service.get_latest("USD", "EUR").await.unwrap();
        assert_eq!(record.rate, dec!(0.9));
    }

    #[tokio::test]
    async fn absent_pair_is_not_found() {
        let service = seeded().await;
        let err = service.get_latest("GBP", "ILS").await.unwrap_err();
        assert!(matches!(err, QueryError::NotFound(ref p) if p.to_string() == "GBP/ILS"));
        assert!(service.get_history("GBP", "ILS").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsupported_currency_is_rejected() {
        let service = seeded().await;
        for (base, target) in [("JPY", "EUR"), ("USD", "XXX"), ("usd", "EUR"), ("", "EUR")] {
            let err = service.get_latest(base, target).await.unwrap_err();
            assert!(
                matches!(err, QueryError::UnsupportedCurrency { .. }),
                "{base}/{target}"
            );
        }
        let err = service.get_history("USD", "JPY").await.unwrap_err();
        assert!(err.to_string().contains("USD, EUR, GBP, ILS"));
    }

    #[tokio::test]
    async fn same_currency_policy_is_configurable() {
        let service = seeded().await;
        assert_eq!(
            service.get_latest("EUR", "EUR").await.unwrap().rate,
            Decimal::ONE
        );

        let strict = service.with_reject_same_currency(true);
        assert!(matches!(
            strict.get_latest("EUR", "EUR").await,
            Err(QueryError::SameCurrency(_))
        ));
    }
}

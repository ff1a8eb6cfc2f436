use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::currency::{Currency, CurrencyPair};

/// One derived rate, immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateRecord {
    pub id: Uuid,
    pub base_currency: Currency,
    pub target_currency: Currency,
    pub rate: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl RateRecord {
    pub fn new(pair: CurrencyPair, rate: Decimal, observed_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            base_currency: pair.base,
            target_currency: pair.target,
            rate,
            observed_at,
        }
    }

    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.base_currency.clone(), self.target_currency.clone())
    }

    pub fn is_pair(&self, base: &Currency, target: &Currency) -> bool {
        &self.base_currency == base && &self.target_currency == target
    }
}

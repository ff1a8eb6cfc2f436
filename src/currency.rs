use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CurrencyError;

/// Three-letter uppercase currency code, e.g. `EUR`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub const USD: &str = "USD";

    pub fn usd() -> Self {
        Currency(Self::USD.to_string())
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    pub fn is_usd(&self) -> bool {
        self.0 == Self::USD
    }
}

impl FromStr for Currency {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(CurrencyError::InvalidCode(s.to_string()));
        }
        Ok(Currency(code.to_string()))
    }
}

impl TryFrom<String> for Currency {
    type Error = CurrencyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered `(base, target)` combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CurrencyPair {
    pub base: Currency,
    pub target: Currency,
}

impl CurrencyPair {
    pub fn new(base: Currency, target: Currency) -> Self {
        Self { base, target }
    }

    pub fn is_identity(&self) -> bool {
        self.base == self.target
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.target)
    }
}

/// The fixed set of currencies the service maintains rates for.
///
/// Order is preserved from configuration, so each derived batch lists its
/// pairs in that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedCurrencies(Vec<Currency>);

impl SupportedCurrencies {
    pub fn new(currencies: Vec<Currency>) -> Result<Self, CurrencyError> {
        if currencies.len() < 2 {
            return Err(CurrencyError::TooFew(currencies.len()));
        }
        let mut seen = Vec::with_capacity(currencies.len());
        for currency in &currencies {
            if seen.contains(&currency) {
                return Err(CurrencyError::Duplicate(currency.to_string()));
            }
            seen.push(currency);
        }
        Ok(Self(currencies))
    }

    /// Parses a comma-separated list such as `USD,EUR,GBP,ILS`.
    pub fn parse_list(list: &str) -> Result<Self, CurrencyError> {
        let currencies = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Currency::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(currencies)
    }

    pub fn contains(&self, currency: &Currency) -> bool {
        self.0.contains(currency)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Currency> {
        self.0.iter()
    }

    /// Currencies the provider must quote against USD.
    pub fn non_usd(&self) -> impl Iterator<Item = &Currency> {
        self.0.iter().filter(|c| !c.is_usd())
    }

    /// Full ordered cross-product, identity pairs included.
    pub fn pairs(&self) -> Vec<CurrencyPair> {
        self.0
            .iter()
            .flat_map(|base| {
                self.0
                    .iter()
                    .map(move |target| CurrencyPair::new(base.clone(), target.clone()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SupportedCurrencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<&str> = self.0.iter().map(Currency::code).collect();
        f.write_str(&codes.join(", "))
    }
}

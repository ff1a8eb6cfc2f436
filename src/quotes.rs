use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Number;

use crate::currency::Currency;
use crate::error::FetchError;

/// Provider error code for an exhausted usage allowance.
const USAGE_LIMIT_REACHED: i64 = 104;
const TOO_MANY_REQUESTS: i64 = 429;

/// Shape of the upstream payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseDialect {
    /// `{"rates": {"EUR": 0.9}}`, requested with `api_key` and `base=USD`.
    #[default]
    Rates,
    /// `{"quotes": {"USDEUR": 0.9}}`, requested with `access_key` and `source=USD`.
    Quotes,
}

impl ResponseDialect {
    pub fn key_param(&self) -> &'static str {
        match self {
            ResponseDialect::Rates => "api_key",
            ResponseDialect::Quotes => "access_key",
        }
    }

    pub fn base_param(&self) -> &'static str {
        match self {
            ResponseDialect::Rates => "base",
            ResponseDialect::Quotes => "source",
        }
    }
}

impl FromStr for ResponseDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rates" => Ok(ResponseDialect::Rates),
            "quotes" => Ok(ResponseDialect::Quotes),
            other => Err(format!("unknown provider dialect {other:?}, expected rates or quotes")),
        }
    }
}

impl fmt::Display for ResponseDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseDialect::Rates => f.write_str("rates"),
            ResponseDialect::Quotes => f.write_str("quotes"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    success: bool,
    timestamp: Option<i64>,
    // Raw provider digits; relies on serde_json's arbitrary_precision feature.
    rates: Option<HashMap<String, Number>>,
    quotes: Option<HashMap<String, Number>>,
    error: Option<ProviderErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(alias = "info")]
    message: Option<String>,
}

/// USD-denominated quotes from one fetch. USD itself is implicitly 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteSet {
    rates: HashMap<Currency, Decimal>,
    provider_time: Option<DateTime<Utc>>,
}

impl QuoteSet {
    pub fn new(rates: HashMap<Currency, Decimal>) -> Self {
        Self {
            rates,
            provider_time: None,
        }
    }

    pub fn get(&self, currency: &Currency) -> Option<Decimal> {
        if currency.is_usd() {
            return Some(Decimal::ONE);
        }
        self.rates.get(currency).copied()
    }

    /// Timestamp the provider attached to the payload, if any.
    pub fn provider_time(&self) -> Option<DateTime<Utc>> {
        self.provider_time
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl FromIterator<(Currency, Decimal)> for QuoteSet {
    fn from_iter<T: IntoIterator<Item = (Currency, Decimal)>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Parses a provider payload into a [`QuoteSet`], keeping only `wanted` currencies.
pub fn parse_quotes(
    body: &str,
    dialect: ResponseDialect,
    wanted: &[Currency],
) -> Result<QuoteSet, FetchError> {
    let response: ProviderResponse = serde_json::from_str(body)?;

    if !response.success {
        return Err(reported_error(response.error));
    }

    let raw = match dialect {
        ResponseDialect::Rates => response.rates,
        ResponseDialect::Quotes => response.quotes,
    }
    .filter(|map| !map.is_empty())
    .ok_or_else(|| FetchError::MalformedResponse(format!("no {dialect} in payload")))?;

    let mut rates = HashMap::with_capacity(wanted.len());
    for (key, value) in raw {
        let code = match dialect {
            ResponseDialect::Rates => key.as_str(),
            ResponseDialect::Quotes => key.strip_prefix(Currency::USD).ok_or_else(|| {
                FetchError::MalformedResponse(format!("quote key {key:?} is not USD-prefixed"))
            })?,
        };
        // Providers may return more than was asked for.
        let Some(currency) = wanted.iter().find(|c| c.code() == code) else {
            continue;
        };
        rates.insert(currency.clone(), to_decimal(&key, &value)?);
    }

    Ok(QuoteSet {
        rates,
        provider_time: response
            .timestamp
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
    })
}

fn to_decimal(key: &str, value: &Number) -> Result<Decimal, FetchError> {
    let text = value.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| FetchError::MalformedResponse(format!("quote {key} = {text}: {e}")))
}

fn reported_error(error: Option<ProviderErrorBody>) -> FetchError {
    let Some(error) = error else {
        return FetchError::ProviderReported {
            code: 0,
            message: "unknown error".to_string(),
        };
    };
    let message = error.message.unwrap_or_else(|| "unknown error".to_string());
    match error.code {
        USAGE_LIMIT_REACHED | TOO_MANY_REQUESTS => FetchError::RateLimited(message),
        code => FetchError::ProviderReported { code, message },
    }
}

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, StatusCode, Url};

use crate::currency::{Currency, SupportedCurrencies};
use crate::error::FetchError;
use crate::quotes::{QuoteSet, ResponseDialect, parse_quotes};

/// Source of USD-based quotes, called once per refresh cycle.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch(&self) -> Result<QuoteSet, FetchError>;
}

/// Fetches quotes over HTTP from a single upstream provider.
pub struct HttpQuoteFetcher {
    client: Client,
    base_url: String,
    api_key: String,
    dialect: ResponseDialect,
    currencies: Vec<Currency>,
}

impl HttpQuoteFetcher {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        dialect: ResponseDialect,
        supported: &SupportedCurrencies,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            dialect,
            currencies: supported.non_usd().cloned().collect(),
        })
    }

    fn url(&self) -> Result<Url, FetchError> {
        let currencies = self
            .currencies
            .iter()
            .map(Currency::code)
            .collect::<Vec<_>>()
            .join(",");

        Url::parse_with_params(
            &self.base_url,
            &[
                (self.dialect.key_param(), self.api_key.as_str()),
                ("currencies", currencies.as_str()),
                (self.dialect.base_param(), Currency::USD),
            ],
        )
        .map_err(|e| FetchError::ProviderUnavailable(format!("invalid provider url: {e}")))
    }

    async fn load_json(&self) -> Result<String, FetchError> {
        let resp = self.client.get(self.url()?).send().await?;
        check_status(resp.status())?;

        let text = resp.text().await?;
        debug!("Provider response: {text}");

        Ok(text)
    }
}

fn check_status(status: StatusCode) -> Result<(), FetchError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::RateLimited(format!("HTTP {status}")));
    }
    if !status.is_success() {
        return Err(FetchError::ProviderUnavailable(format!("HTTP {status}")));
    }
    Ok(())
}

#[async_trait]
impl QuoteSource for HttpQuoteFetcher {
    async fn fetch(&self) -> Result<QuoteSet, FetchError> {
        let text = self.load_json().await?;
        let quotes = parse_quotes(&text, self.dialect, &self.currencies)?;

        info!(
            "Fetched {} quotes from provider ({} dialect)",
            quotes.len(),
            self.dialect
        );

        Ok(quotes)
    }
}

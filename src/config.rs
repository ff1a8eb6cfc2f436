use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;

use crate::currency::SupportedCurrencies;
use crate::error::ConfigError;
use crate::quotes::ResponseDialect;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CYCLE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Service settings. Every required value must be present at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub currencies: SupportedCurrencies,
    pub refresh_interval: Duration,
    pub dialect: ResponseDialect,
    pub http_timeout: Duration,
    pub cycle_timeout: Duration,
    pub reject_same_currency: bool,
    pub database_url: String,
    pub max_connections: u32,
    pub bind_addr: SocketAddr,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine; the variables may come from the environment.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let currencies = SupportedCurrencies::parse_list(&required("FX_CURRENCIES")?)
            .map_err(|e| invalid("FX_CURRENCIES", e))?;

        let refresh_interval = positive_secs(
            "FX_REFRESH_INTERVAL_SECS",
            parse("FX_REFRESH_INTERVAL_SECS", &required("FX_REFRESH_INTERVAL_SECS")?)?,
        )?;

        let base_url = required("FX_BASE_URL")?;
        let parsed = Url::parse(base_url.trim()).map_err(|e| invalid("FX_BASE_URL", e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid("FX_BASE_URL", "must be an http or https URL"));
        }

        Ok(Self {
            api_key: required("FX_API_KEY")?,
            base_url: base_url.trim().to_string(),
            currencies,
            refresh_interval,
            dialect: optional(&lookup, "FX_PROVIDER_DIALECT", ResponseDialect::default())?,
            http_timeout: positive_secs(
                "FX_HTTP_TIMEOUT_SECS",
                optional(&lookup, "FX_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
            )?,
            cycle_timeout: positive_secs(
                "FX_CYCLE_TIMEOUT_SECS",
                optional(&lookup, "FX_CYCLE_TIMEOUT_SECS", DEFAULT_CYCLE_TIMEOUT_SECS)?,
            )?,
            reject_same_currency: optional(&lookup, "FX_REJECT_SAME_CURRENCY", false)?,
            database_url: required("DATABASE_URL")?,
            max_connections: optional(&lookup, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            bind_addr: match lookup("BIND_ADDR") {
                Some(addr) => parse("BIND_ADDR", &addr)?,
                None => parse("BIND_ADDR", DEFAULT_BIND_ADDR)?,
            },
        })
    }
}

fn invalid(key: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.to_string(),
    }
}

fn positive_secs(key: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    value.trim().parse().map_err(|e: T::Err| invalid(key, e))
}

fn optional<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: ToString,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => parse(key, &value),
        _ => Ok(default),
    }
}

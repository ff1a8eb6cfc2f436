//! Expands one USD-based quote set into rates for every requested pair.
//!
//! Identity pairs are emitted with a rate of exactly one rather than skipped,
//! so every cycle produces a complete table for the supported set.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::currency::{Currency, CurrencyPair};
use crate::error::DeriveError;
use crate::exchange_rate::RateRecord;
use crate::quotes::QuoteSet;

/// Fractional digits kept on every derived rate.
pub const RATE_SCALE: u32 = 10;

/// Result of one derivation batch.
#[derive(Debug, Default)]
pub struct Derivation {
    pub records: Vec<RateRecord>,
    pub failures: Vec<(CurrencyPair, DeriveError)>,
}

/// Derives every pair, stamping the batch with the current time.
pub fn derive(quotes: &QuoteSet, pairs: &[CurrencyPair]) -> Derivation {
    derive_at(quotes, pairs, Utc::now())
}

/// Derives every pair with a caller-supplied `observed_at` shared by the batch.
pub fn derive_at(
    quotes: &QuoteSet,
    pairs: &[CurrencyPair],
    observed_at: DateTime<Utc>,
) -> Derivation {
    let mut derivation = Derivation::default();

    for pair in pairs {
        match derive_rate(quotes, &pair.base, &pair.target) {
            Ok(rate) => derivation
                .records
                .push(RateRecord::new(pair.clone(), rate, observed_at)),
            Err(e) => derivation.failures.push((pair.clone(), e)),
        }
    }

    derivation
}

/// Rate of one `from` unit expressed in `to`, pivoting through USD.
pub fn derive_rate(quotes: &QuoteSet, from: &Currency, to: &Currency) -> Result<Decimal, DeriveError> {
    if from == to {
        return Ok(Decimal::ONE);
    }

    let pair = || CurrencyPair::new(from.clone(), to.clone());
    let rate = if from.is_usd() {
        quote(quotes, to)?
    } else if to.is_usd() {
        Decimal::ONE
            .checked_div(quote(quotes, from)?)
            .ok_or_else(|| DeriveError::Overflow(pair()))?
    } else {
        let from_quote = quote(quotes, from)?;
        quote(quotes, to)?
            .checked_div(from_quote)
            .ok_or_else(|| DeriveError::Overflow(pair()))?
    };

    let rate = rate.round_dp(RATE_SCALE).normalize();
    if rate.is_zero() {
        return Err(DeriveError::BelowPrecision(pair()));
    }
    Ok(rate)
}

/// Looks up a quote that is safe to divide by.
fn quote(quotes: &QuoteSet, currency: &Currency) -> Result<Decimal, DeriveError> {
    let rate = quotes
        .get(currency)
        .ok_or_else(|| DeriveError::MissingQuote(currency.clone()))?;
    if rate <= Decimal::ZERO {
        return Err(DeriveError::InvalidQuote {
            currency: currency.clone(),
            rate,
        });
    }
    Ok(rate)
}

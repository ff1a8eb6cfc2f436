//! Background refresh loop: fetch, derive, persist on a fixed interval.
//!
//! Each cycle walks `Idle -> Fetching -> Deriving -> Persisting -> Idle`. A
//! failure in any phase abandons that cycle only; the next tick starts over.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval, timeout};

use crate::currency::{CurrencyPair, SupportedCurrencies};
use crate::deriver::derive_at;
use crate::error::{DeriveError, FetchError, StoreError};
use crate::fetcher::QuoteSource;
use crate::store::RateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Fetching,
    Deriving,
    Persisting,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Fetching => "fetching",
            CyclePhase::Deriving => "deriving",
            CyclePhase::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

/// What one cycle achieved.
#[derive(Debug)]
pub enum CycleOutcome {
    Persisted {
        stored: usize,
        failed_pairs: Vec<(CurrencyPair, DeriveError)>,
    },
    FetchFailed(FetchError),
    /// Every pair failed to derive; nothing was written.
    NothingDerived(Vec<(CurrencyPair, DeriveError)>),
    StoreFailed(StoreError),
    TimedOut(Duration),
}

impl CycleOutcome {
    pub fn stored(&self) -> usize {
        match self {
            CycleOutcome::Persisted { stored, .. } => *stored,
            _ => 0,
        }
    }
}

pub struct Refresher {
    source: Arc<dyn QuoteSource>,
    store: Arc<dyn RateStore>,
    pairs: Vec<CurrencyPair>,
    period: Duration,
    cycle_timeout: Duration,
    last_observed: Option<DateTime<Utc>>,
}

impl Refresher {
    pub fn new(
        source: Arc<dyn QuoteSource>,
        store: Arc<dyn RateStore>,
        supported: &SupportedCurrencies,
        period: Duration,
        cycle_timeout: Duration,
    ) -> Self {
        Self {
            source,
            store,
            pairs: supported.pairs(),
            period,
            cycle_timeout,
            last_observed: None,
        }
    }

    /// Runs until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// Shutdown is observed between cycles; an in-flight cycle is bounded by
    /// the cycle timeout.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Exchange rate refresher starting ({} pairs every {:?})",
            self.pairs.len(),
            self.period
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Exchange rate refresher stopped");
    }

    /// Executes one fetch-derive-persist cycle, bounded by the cycle timeout.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let outcome = match timeout(self.cycle_timeout, self.cycle()).await {
            Ok(outcome) => outcome,
            Err(_) => CycleOutcome::TimedOut(self.cycle_timeout),
        };

        match &outcome {
            CycleOutcome::Persisted {
                stored,
                failed_pairs,
            } => info!(
                "Stored {stored} exchange rates ({} pairs failed)",
                failed_pairs.len()
            ),
            CycleOutcome::FetchFailed(FetchError::RateLimited(e)) => {
                warn!("Fetch failed, rate limited by provider, skipping cycle: {e}")
            }
            CycleOutcome::FetchFailed(e) => warn!(
                "Fetch failed (retryable: {}), skipping cycle: {e}",
                e.is_retryable()
            ),
            CycleOutcome::NothingDerived(failures) => {
                warn!("No rates derived, all {} pairs failed", failures.len())
            }
            CycleOutcome::StoreFailed(e) => error!("Failed to store exchange rates: {e}"),
            CycleOutcome::TimedOut(after) => {
                error!("Refresh cycle abandoned after {after:?}")
            }
        }
        debug!("Refresh cycle phase: {}", CyclePhase::Idle);

        outcome
    }

    async fn cycle(&mut self) -> CycleOutcome {
        debug!("Refresh cycle phase: {}", CyclePhase::Fetching);
        let quotes = match self.source.fetch().await {
            Ok(quotes) => quotes,
            Err(e) => return CycleOutcome::FetchFailed(e),
        };

        debug!("Refresh cycle phase: {}", CyclePhase::Deriving);
        let observed_at = self.next_observed_at();
        let derivation = derive_at(&quotes, &self.pairs, observed_at);
        for (pair, e) in &derivation.failures {
            warn!("Skipping {pair}: {e}");
        }
        if derivation.records.is_empty() {
            return CycleOutcome::NothingDerived(derivation.failures);
        }

        debug!("Refresh cycle phase: {}", CyclePhase::Persisting);
        if let Err(e) = self.store.append(&derivation.records).await {
            return CycleOutcome::StoreFailed(e);
        }
        self.last_observed = Some(observed_at);

        CycleOutcome::Persisted {
            stored: derivation.records.len(),
            failed_pairs: derivation.failures,
        }
    }

    /// Current time at storage precision, never earlier than the previous batch.
    fn next_observed_at(&self) -> DateTime<Utc> {
        let now = Utc::now().trunc_subsecs(6);
        match self.last_observed {
            Some(last) if now <= last => last + chrono::Duration::microseconds(1),
            _ => now,
        }
    }
}

//! Cached mortgage rate quote.
//!
//! One slot per cache, replaced wholesale once older than the TTL.
//! Every failure path resolves to `RateQuote::fallback()`.
//!
//! The slot lock is never held across the upstream fetch, so concurrent
//! misses may each fetch and the last writer wins. The fetch has no side
//! effects, so duplicate fetches only cost an extra upstream call.

use crate::clients::fred::ObservationSource;
use crate::models::RateQuote;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Trailing window requested so placeholder values can be skipped
pub const OBSERVATION_WINDOW: u32 = 14;

/// Default time-to-live of a cached quote (1 hour)
pub const DEFAULT_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Arc<RateQuote>,
    captured_at: DateTime<Utc>,
}

pub struct RateQuoteCache {
    source: Arc<dyn ObservationSource>,
    ttl: Duration,
    entry: RwLock<Option<CacheEntry>>,
}

impl RateQuoteCache {
    pub fn new(source: Arc<dyn ObservationSource>) -> Self {
        Self::with_ttl(source, Duration::seconds(DEFAULT_TTL_SECS))
    }

    pub fn with_ttl(source: Arc<dyn ObservationSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            entry: RwLock::new(None),
        }
    }

    /// Current quote. Never fails.
    pub async fn get_quote(&self) -> Arc<RateQuote> {
        self.get_quote_at(Utc::now()).await
    }

    pub async fn get_quote_at(&self, now: DateTime<Utc>) -> Arc<RateQuote> {
        if let Some(payload) = self.fresh_payload(now) {
            debug!("Rate quote cache hit");
            return payload;
        }

        let quote = match self.fetch_quote().await {
            Ok(quote) => {
                info!(
                    "Fetched {} observation {:?}: {:?} -> {}",
                    quote.source, quote.observation_date, quote.raw_percent, quote.rate_percent
                );
                quote
            }
            Err(e) => {
                warn!("Serving fallback rate quote: {:#}", e);
                RateQuote::fallback()
            }
        };

        let payload = Arc::new(quote);
        *self.entry.write() = Some(CacheEntry {
            payload: payload.clone(),
            captured_at: now,
        });
        payload
    }

    /// Drop the cached quote so the next call fetches
    pub fn invalidate(&self) {
        *self.entry.write() = None;
    }

    fn fresh_payload(&self, now: DateTime<Utc>) -> Option<Arc<RateQuote>> {
        let guard = self.entry.read();
        let entry = guard.as_ref()?;
        if now.signed_duration_since(entry.captured_at) < self.ttl {
            Some(entry.payload.clone())
        } else {
            None
        }
    }

    async fn fetch_quote(&self) -> Result<RateQuote> {
        let series_id = self.source.series_id();
        let observations = self.source.latest_observations(OBSERVATION_WINDOW).await?;

        let latest = observations
            .iter()
            .find(|obs| obs.value.is_some())
            .ok_or_else(|| anyhow!("no usable observations for {}", series_id))?;

        // find() above guarantees a value
        let raw_text = latest.value.as_deref().unwrap_or_default();
        let raw: f64 = raw_text
            .parse()
            .map_err(|_| anyhow!("non-numeric observation {:?} for {}", raw_text, series_id))?;
        if !raw.is_finite() {
            return Err(anyhow!("non-finite observation {} for {}", raw, series_id));
        }

        Ok(RateQuote::from_observation(raw, &latest.date, series_id))
    }
}

//! FRED API Client (Federal Reserve Economic Data)
//!
//! Supplies the benchmark mortgage series behind the rate quote.
//! Caching is the caller's concern (see `quote_cache`).

use crate::models::Observation;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.stlouisfed.org/fred";

/// Common series IDs
pub mod series {
    /// 30-Year Fixed Rate Mortgage Average in the United States
    pub const MORTGAGE_30Y: &str = "MORTGAGE30US";
    /// 15-Year Fixed Rate Mortgage Average in the United States
    pub const MORTGAGE_15Y: &str = "MORTGAGE15US";
    /// 10-Year Treasury Rate
    pub const TREASURY_10Y: &str = "DGS10";
}

/// Source of recent observations for one series
#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// Series identifier these observations belong to
    fn series_id(&self) -> &str;

    /// Most recent observations first, at most `limit` of them
    async fn latest_observations(&self, limit: u32) -> Result<Vec<Observation>>;
}

/// FRED API client bound to a single series
pub struct FredClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    series_id: String,
}

impl FredClient {
    /// Create a client for the 30-year mortgage series
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Self::with_series(api_key, series::MORTGAGE_30Y, timeout)
    }

    pub fn with_series(
        api_key: Option<String>,
        series_id: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("SettlementWatch/1.0")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            series_id: series_id.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Get observations for the configured series, newest first
    pub async fn get_observations(&self, limit: u32) -> Result<Vec<Observation>> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow!("FRED_API_KEY not set"))?;

        let url = format!("{}/series/observations", self.base_url);
        let limit_param = limit.to_string();

        debug!("Fetching observations for {} from FRED", self.series_id);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("series_id", self.series_id.as_str()),
                ("api_key", api_key.as_str()),
                ("file_type", "json"),
                ("sort_order", "desc"),
                ("limit", limit_param.as_str()),
            ])
            .send()
            .await
            .context("Failed to fetch from FRED")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("FRED API error: {} - {}", status, body));
        }

        let fred_response: FredObservationsResponse = response
            .json()
            .await
            .context("Failed to parse FRED response")?;

        Ok(fred_response.into_observations())
    }
}

#[async_trait]
impl ObservationSource for FredClient {
    fn series_id(&self) -> &str {
        &self.series_id
    }

    async fn latest_observations(&self, limit: u32) -> Result<Vec<Observation>> {
        self.get_observations(limit).await
    }
}

/// Internal FRED API response structures
#[derive(Debug, Deserialize)]
struct FredObservationsResponse {
    #[serde(default)]
    observations: Option<Vec<FredObservation>>,
}

impl FredObservationsResponse {
    fn into_observations(self) -> Vec<Observation> {
        self.observations
            .unwrap_or_default()
            .into_iter()
            .map(|obs| Observation::new(obs.date, &obs.value))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    date: String,
    #[serde(default)]
    value: String,
}

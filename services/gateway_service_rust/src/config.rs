use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use settlement_rust_core::clients::{buttondown, fred};
use settlement_rust_core::quote_cache::DEFAULT_TTL_SECS;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub static_dir: Option<PathBuf>,

    pub fred_api_key: Option<String>,
    pub fred_series_id: String,
    pub fred_base_url: String,

    pub buttondown_api_key: Option<String>,
    pub buttondown_base_url: String,

    pub upstream_timeout: Duration,
    pub rate_cache_ttl: chrono::Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bind_addr = parse_optional_env("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse::<SocketAddr>()
            .context("Invalid BIND_ADDR (expected host:port)")?;

        let static_dir = parse_optional_env("STATIC_DIR").map(PathBuf::from);

        let fred_api_key = parse_optional_env("FRED_API_KEY");
        let fred_series_id = parse_optional_env("FRED_SERIES_ID")
            .unwrap_or_else(|| fred::series::MORTGAGE_30Y.to_string());
        let fred_base_url = parse_optional_env("FRED_BASE_URL")
            .unwrap_or_else(|| fred::DEFAULT_BASE_URL.to_string());

        let buttondown_api_key = parse_optional_env("BUTTONDOWN_API_KEY");
        let buttondown_base_url = parse_optional_env("BUTTONDOWN_BASE_URL")
            .unwrap_or_else(|| buttondown::DEFAULT_BASE_URL.to_string());

        let upstream_timeout =
            Duration::from_secs(parse_u64_env("UPSTREAM_TIMEOUT_SECS", 10)?);
        let rate_cache_ttl = ttl_from_secs(parse_u64_env(
            "RATE_CACHE_TTL_SECS",
            DEFAULT_TTL_SECS as u64,
        )?)?;

        Ok(Self {
            bind_addr,
            static_dir,
            fred_api_key,
            fred_series_id,
            fred_base_url,
            buttondown_api_key,
            buttondown_base_url,
            upstream_timeout,
            rate_cache_ttl,
        })
    }
}

/// Unset and blank variables are both treated as absent
fn parse_optional_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn ttl_from_secs(secs: u64) -> Result<chrono::Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .with_context(|| format!("Invalid RATE_CACHE_TTL_SECS: {secs} (out of range)"))
}

fn parse_u64_env(key: &str, default: u64) -> Result<u64> {
    let raw = parse_optional_env(key).unwrap_or_else(|| default.to_string());
    raw.parse::<u64>()
        .with_context(|| format!("Invalid {key}: {raw} (expected integer)"))
}

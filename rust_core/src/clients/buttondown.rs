//! Buttondown API Client
//!
//! Mailing-list adapter used by subscription reconciliation.
//!
//! Buttondown does not return a distinct error kind when an email is already
//! on the list, only a message. `classify_create_failure` is the one place
//! that inspects that text.

use crate::models::{NewSubscriber, Subscriber, SubscriberPatch};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.buttondown.email/v1";

/// Message fragments Buttondown uses for a duplicate email
const ALREADY_SUBSCRIBED_MARKERS: &[&str] = &["already subscribed", "already exists"];

#[derive(Debug, Error)]
pub enum MailingListError {
    #[error("subscriber already exists: {0}")]
    AlreadySubscribed(String),

    #[error("BUTTONDOWN_API_KEY not set")]
    MissingCredential,

    #[error("{0}")]
    Upstream(String),
}

/// Operations the reconciler needs from a mailing-list service
#[async_trait]
pub trait MailingListApi: Send + Sync {
    /// Whether a credential is available; checked before any call is made
    fn is_configured(&self) -> bool;

    async fn create_subscriber(&self, subscriber: &NewSubscriber) -> Result<(), MailingListError>;

    async fn find_subscriber(&self, email: &str) -> Result<Option<Subscriber>, MailingListError>;

    async fn patch_subscriber(
        &self,
        id: &str,
        patch: &SubscriberPatch,
    ) -> Result<(), MailingListError>;
}

/// Map a failed create response onto the error taxonomy
pub fn classify_create_failure(status: StatusCode, body: &str) -> MailingListError {
    let lowered = body.to_lowercase();
    if ALREADY_SUBSCRIBED_MARKERS.iter().any(|m| lowered.contains(m)) {
        MailingListError::AlreadySubscribed(body.to_string())
    } else {
        MailingListError::Upstream(format!("Buttondown API error: {} - {}", status, body))
    }
}

#[derive(Debug, Clone)]
pub struct ButtondownClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Subscriber>,
}

impl ButtondownClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("SettlementWatch/1.0")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn auth_header(&self) -> Result<String, MailingListError> {
        self.api_key
            .as_ref()
            .map(|key| format!("Token {}", key))
            .ok_or(MailingListError::MissingCredential)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn transport_error(op: &str, e: reqwest::Error) -> MailingListError {
    MailingListError::Upstream(format!("Buttondown {} request failed: {}", op, e))
}

#[async_trait]
impl MailingListApi for ButtondownClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn create_subscriber(&self, subscriber: &NewSubscriber) -> Result<(), MailingListError> {
        let auth = self.auth_header()?;
        let resp = self
            .http
            .post(self.url("subscribers"))
            .header("Authorization", auth)
            .json(subscriber)
            .send()
            .await
            .map_err(|e| transport_error("create", e))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        debug!("Buttondown create returned {}: {}", status, body);
        Err(classify_create_failure(status, &body))
    }

    async fn find_subscriber(&self, email: &str) -> Result<Option<Subscriber>, MailingListError> {
        let auth = self.auth_header()?;
        let resp = self
            .http
            .get(self.url("subscribers"))
            .header("Authorization", auth)
            .query(&[("email", email)])
            .send()
            .await
            .map_err(|e| transport_error("search", e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MailingListError::Upstream(format!(
                "Buttondown search error: {} - {}",
                status, body
            )));
        }

        let search: SearchResponse = resp.json().await.map_err(|e| {
            MailingListError::Upstream(format!("Failed to parse Buttondown search: {}", e))
        })?;
        Ok(pick_subscriber(search.results, email))
    }

    async fn patch_subscriber(
        &self,
        id: &str,
        patch: &SubscriberPatch,
    ) -> Result<(), MailingListError> {
        let auth = self.auth_header()?;
        let resp = self
            .http
            .patch(self.url(&format!("subscribers/{}", id)))
            .header("Authorization", auth)
            .json(patch)
            .send()
            .await
            .map_err(|e| transport_error("patch", e))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(MailingListError::Upstream(format!(
            "Buttondown patch error: {} - {}",
            status, body
        )))
    }
}

/// The result whose email matches case-insensitively; other records are never picked
fn pick_subscriber(results: Vec<Subscriber>, email: &str) -> Option<Subscriber> {
    results
        .into_iter()
        .find(|s| s.email.eq_ignore_ascii_case(email))
}

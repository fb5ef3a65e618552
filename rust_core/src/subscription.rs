//! Settlement subscription reconciliation.
//!
//! Makes sure the mailing-list service holds a subscriber for an email that
//! carries the settlement tag and its `settlement_<tag>` metadata entry.
//! A new email is created; an existing one is merged and patched by id.

use crate::clients::buttondown::{MailingListApi, MailingListError};
use crate::models::{Disposition, NewSubscriber, SettlementRecord, SubscriberPatch};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("Invalid subscription request: {0}")]
    Validation(String),

    #[error("Mailing list is not configured: {0}")]
    Configuration(String),

    #[error("Subscriber not found: {0}")]
    NotFound(String),

    #[error("Mailing list error: {0}")]
    Upstream(String),
}

impl SubscriptionError {
    /// True when the caller sent bad input (as opposed to a server-side failure)
    pub fn is_client_error(&self) -> bool {
        matches!(self, SubscriptionError::Validation(_))
    }
}

impl From<MailingListError> for SubscriptionError {
    fn from(e: MailingListError) -> Self {
        match e {
            MailingListError::MissingCredential => SubscriptionError::Configuration(e.to_string()),
            MailingListError::AlreadySubscribed(msg) | MailingListError::Upstream(msg) => {
                SubscriptionError::Upstream(msg)
            }
        }
    }
}

/// Trimmed, validated subscribe inputs
#[derive(Debug, Clone, PartialEq)]
struct ValidRequest<'a> {
    email: &'a str,
    tag: &'a str,
    name: &'a str,
    deadline: Option<&'a str>,
}

fn validate<'a>(
    email: &'a str,
    tag: &'a str,
    name: &'a str,
    deadline: Option<&'a str>,
) -> Result<ValidRequest<'a>, SubscriptionError> {
    let email = email.trim();
    let tag = tag.trim();
    let name = name.trim();

    if !email.contains('@') {
        return Err(SubscriptionError::Validation(
            "a valid email address is required".to_string(),
        ));
    }
    if tag.is_empty() {
        return Err(SubscriptionError::Validation(
            "a settlement tag is required".to_string(),
        ));
    }
    if name.is_empty() {
        return Err(SubscriptionError::Validation(
            "a settlement name is required".to_string(),
        ));
    }

    Ok(ValidRequest {
        email,
        tag,
        name,
        deadline: deadline.map(str::trim).filter(|d| !d.is_empty()),
    })
}

pub struct SubscriptionReconciler {
    api: Arc<dyn MailingListApi>,
}

impl SubscriptionReconciler {
    pub fn new(api: Arc<dyn MailingListApi>) -> Self {
        Self { api }
    }

    pub async fn reconcile(
        &self,
        email: &str,
        tag: &str,
        name: &str,
        deadline: Option<&str>,
    ) -> Result<Disposition, SubscriptionError> {
        self.reconcile_at(email, tag, name, deadline, Utc::now())
            .await
    }

    pub async fn reconcile_at(
        &self,
        email: &str,
        tag: &str,
        name: &str,
        deadline: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Disposition, SubscriptionError> {
        let req = validate(email, tag, name, deadline)?;

        if !self.api.is_configured() {
            return Err(MailingListError::MissingCredential.into());
        }

        let record = SettlementRecord::new(req.name, req.deadline, now);
        let new_subscriber = NewSubscriber::for_settlement(req.email, req.tag, &record);

        match self.api.create_subscriber(&new_subscriber).await {
            Ok(()) => {
                info!("Created subscriber for settlement {}", req.tag);
                Ok(Disposition::Created)
            }
            Err(MailingListError::AlreadySubscribed(_)) => {
                self.merge_existing(&req, &record).await?;
                info!("Updated existing subscriber for settlement {}", req.tag);
                Ok(Disposition::Updated)
            }
            Err(e) => {
                error!("Subscriber create failed for settlement {}: {}", req.tag, e);
                Err(e.into())
            }
        }
    }

    async fn merge_existing(
        &self,
        req: &ValidRequest<'_>,
        record: &SettlementRecord,
    ) -> Result<(), SubscriptionError> {
        let mut subscriber = self
            .api
            .find_subscriber(req.email)
            .await
            .map_err(|e| {
                error!("Subscriber search failed: {}", e);
                SubscriptionError::from(e)
            })?
            .ok_or_else(|| {
                error!("Create reported a duplicate but search found no subscriber");
                SubscriptionError::NotFound(
                    "mailing list reported an existing subscriber that search could not find"
                        .to_string(),
                )
            })?;

        subscriber.merge_settlement(req.tag, record);

        self.api
            .patch_subscriber(&subscriber.id, &SubscriberPatch::from(&subscriber))
            .await
            .map_err(|e| {
                error!("Subscriber patch failed for {}: {}", subscriber.id, e);
                SubscriptionError::from(e)
            })
    }
}

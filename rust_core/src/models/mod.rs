// Shared models for the settlement watch services
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Spread added to the benchmark series to approximate a retail rate
pub const RATE_SPREAD: f64 = 0.5;

/// Display rate served when the upstream series cannot be used
pub const FALLBACK_RATE_PERCENT: f64 = 5.5;

/// Source marker carried by fallback quotes
pub const FALLBACK_SOURCE: &str = "fallback";

/// Prefix of the per-settlement metadata key on a subscriber
pub const SETTLEMENT_KEY_PREFIX: &str = "settlement_";

// ============================================================================
// Rate Quotes
// ============================================================================

/// A single dated sample from the upstream series.
///
/// `value` is the raw upstream text; the missing-data sentinel `"."` and
/// empty strings are stored as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: String,
    pub value: Option<String>,
}

impl Observation {
    pub fn new(date: impl Into<String>, value: &str) -> Self {
        let value = match value.trim() {
            "" | "." => None,
            v => Some(v.to_string()),
        };
        Self {
            date: date.into(),
            value,
        }
    }
}

/// Mortgage rate quote served to callers. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateQuote {
    /// Raw value plus spread, rounded to one decimal
    pub rate_percent: f64,
    /// Unmodified upstream observation (None for fallback quotes)
    pub raw_percent: Option<f64>,
    pub adjusted_added: f64,
    pub observation_date: Option<String>,
    /// Upstream series id, or "fallback"
    pub source: String,
}

impl RateQuote {
    /// Build a quote from a raw benchmark observation.
    pub fn from_observation(raw: f64, observation_date: &str, series_id: &str) -> Self {
        Self {
            rate_percent: display_rate(raw),
            raw_percent: Some(raw),
            adjusted_added: RATE_SPREAD,
            observation_date: Some(observation_date.to_string()),
            source: series_id.to_string(),
        }
    }

    pub fn fallback() -> Self {
        Self {
            rate_percent: FALLBACK_RATE_PERCENT,
            raw_percent: None,
            adjusted_added: RATE_SPREAD,
            observation_date: None,
            source: FALLBACK_SOURCE.to_string(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == FALLBACK_SOURCE
    }
}

/// `round((raw + spread) * 10) / 10`, halves rounding toward +infinity
pub fn display_rate(raw: f64) -> f64 {
    ((raw + RATE_SPREAD) * 10.0 + 0.5).floor() / 10.0
}

// ============================================================================
// Subscribers
// ============================================================================

/// Subscriber record as held by the mailing-list service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: String,
    #[serde(alias = "email_address")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Upstream sends `null` for empty tags/metadata on some records
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Subscriber {
    /// Add `tag` if missing and set the settlement entry for it.
    /// Other tags and metadata keys are left untouched.
    pub fn merge_settlement(&mut self, tag: &str, record: &SettlementRecord) {
        if !self.tags.iter().any(|t| t == tag) {
            self.tags.push(tag.to_string());
        }
        self.metadata.insert(
            settlement_key(tag),
            serde_json::Value::String(record.to_metadata_value()),
        );
    }

    pub fn settlement(&self, tag: &str) -> Option<SettlementRecord> {
        match self.metadata.get(&settlement_key(tag))? {
            serde_json::Value::String(raw) => serde_json::from_str(raw).ok(),
            other => serde_json::from_value(other.clone()).ok(),
        }
    }
}

/// What a subscriber opted into for one settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRecord {
    pub name: String,
    pub deadline: Option<String>,
    pub subscribed_at: String,
}

impl SettlementRecord {
    pub fn new(name: &str, deadline: Option<&str>, subscribed_at: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            deadline: deadline.map(str::to_string),
            subscribed_at: subscribed_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Serialized form stored under `settlement_<tag>`
    pub fn to_metadata_value(&self) -> String {
        // Three string/option fields always serialize
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub fn settlement_key(tag: &str) -> String {
    format!("{}{}", SETTLEMENT_KEY_PREFIX, tag)
}

/// Body of a create-subscriber call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSubscriber {
    pub email: String,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl NewSubscriber {
    pub fn for_settlement(email: &str, tag: &str, record: &SettlementRecord) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(
            settlement_key(tag),
            serde_json::Value::String(record.to_metadata_value()),
        );
        Self {
            email: email.to_string(),
            tags: vec![tag.to_string()],
            metadata,
        }
    }
}

/// Body of a patch-subscriber call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriberPatch {
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl From<&Subscriber> for SubscriberPatch {
    fn from(subscriber: &Subscriber) -> Self {
        Self {
            tags: subscriber.tags.clone(),
            metadata: subscriber.metadata.clone(),
        }
    }
}

/// Which reconciliation path a subscribe request took
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Created,
    Updated,
}

impl Disposition {
    /// User-facing confirmation for this outcome
    pub fn message(&self, settlement_name: &str) -> String {
        match self {
            Disposition::Created => format!(
                "You're subscribed. We'll email you about the {} settlement.",
                settlement_name
            ),
            Disposition::Updated => format!(
                "You're already on our list. We added the {} settlement to your alerts.",
                settlement_name
            ),
        }
    }
}

//! Settlement Watch Core - rate quotes and subscription reconciliation.
//!
//! This module provides:
//! - A cached mortgage rate quote derived from a FRED series, with a fixed fallback
//! - Reconciliation of settlement subscriptions against a Buttondown mailing list
//! - The upstream client adapters behind both, as injectable traits

pub mod clients;
pub mod models;
pub mod quote_cache;
pub mod subscription;

pub use models::{Disposition, RateQuote};
pub use quote_cache::RateQuoteCache;
pub use subscription::{SubscriptionError, SubscriptionReconciler};

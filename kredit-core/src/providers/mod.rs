//! Payment provider adapters.
//!
//! Each provider implements [`PaymentProvider`] so the settlement
//! coordinator can open and inspect orders without knowing which gateway is
//! behind it:
//!
//! - [`RazorpayProvider`]: static key pair, HTTP basic auth on every call.
//! - [`PayPalProvider`]: OAuth2 client-credentials exchange for a bearer
//!   token, cached until shortly before it expires.
//!
//! The provider is chosen once from configuration via [`from_config`].

pub mod paypal;
pub mod razorpay;

pub use paypal::PayPalProvider;
pub use razorpay::RazorpayProvider;

use crate::config::{PaymentConfig, ProviderSettings};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Timeout applied to every provider HTTP call.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while talking to a payment provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport failure, timeout, rate limit or provider-side outage.
    /// The same request may succeed later.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The provider refused the request (validation or authentication).
    #[error("provider rejected the request: {0}")]
    Rejected(String),

    /// The provider does not know this order.
    #[error("order not found: {0}")]
    OrderNotFound(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Unavailable(e.to_string())
    }
}

/// Provider-side order status, reduced to what settlement cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    /// Opened but not (yet) paid.
    Created,
    /// Payment captured.
    Paid,
    /// Anything else (expired, voided, failed, ...).
    Other,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Created => write!(f, "created"),
            OrderStatus::Paid => write!(f, "paid"),
            OrderStatus::Other => write!(f, "other"),
        }
    }
}

/// Parameters for opening a payable order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOrder {
    /// Price in major currency units.
    pub amount: i64,
    pub currency: String,
    /// Correlation reference echoed back by the provider (the transaction id).
    pub reference: Uuid,
}

/// An order opened at the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRef {
    pub order_id: String,
    /// Amount in the provider's minor currency unit.
    pub amount_minor: i64,
    pub currency: String,
    /// Where the payer approves the order, for redirect-based providers.
    pub approval_url: Option<String>,
}

/// Current state of a provider order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedOrder {
    pub order_id: String,
    pub status: OrderStatus,
    /// Correlation reference the order was created with, if echoed.
    pub reference: Option<String>,
}

/// Capability set shared by all payment providers.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Ask the provider to open a payable order.
    async fn create_order(&self, request: CreateOrder) -> Result<OrderRef, ProviderError>;

    /// Query the current state of an order.
    async fn fetch_order_status(&self, order_id: &str) -> Result<FetchedOrder, ProviderError>;
}

pub type DynPaymentProvider = Arc<dyn PaymentProvider>;

/// Build the configured provider.
pub fn from_config(config: &PaymentConfig) -> DynPaymentProvider {
    match &config.provider {
        ProviderSettings::Razorpay(creds) => Arc::new(RazorpayProvider::new(
            creds.key_id.clone(),
            creds.key_secret.clone(),
            creds.base_url.clone(),
        )),
        ProviderSettings::PayPal(creds) => Arc::new(PayPalProvider::new(
            creds.client_id.clone(),
            creds.client_secret.clone(),
            creds.base_url.clone(),
        )),
    }
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(PROVIDER_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Map a non-success HTTP status to an error kind.
pub(crate) fn classify_failure(status: StatusCode, detail: String) -> ProviderError {
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        ProviderError::Unavailable(format!("status {status}: {detail}"))
    } else {
        ProviderError::Rejected(format!("status {status}: {detail}"))
    }
}

/// Provider order ids are opaque, but they end up in a URL path.
pub(crate) fn is_valid_order_id(order_id: &str) -> bool {
    !order_id.is_empty()
        && order_id.len() <= 64
        && order_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Convert a major-unit price to minor units (two decimal places).
pub(crate) fn to_minor_units(amount: i64) -> Result<i64, ProviderError> {
    amount
        .checked_mul(100)
        .filter(|minor| *minor > 0)
        .ok_or_else(|| ProviderError::Rejected(format!("invalid amount: {amount}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure(StatusCode::SERVICE_UNAVAILABLE, String::new()),
            ProviderError::Unavailable(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, String::new()),
            ProviderError::Unavailable(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, String::new()),
            ProviderError::Rejected(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::UNAUTHORIZED, String::new()),
            ProviderError::Rejected(_)
        ));
    }

    #[test]
    fn test_order_id_validation() {
        assert!(is_valid_order_id("order_IluGWxBm9U8zJ8"));
        assert!(is_valid_order_id("5O190127TN364715T"));
        assert!(!is_valid_order_id(""));
        assert!(!is_valid_order_id("../v1/payments"));
        assert!(!is_valid_order_id("order?id=1"));
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(10).unwrap(), 1000);
        assert!(to_minor_units(0).is_err());
        assert!(to_minor_units(i64::MAX).is_err());
    }
}

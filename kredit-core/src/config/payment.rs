//! Payment provider configuration.

use url::Url;

/// Payment settings: the currency orders are opened in and the provider
/// that opens them.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// ISO 4217 currency code, e.g. `INR`.
    pub currency: String,
    pub provider: ProviderSettings,
}

/// The configured payment provider and its credentials.
#[derive(Debug, Clone)]
pub enum ProviderSettings {
    Razorpay(RazorpayCredentials),
    PayPal(PayPalCredentials),
}

impl ProviderSettings {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderSettings::Razorpay(_) => "razorpay",
            ProviderSettings::PayPal(_) => "paypal",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RazorpayCredentials {
    pub key_id: String,
    pub key_secret: String,
    /// API root.
    pub base_url: Url,
}

#[derive(Debug, Clone)]
pub struct PayPalCredentials {
    pub client_id: String,
    pub client_secret: String,
    /// API root (sandbox or live).
    pub base_url: Url,
}

//! TOML file configuration structures.
//!
//! These structs directly map to the `kredit-config.toml` file format.

use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub payment: PaymentConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// Session token section.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Secret used to sign session tokens.
    pub secret: String,
    /// Token lifetime in seconds.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

fn default_token_ttl() -> u64 {
    kredit_sdk::session::DEFAULT_TOKEN_TTL.unsigned_abs()
}

/// Payment section.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// ISO 4217 currency code orders are opened in.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Which of the provider sections below is active.
    pub provider: ProviderKind,
    pub razorpay: Option<RazorpayConfig>,
    pub paypal: Option<PayPalConfig>,
}

fn default_currency() -> String {
    "INR".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Razorpay,
    PayPal,
}

/// Razorpay key pair.
#[derive(Debug, Clone, Deserialize)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    /// Override the API root (mostly for testing).
    pub base_url: Option<Url>,
}

/// PayPal REST app credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Use the sandbox environment instead of live.
    #[serde(default = "default_sandbox")]
    pub sandbox: bool,
    /// Override the API root. Takes precedence over `sandbox`.
    pub base_url: Option<Url>,
}

fn default_sandbox() -> bool {
    true
}

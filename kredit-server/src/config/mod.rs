//! Configuration module for kredit-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;

use crate::config::file::{FileConfig, PaymentConfig as FilePaymentConfig, ProviderKind};
use kredit_core::config::{
    AuthConfig, PayPalCredentials, PaymentConfig, ProviderSettings, RazorpayCredentials,
    ServerConfig,
};
use kredit_core::providers::{PayPalProvider, RazorpayProvider};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Shortest accepted session secret, in bytes.
const MIN_SECRET_LEN: usize = 16;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
#[derive(Debug)]
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub payment: PaymentConfig,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate and convert into runtime types
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.load_str(&config_content)
    }

    fn load_str(&self, config_content: &str) -> Result<LoadedConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;

        Ok(LoadedConfig {
            server: ServerConfig {
                listen: file_config.server.listen,
            },
            auth: AuthConfig::new(
                file_config.auth.secret.into_bytes().into_boxed_slice(),
                Duration::from_secs(file_config.auth.token_ttl_secs),
            ),
            payment: convert_payment(file_config.payment)?,
        })
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.auth.secret.len() < MIN_SECRET_LEN {
        return Err(ConfigError::ValidationError(format!(
            "auth.secret must be at least {MIN_SECRET_LEN} bytes"
        )));
    }
    if config.auth.token_ttl_secs == 0 {
        return Err(ConfigError::ValidationError(
            "auth.token_ttl_secs must be positive".to_string(),
        ));
    }

    let currency = &config.payment.currency;
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ConfigError::ValidationError(format!(
            "payment.currency must be a three-letter ISO code, got {currency:?}"
        )));
    }
    Ok(())
}

fn convert_payment(p: FilePaymentConfig) -> Result<PaymentConfig, ConfigError> {
    let provider = match p.provider {
        ProviderKind::Razorpay => {
            let section = p.razorpay.ok_or_else(|| missing_section("razorpay"))?;
            require_non_empty("payment.razorpay.key_id", &section.key_id)?;
            require_non_empty("payment.razorpay.key_secret", &section.key_secret)?;
            ProviderSettings::Razorpay(RazorpayCredentials {
                key_id: section.key_id,
                key_secret: section.key_secret,
                base_url: match section.base_url {
                    Some(url) => api_root(url),
                    None => parse_default_url(RazorpayProvider::API_URL)?,
                },
            })
        }
        ProviderKind::PayPal => {
            let section = p.paypal.ok_or_else(|| missing_section("paypal"))?;
            require_non_empty("payment.paypal.client_id", &section.client_id)?;
            require_non_empty("payment.paypal.client_secret", &section.client_secret)?;
            let default_url = if section.sandbox {
                PayPalProvider::SANDBOX_URL
            } else {
                PayPalProvider::LIVE_URL
            };
            ProviderSettings::PayPal(PayPalCredentials {
                client_id: section.client_id,
                client_secret: section.client_secret,
                base_url: match section.base_url {
                    Some(url) => api_root(url),
                    None => parse_default_url(default_url)?,
                },
            })
        }
    };

    Ok(PaymentConfig {
        currency: p.currency,
        provider,
    })
}

fn missing_section(name: &str) -> ConfigError {
    ConfigError::ValidationError(format!(
        "payment.provider is {name:?} but [payment.{name}] is missing"
    ))
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::ValidationError(format!("{field} must not be empty")));
    }
    Ok(())
}

fn parse_default_url(url: &str) -> Result<Url, ConfigError> {
    Url::parse(url).map_err(|e| ConfigError::ValidationError(format!("invalid URL {url}: {e}")))
}

/// Ensure a configured API root ends in `/`.
///
/// Provider endpoints are joined onto the root as relative paths, and
/// `Url::join` replaces the last segment of a root without the slash.
fn api_root(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

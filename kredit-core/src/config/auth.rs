//! Session token configuration.

use std::time::Duration;

/// Secret and lifetime for signing session tokens.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret key bytes for HMAC signing.
    pub secret: Box<[u8]>,
    /// How long an issued token stays valid.
    pub token_ttl: Duration,
}

impl AuthConfig {
    /// Create a new AuthConfig.
    pub fn new(secret: impl Into<Box<[u8]>>, token_ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            token_ttl,
        }
    }

    /// Get the secret key bytes for HMAC signing.
    pub fn secret_bytes(&self) -> &[u8] {
        &self.secret
    }
}

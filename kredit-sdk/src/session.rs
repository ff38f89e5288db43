//! Session token signing and verification.
//!
//! A session token binds a user id to the moment it was issued:
//!
//! ```text
//! {user_id}.{issued_at}.{base64_signature}
//! ```
//!
//! where the signature is `HMAC-SHA256("{user_id}.{issued_at}", secret)`.
//! Clients send it as `Authorization: Bearer {token}`.

use uuid::Uuid;

/// Authorization scheme expected in the `Authorization` header.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Default token lifetime (in seconds).
pub const DEFAULT_TOKEN_TTL: i64 = 7 * 24 * 60 * 60;

/// Errors produced by token verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token format")]
    InvalidFormat,
    #[error("invalid base64 encoding")]
    InvalidBase64,
    #[error("invalid signature")]
    SignatureMismatch,
    #[error("token expired")]
    Expired,
}

impl From<ring::error::Unspecified> for TokenError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::SignatureMismatch
    }
}

/// Issue a token for `user_id`, stamped with the current time.
pub fn issue(user_id: Uuid, key: &[u8]) -> String {
    issue_at(user_id, time::OffsetDateTime::now_utc().unix_timestamp(), key)
}

/// Issue a token for `user_id` with an explicit issue timestamp.
pub fn issue_at(user_id: Uuid, issued_at: i64, key: &[u8]) -> String {
    let data = format!("{user_id}.{issued_at}");
    let sig = ring::hmac::sign(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
        data.as_bytes(),
    );
    format!(
        "{data}.{}",
        fast32::base64::RFC4648_NOPAD.encode(sig.as_ref())
    )
}

/// Verify a token and return the user id it was issued for.
pub fn verify(token: &str, key: &[u8], ttl_secs: i64) -> Result<Uuid, TokenError> {
    let mut parts = token.splitn(3, '.');
    let (Some(user_part), Some(issued_part), Some(sig_part)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::InvalidFormat);
    };

    let user_id = Uuid::parse_str(user_part).map_err(|_| TokenError::InvalidFormat)?;
    let issued_at: i64 = issued_part
        .parse()
        .map_err(|_| TokenError::InvalidFormat)?;
    let signature = fast32::base64::RFC4648_NOPAD
        .decode_str(sig_part)
        .map_err(|_| TokenError::InvalidBase64)?;

    let data = format!("{user_part}.{issued_part}");
    ring::hmac::verify(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
        data.as_bytes(),
        &signature,
    )?;

    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    if now - issued_at > ttl_secs {
        return Err(TokenError::Expired);
    }
    Ok(user_id)
}

/// Extract the token from an `Authorization` header value.
pub fn strip_bearer(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

//! Custom Axum extractors for request authentication.
//!
//! Provides `AuthUser`, which verifies the session token carried in the
//! `Authorization: Bearer {token}` header and yields the user id it was
//! issued for. Token cryptography lives in [`kredit_sdk::session`].

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use kredit_sdk::objects::ApiFailure;
use kredit_sdk::session::{self, TokenError};
use uuid::Uuid;

use crate::state::AppState;

/// The authenticated caller.
///
/// Handlers take the user id from here and never from the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Uuid);

/// Errors returned by the [`AuthUser`] extractor.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    InvalidHeader,
    InvalidToken,
    Expired,
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidFormat | TokenError::InvalidBase64 => Self::InvalidHeader,
            TokenError::SignatureMismatch => Self::InvalidToken,
            TokenError::Expired => Self::Expired,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingToken => "Not Authorized. Login Again",
            AuthError::InvalidHeader => "Malformed session token",
            AuthError::InvalidToken => "Invalid session token",
            AuthError::Expired => "Session expired. Login Again",
        };
        (StatusCode::UNAUTHORIZED, Json(ApiFailure::new(message))).into_response()
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingToken)?
            .to_str()
            .map_err(|_| AuthError::InvalidHeader)?;

        let token = session::strip_bearer(header_value).ok_or(AuthError::MissingToken)?;
        let user_id = session::verify(token, state.auth.secret_bytes(), state.token_ttl_secs())?;

        Ok(AuthUser(user_id))
    }
}

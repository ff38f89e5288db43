use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{Json, extract::State, extract::rejection::JsonRejection, response::IntoResponse};
use kredit_sdk::objects::{AuthResponse, LoginRequest, UserSummary};
use kredit_sdk::session;

use super::UserApiError;
use crate::state::AppState;

/// `POST /login`: exchange email and password for a session token.
pub(super) async fn login(
    state: State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, UserApiError> {
    let Json(request) = payload?;
    let email = request.email.trim().to_lowercase();
    if email.is_empty() || request.password.is_empty() {
        return Err(UserApiError::MissingDetails);
    }

    let user = state
        .users
        .find_user_by_email(&email)
        .await?
        .ok_or(UserApiError::UserDoesNotExist)?;

    let parsed =
        PasswordHash::new(&user.password_hash).map_err(|e| UserApiError::Hash(e.to_string()))?;
    if Argon2::default()
        .verify_password(request.password.as_bytes(), &parsed)
        .is_err()
    {
        tracing::debug!(user_id = %user.id, "Login with wrong password");
        return Err(UserApiError::InvalidCredentials);
    }

    Ok(Json(AuthResponse {
        success: true,
        token: session::issue(user.id, state.auth.secret_bytes()),
        user: UserSummary { name: user.name },
    }))
}

use axum::{Json, extract::State, extract::rejection::JsonRejection, response::IntoResponse};
use kredit_core::ledger::{LedgerError, NewUser};
use kredit_sdk::objects::{AuthResponse, RegisterRequest, UserSummary};
use kredit_sdk::session;

use super::UserApiError;
use crate::state::AppState;

/// `POST /register`: create an account and sign the caller in.
pub(super) async fn register(
    state: State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, UserApiError> {
    let Json(request) = payload?;
    let name = request.name.trim();
    let email = request.email.trim().to_lowercase();
    if name.is_empty() || email.is_empty() || request.password.is_empty() {
        return Err(UserApiError::MissingDetails);
    }

    let password_hash = hash_password(&request.password)?;

    let user = state
        .users
        .create_user(NewUser {
            name: name.to_owned(),
            email,
            password_hash,
        })
        .await
        .map_err(|e| match e {
            LedgerError::DuplicateEmail => UserApiError::EmailTaken,
            other => UserApiError::Storage(other),
        })?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok(Json(AuthResponse {
        success: true,
        token: session::issue(user.id, state.auth.secret_bytes()),
        user: UserSummary { name: user.name },
    }))
}

fn hash_password(password: &str) -> Result<String, UserApiError> {
    use argon2::{
        Argon2, PasswordHasher,
        password_hash::{SaltString, rand_core::OsRng},
    };

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserApiError::Hash(e.to_string()))
}

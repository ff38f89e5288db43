use axum::{Json, extract::State, response::IntoResponse};
use kredit_core::settlement::SettlementError;
use kredit_sdk::objects::{CreditsResponse, UserSummary};

use super::UserApiError;
use crate::api::extractors::AuthUser;
use crate::state::AppState;

/// `GET /credits`: the caller's balance.
pub(super) async fn credits(
    state: State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse, UserApiError> {
    let user = state
        .users
        .get_user(user_id)
        .await?
        .ok_or(SettlementError::UnknownUser)?;
    let credits = state.coordinator.balance(user_id).await?;

    Ok(Json(CreditsResponse {
        success: true,
        credits,
        user: UserSummary { name: user.name },
    }))
}

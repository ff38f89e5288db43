use axum::{Json, extract::State, extract::rejection::JsonRejection, response::IntoResponse};
use kredit_sdk::objects::{VerifyPaymentRequest, VerifyPaymentResponse};

use super::UserApiError;
use crate::state::AppState;

/// `POST /verify`: check an order with the provider and settle it.
///
/// Needs no session: the provider's answer is the only thing trusted, and
/// the credited user is the one who opened the order.
pub(super) async fn verify(
    state: State<AppState>,
    payload: Result<Json<VerifyPaymentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, UserApiError> {
    let Json(request) = payload?;

    let settled = state
        .coordinator
        .verify(&request.order_id, request.plan_id.as_deref())
        .await?;

    Ok(Json(VerifyPaymentResponse {
        success: true,
        credited: true,
        credits_added: settled.credits_added,
        new_balance: settled.new_balance,
    }))
}

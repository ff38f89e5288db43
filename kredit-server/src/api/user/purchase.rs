use axum::{Json, extract::State, extract::rejection::JsonRejection, response::IntoResponse};
use kredit_sdk::objects::{InitiatePurchaseRequest, InitiatePurchaseResponse, OrderDetail};

use super::UserApiError;
use crate::api::extractors::AuthUser;
use crate::state::AppState;

/// `POST /purchase`: open a provider order for a plan.
///
/// The body only names the plan; amounts come from the catalog.
pub(super) async fn purchase(
    state: State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<InitiatePurchaseRequest>, JsonRejection>,
) -> Result<impl IntoResponse, UserApiError> {
    let Json(request) = payload?;

    let purchase = state.coordinator.initiate(user_id, &request.plan_id).await?;

    Ok(Json(InitiatePurchaseResponse {
        success: true,
        transaction_id: purchase.transaction_id,
        plan: purchase.terms.plan.into(),
        credits: purchase.terms.credits,
        order: OrderDetail {
            order_id: purchase.order.order_id,
            amount: purchase.order.amount_minor,
            currency: purchase.order.currency,
            approval_url: purchase.order.approval_url,
        },
    }))
}

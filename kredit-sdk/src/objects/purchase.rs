//! Purchase and payment verification types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::plans::PlanId;

/// Request body for `POST /api/user/purchase`.
///
/// Only the plan identifier is accepted. Credit and price amounts always
/// come from the server-side plan catalog; extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InitiatePurchaseRequest {
    pub plan_id: String,
}

/// The provider-side order the user has to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetail {
    /// Provider order identifier, passed back to `verify`.
    pub order_id: String,
    /// Amount in the provider's minor currency unit.
    pub amount: i64,
    pub currency: String,
    /// Where to send the user to approve the payment, for redirect-based
    /// providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_url: Option<String>,
}

/// Returned after a purchase has been initiated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiatePurchaseResponse {
    pub success: bool,
    pub transaction_id: Uuid,
    pub plan: PlanId,
    pub credits: i64,
    pub order: OrderDetail,
}

/// Request body for `POST /api/user/verify`.
///
/// `plan_id` is accepted for compatibility with older clients but never
/// influences how many credits are granted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
}

/// Returned after a successful settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub credited: bool,
    pub credits_added: i64,
    pub new_balance: i64,
}

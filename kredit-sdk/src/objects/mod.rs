pub mod plans;
pub mod purchase;
pub mod user;

pub use plans::PlanId;
pub use purchase::{
    InitiatePurchaseRequest, InitiatePurchaseResponse, OrderDetail, VerifyPaymentRequest,
    VerifyPaymentResponse,
};
pub use user::{AuthResponse, CreditsResponse, LoginRequest, RegisterRequest, UserSummary};

use serde::{Deserialize, Serialize};

/// Body returned by every endpoint when a request fails.
///
/// `success` is always `false`; `message` is a human-readable reason that is
/// safe to show to the end user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiFailure {
    pub success: bool,
    pub message: String,
}

impl ApiFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

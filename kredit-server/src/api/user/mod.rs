//! User API handlers.
//!
//! # Endpoints
//!
//! - `POST /register` – create an account, returns a session token
//! - `POST /login`    – exchange credentials for a session token
//! - `GET  /credits`  – current balance (bearer token)
//! - `POST /purchase` – start buying a plan (bearer token)
//! - `POST /verify`   – confirm a provider order and settle it
//!
//! Every failure is reported as `{success: false, message}`.

use axum::{
    Json, Router,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use kredit_core::ledger::LedgerError;
use kredit_core::settlement::SettlementError;
use kredit_sdk::objects::ApiFailure;

use crate::state::AppState;

mod credits;
mod login;
mod purchase;
mod register;
mod verify;

/// Build the User API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register::register))
        .route("/login", post(login::login))
        .route("/credits", get(credits::credits))
        .route("/purchase", post(purchase::purchase))
        .route("/verify", post(verify::verify))
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors that can occur in User API handlers.
#[derive(Debug)]
enum UserApiError {
    /// The request body could not be read as JSON.
    MalformedBody(JsonRejection),
    /// A required registration or login field is empty.
    MissingDetails,
    /// Registration with an email that is already taken.
    EmailTaken,
    /// Login with an unknown email.
    UserDoesNotExist,
    /// Login with a wrong password.
    InvalidCredentials,
    /// Password hashing failed.
    Hash(String),
    /// Storage failed outside the settlement path.
    Storage(LedgerError),
    Settlement(SettlementError),
}

impl From<SettlementError> for UserApiError {
    fn from(e: SettlementError) -> Self {
        UserApiError::Settlement(e)
    }
}

impl From<LedgerError> for UserApiError {
    fn from(e: LedgerError) -> Self {
        UserApiError::Storage(e)
    }
}

impl From<JsonRejection> for UserApiError {
    fn from(e: JsonRejection) -> Self {
        UserApiError::MalformedBody(e)
    }
}

fn failure(status: StatusCode, message: &str) -> Response {
    (status, Json(ApiFailure::new(message))).into_response()
}

fn internal_error() -> Response {
    failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

impl IntoResponse for UserApiError {
    fn into_response(self) -> Response {
        match self {
            UserApiError::MalformedBody(rejection) => {
                (rejection.status(), Json(ApiFailure::new(rejection.body_text()))).into_response()
            }
            UserApiError::MissingDetails => failure(StatusCode::BAD_REQUEST, "Missing Details"),
            UserApiError::EmailTaken => failure(StatusCode::CONFLICT, "User already exists"),
            UserApiError::UserDoesNotExist => failure(StatusCode::NOT_FOUND, "User does not exist"),
            UserApiError::InvalidCredentials => {
                failure(StatusCode::UNAUTHORIZED, "Invalid credentials")
            }
            UserApiError::Hash(e) => {
                tracing::error!(error = %e, "Password hashing failed");
                internal_error()
            }
            UserApiError::Storage(e) => {
                tracing::error!(error = %e, "User API storage error");
                internal_error()
            }
            UserApiError::Settlement(e) => settlement_response(e),
        }
    }
}

fn settlement_response(e: SettlementError) -> Response {
    match e {
        SettlementError::InvalidPlan => failure(StatusCode::BAD_REQUEST, "Plan not found"),
        SettlementError::UnknownUser => failure(StatusCode::NOT_FOUND, "User not found"),
        SettlementError::ProviderUnavailable => failure(
            StatusCode::SERVICE_UNAVAILABLE,
            "Payment provider unavailable, try again later",
        ),
        SettlementError::ProviderRejected => failure(
            StatusCode::BAD_GATEWAY,
            "Payment provider rejected the request",
        ),
        SettlementError::OrderNotFound => failure(StatusCode::NOT_FOUND, "Order not found"),
        SettlementError::UnknownTransaction => failure(
            StatusCode::NOT_FOUND,
            "Invalid transaction or already processed",
        ),
        SettlementError::AlreadyProcessed => failure(
            StatusCode::CONFLICT,
            "Invalid transaction or already processed",
        ),
        SettlementError::PaymentNotComplete => {
            failure(StatusCode::PAYMENT_REQUIRED, "Payment failed")
        }
        SettlementError::Storage(e) => {
            tracing::error!(error = %e, "Settlement storage error");
            internal_error()
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::server::build_router;
    use crate::state::AppState;
    use async_trait::async_trait;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use kredit_core::config::AuthConfig;
    use kredit_core::ledger::MemoryLedger;
    use kredit_core::providers::{
        CreateOrder, FetchedOrder, OrderRef, OrderStatus, PaymentProvider, ProviderError,
    };
    use kredit_core::settlement::SettlementCoordinator;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tower::ServiceExt;

    #[derive(Default)]
    struct StubProvider {
        orders: Mutex<HashMap<String, FetchedOrder>>,
    }

    impl StubProvider {
        fn mark_paid(&self, order_id: &str) {
            if let Some(order) = self.orders.lock().unwrap().get_mut(order_id) {
                order.status = OrderStatus::Paid;
            }
        }
    }

    #[async_trait]
    impl PaymentProvider for StubProvider {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn create_order(&self, request: CreateOrder) -> Result<OrderRef, ProviderError> {
            let mut orders = self.orders.lock().unwrap();
            let order_id = format!("order_{}", orders.len() + 1);
            orders.insert(
                order_id.clone(),
                FetchedOrder {
                    order_id: order_id.clone(),
                    status: OrderStatus::Created,
                    reference: Some(request.reference.to_string()),
                },
            );
            Ok(OrderRef {
                order_id,
                amount_minor: request.amount * 100,
                currency: request.currency,
                approval_url: None,
            })
        }

        async fn fetch_order_status(&self, order_id: &str) -> Result<FetchedOrder, ProviderError> {
            self.orders
                .lock()
                .unwrap()
                .get(order_id)
                .cloned()
                .ok_or_else(|| ProviderError::OrderNotFound(order_id.to_string()))
        }
    }

    fn app() -> (Router, Arc<StubProvider>) {
        let ledger = Arc::new(MemoryLedger::new());
        let provider = Arc::new(StubProvider::default());
        let coordinator =
            SettlementCoordinator::new(ledger.clone(), provider.clone(), "INR".to_string());
        let auth = AuthConfig::new(
            b"router-test-session-secret".to_vec(),
            Duration::from_secs(3600),
        );
        (
            build_router(AppState::new(ledger, coordinator, auth)),
            provider,
        )
    }

    async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn register(router: &Router, email: &str) -> String {
        let (status, body) = send(
            router,
            "POST",
            "/api/user/register",
            None,
            Some(json!({ "name": "Ada", "email": email, "password": "hunter2hunter2" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["name"], "Ada");
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = app();
        let (status, body) = send(&router, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let (router, _) = app();
        register(&router, "ada@example.com").await;

        let (status, body) = send(
            &router,
            "POST",
            "/api/user/register",
            None,
            Some(json!({ "name": "Ada", "email": "ada@example.com", "password": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);

        let (status, body) = send(
            &router,
            "POST",
            "/api/user/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "hunter2hunter2" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].as_str().is_some());

        let (status, body) = send(
            &router,
            "POST",
            "/api/user/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "wrong" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid credentials");

        let (status, body) = send(
            &router,
            "POST",
            "/api/user/login",
            None,
            Some(json!({ "email": "nobody@example.com", "password": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User does not exist");
    }

    #[tokio::test]
    async fn test_register_missing_details() {
        let (router, _) = app();
        let (status, body) = send(
            &router,
            "POST",
            "/api/user/register",
            None,
            Some(json!({ "email": "ada@example.com", "password": "hunter2" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "success": false, "message": "Missing Details" }));
    }

    #[tokio::test]
    async fn test_authenticated_routes_require_token() {
        let (router, _) = app();
        let (status, body) = send(&router, "GET", "/api/user/credits", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _) = send(
            &router,
            "POST",
            "/api/user/purchase",
            Some("not-a-token"),
            Some(json!({ "plan_id": "Basic" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_plan() {
        let (router, provider) = app();
        let token = register(&router, "ada@example.com").await;

        let (status, body) = send(
            &router,
            "POST",
            "/api/user/purchase",
            Some(&token),
            Some(json!({ "plan_id": "Gold" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Plan not found");
        assert!(provider.orders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purchase_and_verify_flow() {
        let (router, provider) = app();
        let token = register(&router, "ada@example.com").await;

        // Client-supplied amounts are ignored.
        let (status, body) = send(
            &router,
            "POST",
            "/api/user/purchase",
            Some(&token),
            Some(json!({ "plan_id": "Basic", "amount": 1, "credits": 99999 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["plan"], "Basic");
        assert_eq!(body["credits"], 100);
        assert_eq!(body["order"]["amount"], 1000);
        assert_eq!(body["order"]["currency"], "INR");
        let order_id = body["order"]["order_id"].as_str().unwrap().to_string();

        let verify_body = json!({ "order_id": order_id, "plan_id": "Basic" });
        let (status, body) = send(
            &router,
            "POST",
            "/api/user/verify",
            None,
            Some(verify_body.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["success"], false);

        provider.mark_paid(&order_id);
        let (status, body) = send(
            &router,
            "POST",
            "/api/user/verify",
            None,
            Some(verify_body.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["credited"], true);
        assert_eq!(body["credits_added"], 100);
        assert_eq!(body["new_balance"], 100);

        let (status, body) =
            send(&router, "POST", "/api/user/verify", None, Some(verify_body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);

        let (status, body) = send(&router, "GET", "/api/user/credits", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["credits"], 100);
        assert_eq!(body["user"]["name"], "Ada");
    }

    #[tokio::test]
    async fn test_verify_unknown_order() {
        let (router, _) = app();
        let (status, body) = send(
            &router,
            "POST",
            "/api/user/verify",
            None,
            Some(json!({ "order_id": "order_404" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Order not found");
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (router, _) = app();
        let (status, body) = send(
            &router,
            "POST",
            "/api/user/verify",
            None,
            Some(json!({ "plan_id": "Basic" })),
        )
        .await;
        assert!(status.is_client_error());
        assert_eq!(body["success"], false);
    }
}

//! Razorpay Orders API adapter.
//!
//! Authenticates every call with the merchant key pair (HTTP basic auth).
//! The transaction id travels in the order's `receipt` field.

use super::{
    CreateOrder, FetchedOrder, OrderRef, OrderStatus, PaymentProvider, ProviderError,
    classify_failure, http_client, is_valid_order_id, to_minor_units,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;
use url::Url;

pub struct RazorpayProvider {
    key_id: String,
    key_secret: String,
    base_url: Url,
    http_client: reqwest::Client,
}

impl RazorpayProvider {
    pub const API_URL: &str = "https://api.razorpay.com/";

    /// Create a new RazorpayProvider.
    ///
    /// # Arguments
    ///
    /// * `key_id` - Public key id (`rzp_live_...` / `rzp_test_...`)
    /// * `key_secret` - Secret paired with the key id
    /// * `base_url` - API root, normally [`Self::API_URL`]
    pub fn new(key_id: String, key_secret: String, base_url: Url) -> Self {
        Self {
            key_id,
            key_secret,
            base_url,
            http_client: http_client(),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(path)
            .map_err(|e| ProviderError::Rejected(format!("invalid endpoint {path}: {e}")))
    }

    async fn error_detail(response: reqwest::Response) -> String {
        #[derive(serde::Deserialize)]
        struct ErrorBody {
            error: ErrorDetail,
        }
        #[derive(serde::Deserialize)]
        struct ErrorDetail {
            #[serde(default)]
            code: String,
            #[serde(default)]
            description: String,
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => format!("{}: {}", parsed.error.code, parsed.error.description),
            Err(_) => body,
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct RazorpayOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
struct RazorpayOrder {
    id: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    receipt: Option<String>,
    status: String,
}

fn map_status(status: &str) -> OrderStatus {
    match status {
        "paid" => OrderStatus::Paid,
        "created" | "attempted" => OrderStatus::Created,
        _ => OrderStatus::Other,
    }
}

fn is_unknown_id(detail: &str) -> bool {
    detail.to_ascii_lowercase().contains("does not exist")
}

#[async_trait]
impl PaymentProvider for RazorpayProvider {
    fn name(&self) -> &'static str {
        "razorpay"
    }

    async fn create_order(&self, request: CreateOrder) -> Result<OrderRef, ProviderError> {
        let body = RazorpayOrderRequest {
            amount: to_minor_units(request.amount)?,
            currency: &request.currency,
            receipt: request.reference.to_string(),
        };

        let response = self
            .http_client
            .post(self.endpoint("v1/orders")?)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_failure(status, Self::error_detail(response).await));
        }

        let order: RazorpayOrder = response.json().await?;
        debug!(order_id = %order.id, receipt = ?order.receipt, "Razorpay order created");

        Ok(OrderRef {
            order_id: order.id,
            amount_minor: order.amount,
            currency: order.currency,
            approval_url: None,
        })
    }

    async fn fetch_order_status(&self, order_id: &str) -> Result<FetchedOrder, ProviderError> {
        if !is_valid_order_id(order_id) {
            return Err(ProviderError::OrderNotFound(order_id.to_owned()));
        }

        let response = self
            .http_client
            .get(self.endpoint(&format!("v1/orders/{order_id}"))?)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::OrderNotFound(order_id.to_owned()));
        }
        if !status.is_success() {
            let detail = Self::error_detail(response).await;
            // Unknown ids come back as 400 "The id provided does not exist".
            if status == StatusCode::BAD_REQUEST && is_unknown_id(&detail) {
                return Err(ProviderError::OrderNotFound(order_id.to_owned()));
            }
            return Err(classify_failure(status, detail));
        }

        let order: RazorpayOrder = response.json().await?;
        Ok(FetchedOrder {
            status: map_status(&order.status),
            order_id: order.id,
            reference: order.receipt.filter(|r| !r.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{basic_auth, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn provider(server: &MockServer) -> RazorpayProvider {
        RazorpayProvider::new(
            "rzp_test_key".to_string(),
            "rzp_secret".to_string(),
            Url::parse(&server.uri()).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_create_order_sends_minor_units_and_receipt() {
        let server = MockServer::start().await;
        let reference = Uuid::now_v7();

        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .and(basic_auth("rzp_test_key", "rzp_secret"))
            .and(body_partial_json(json!({
                "amount": 1000,
                "currency": "INR",
                "receipt": reference.to_string(),
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "order_ABC123",
                "entity": "order",
                "amount": 1000,
                "currency": "INR",
                "receipt": reference.to_string(),
                "status": "created",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let order = provider(&server)
            .await
            .create_order(CreateOrder {
                amount: 10,
                currency: "INR".to_string(),
                reference,
            })
            .await
            .unwrap();

        assert_eq!(order.order_id, "order_ABC123");
        assert_eq!(order.amount_minor, 1000);
        assert_eq!(order.approval_url, None);
    }

    #[tokio::test]
    async fn test_create_order_validation_error_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": "BAD_REQUEST_ERROR",
                    "description": "Currency is not supported",
                }
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .await
            .create_order(CreateOrder {
                amount: 10,
                currency: "XXX".to_string(),
                reference: Uuid::now_v7(),
            })
            .await
            .unwrap_err();

        match err {
            ProviderError::Rejected(detail) => assert!(detail.contains("Currency is not supported")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_order_outage_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = provider(&server)
            .await
            .create_order(CreateOrder {
                amount: 10,
                currency: "INR".to_string(),
                reference: Uuid::now_v7(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_fetch_paid_order() {
        let server = MockServer::start().await;
        let reference = Uuid::now_v7();
        Mock::given(method("GET"))
            .and(path("/v1/orders/order_ABC123"))
            .and(basic_auth("rzp_test_key", "rzp_secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "order_ABC123",
                "amount": 1000,
                "currency": "INR",
                "receipt": reference.to_string(),
                "status": "paid",
            })))
            .mount(&server)
            .await;

        let fetched = provider(&server)
            .await
            .fetch_order_status("order_ABC123")
            .await
            .unwrap();
        assert_eq!(fetched.status, OrderStatus::Paid);
        assert_eq!(fetched.reference, Some(reference.to_string()));
    }

    #[tokio::test]
    async fn test_fetch_attempted_order_is_not_paid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/orders/order_ABC123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "order_ABC123",
                "amount": 1000,
                "currency": "INR",
                "receipt": null,
                "status": "attempted",
            })))
            .mount(&server)
            .await;

        let fetched = provider(&server)
            .await
            .fetch_order_status("order_ABC123")
            .await
            .unwrap();
        assert_eq!(fetched.status, OrderStatus::Created);
        assert_eq!(fetched.reference, None);
    }

    #[tokio::test]
    async fn test_fetch_unknown_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/orders/order_missing"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": "BAD_REQUEST_ERROR",
                    "description": "The id provided does not exist",
                }
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .await
            .fetch_order_status("order_missing")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::OrderNotFound(_)));
    }

    #[tokio::test]
    async fn test_fetch_validation_error_is_not_a_missing_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/orders/order_ABC123"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": "BAD_REQUEST_ERROR",
                    "description": "Your account is not activated for live mode",
                }
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .await
            .fetch_order_status("order_ABC123")
            .await
            .unwrap_err();
        match err {
            ProviderError::Rejected(detail) => assert!(detail.contains("not activated")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_is_unknown_id() {
        assert!(is_unknown_id("BAD_REQUEST_ERROR: The id provided does not exist"));
        assert!(!is_unknown_id("BAD_REQUEST_ERROR: amount exceeds maximum amount allowed"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_path_like_ids_without_calling_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = provider(&server)
            .await
            .fetch_order_status("../payments/pay_1")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::OrderNotFound(_)));
    }
}

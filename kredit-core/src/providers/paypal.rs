//! PayPal Orders v2 adapter.
//!
//! Obtains a bearer token through the OAuth2 client-credentials flow and
//! reuses it until shortly before expiry. An order the buyer has approved is
//! captured on the next status check, so "paid" always means "captured".

use super::{
    CreateOrder, FetchedOrder, OrderRef, OrderStatus, PaymentProvider, ProviderError,
    classify_failure, http_client, is_valid_order_id, to_minor_units,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

/// Refresh the token this long before PayPal says it expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct PayPalProvider {
    client_id: String,
    client_secret: String,
    base_url: Url,
    http_client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl PayPalProvider {
    pub const SANDBOX_URL: &str = "https://api-m.sandbox.paypal.com/";
    pub const LIVE_URL: &str = "https://api-m.paypal.com/";

    pub fn new(client_id: String, client_secret: String, base_url: Url) -> Self {
        Self {
            client_id,
            client_secret,
            base_url,
            http_client: http_client(),
            token: Mutex::new(None),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(path)
            .map_err(|e| ProviderError::Rejected(format!("invalid endpoint {path}: {e}")))
    }

    /// Return a valid access token, exchanging credentials if needed.
    ///
    /// The lock is held across the exchange so concurrent callers share one
    /// token request.
    async fn access_token(&self) -> Result<String, ProviderError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(token.access_token.clone());
            }
        }

        #[derive(serde::Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: u64,
        }

        let response = self
            .http_client
            .post(self.endpoint("v1/oauth2/token")?)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_failure(
                status,
                format!("token exchange failed: {}", Self::error_detail(response).await),
            ));
        }

        let token: TokenResponse = response.json().await?;
        debug!(expires_in = token.expires_in, "Obtained PayPal access token");
        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(access_token)
    }

    /// Drop the cached token if it is still the one PayPal just refused.
    async fn invalidate_token(&self, rejected: &str) {
        let mut cached = self.token.lock().await;
        if cached
            .as_ref()
            .is_some_and(|token| token.access_token == rejected)
        {
            *cached = None;
        }
    }

    /// Send a bearer-authenticated request.
    ///
    /// A 401 means the cached token was revoked or the credentials rotated,
    /// so the token is dropped and the request is sent once more with a
    /// freshly exchanged one.
    async fn send_authorized<F>(&self, build: F) -> Result<reqwest::Response, ProviderError>
    where
        F: Fn(&str) -> Result<reqwest::RequestBuilder, ProviderError>,
    {
        let token = self.access_token().await?;
        let response = build(&token)?.send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!("PayPal refused the cached access token, exchanging credentials again");
        self.invalidate_token(&token).await;
        let token = self.access_token().await?;
        Ok(build(&token)?.send().await?)
    }

    async fn error_detail(response: reqwest::Response) -> String {
        #[derive(serde::Deserialize)]
        struct ErrorBody {
            #[serde(default, alias = "error")]
            name: String,
            #[serde(default, alias = "error_description")]
            message: String,
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => format!("{}: {}", parsed.name, parsed.message),
            Err(_) => body,
        }
    }

    async fn get_order(&self, order_id: &str) -> Result<PayPalOrder, ProviderError> {
        let url = self.endpoint(&format!("v2/checkout/orders/{order_id}"))?;
        let response = self
            .send_authorized(|token| Ok(self.http_client.get(url.clone()).bearer_auth(token)))
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::OrderNotFound(order_id.to_owned()));
        }
        if !status.is_success() {
            return Err(classify_failure(status, Self::error_detail(response).await));
        }
        Ok(response.json().await?)
    }

    /// Capture an approved order and return its resulting status.
    ///
    /// The request id makes repeated captures of the same order idempotent
    /// on PayPal's side.
    async fn capture_order(&self, order_id: &str) -> Result<String, ProviderError> {
        #[derive(serde::Deserialize)]
        struct CaptureResponse {
            status: String,
        }

        let url = self.endpoint(&format!("v2/checkout/orders/{order_id}/capture"))?;
        let response = self
            .send_authorized(|token| {
                Ok(self
                    .http_client
                    .post(url.clone())
                    .bearer_auth(token)
                    .header("PayPal-Request-Id", format!("capture-{order_id}"))
                    .json(&serde_json::json!({})))
            })
            .await?;

        let status = response.status();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            // Already captured elsewhere or declined; the order itself says which.
            let detail = Self::error_detail(response).await;
            debug!(order_id, detail = %detail, "PayPal refused capture, re-reading order");
            return Ok(self.get_order(order_id).await?.status);
        }
        if !status.is_success() {
            return Err(classify_failure(status, Self::error_detail(response).await));
        }

        let captured: CaptureResponse = response.json().await?;
        info!(order_id, status = %captured.status, "Captured PayPal order");
        Ok(captured.status)
    }
}

#[derive(Debug, serde::Deserialize)]
struct PayPalOrder {
    id: String,
    status: String,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
    #[serde(default)]
    links: Vec<LinkDescription>,
}

#[derive(Debug, serde::Deserialize)]
struct PurchaseUnit {
    #[serde(default)]
    reference_id: Option<String>,
    #[serde(default)]
    custom_id: Option<String>,
    #[serde(default)]
    amount: Option<Money>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Money {
    currency_code: String,
    value: String,
}

#[derive(Debug, serde::Deserialize)]
struct LinkDescription {
    href: String,
    rel: String,
}

impl PayPalOrder {
    fn reference(&self) -> Option<String> {
        self.purchase_units
            .iter()
            .find_map(|unit| unit.custom_id.clone().or_else(|| unit.reference_id.clone()))
            .filter(|r| !r.is_empty())
    }

    fn approval_url(&self) -> Option<String> {
        self.links
            .iter()
            .find(|link| link.rel == "approve" || link.rel == "payer-action")
            .map(|link| link.href.clone())
    }
}

fn map_status(status: &str) -> OrderStatus {
    match status {
        "COMPLETED" => OrderStatus::Paid,
        "CREATED" | "SAVED" | "APPROVED" | "PAYER_ACTION_REQUIRED" => OrderStatus::Created,
        _ => OrderStatus::Other,
    }
}

/// Render minor units as PayPal's decimal string ("10.00").
fn format_value(amount_minor: i64) -> String {
    format!("{}.{:02}", amount_minor / 100, amount_minor % 100)
}

#[async_trait]
impl PaymentProvider for PayPalProvider {
    fn name(&self) -> &'static str {
        "paypal"
    }

    async fn create_order(&self, request: CreateOrder) -> Result<OrderRef, ProviderError> {
        let amount_minor = to_minor_units(request.amount)?;
        let reference = request.reference.to_string();
        let body = serde_json::json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": reference,
                "custom_id": reference,
                "amount": Money {
                    currency_code: request.currency.clone(),
                    value: format_value(amount_minor),
                },
            }],
        });

        let url = self.endpoint("v2/checkout/orders")?;
        let response = self
            .send_authorized(|token| {
                Ok(self
                    .http_client
                    .post(url.clone())
                    .bearer_auth(token)
                    .header("PayPal-Request-Id", format!("order-{reference}"))
                    .json(&body))
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_failure(status, Self::error_detail(response).await));
        }

        let order: PayPalOrder = response.json().await?;
        debug!(order_id = %order.id, status = %order.status, "PayPal order created");

        let currency = order
            .purchase_units
            .first()
            .and_then(|unit| unit.amount.as_ref())
            .map(|money| money.currency_code.clone())
            .unwrap_or(request.currency);
        let approval_url = order.approval_url();

        Ok(OrderRef {
            order_id: order.id,
            amount_minor,
            currency,
            approval_url,
        })
    }

    async fn fetch_order_status(&self, order_id: &str) -> Result<FetchedOrder, ProviderError> {
        if !is_valid_order_id(order_id) {
            return Err(ProviderError::OrderNotFound(order_id.to_owned()));
        }

        let order = self.get_order(order_id).await?;
        let reference = order.reference();
        let status = if order.status == "APPROVED" {
            self.capture_order(order_id).await?
        } else {
            order.status
        };

        Ok(FetchedOrder {
            order_id: order.id,
            status: map_status(&status),
            reference,
        })
    }
}

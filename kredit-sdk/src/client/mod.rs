//! HTTP client for the Kredit user API.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest`.

use reqwest::{Client, StatusCode};
use url::Url;

use crate::objects::{
    AuthResponse, CreditsResponse, InitiatePurchaseRequest, InitiatePurchaseResponse,
    LoginRequest, RegisterRequest, VerifyPaymentRequest, VerifyPaymentResponse,
};

/// Errors produced by the SDK HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// An authenticated endpoint was called without a session token.
    #[error("no session token; call login or register first")]
    MissingToken,
}

/// Typed HTTP client for the Kredit **user API**.
#[derive(Debug, Clone)]
pub struct KreditClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl KreditClient {
    /// Create a new `KreditClient` for the server rooted at `base_url`.
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
            token: None,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Use an existing session token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// `POST /api/user/register`. Stores the returned session token.
    pub async fn register(&mut self, body: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        let url = self.base_url.join("/api/user/register")?;
        let resp = self.http.post(url).json(body).send().await?;
        let auth: AuthResponse = parse_response(resp).await?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    /// `POST /api/user/login`. Stores the returned session token.
    pub async fn login(&mut self, body: &LoginRequest) -> Result<AuthResponse, ClientError> {
        let url = self.base_url.join("/api/user/login")?;
        let resp = self.http.post(url).json(body).send().await?;
        let auth: AuthResponse = parse_response(resp).await?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    /// `GET /api/user/credits`.
    pub async fn credits(&self) -> Result<CreditsResponse, ClientError> {
        let token = self.token.as_deref().ok_or(ClientError::MissingToken)?;
        let url = self.base_url.join("/api/user/credits")?;
        let resp = self.http.get(url).bearer_auth(token).send().await?;
        parse_response(resp).await
    }

    /// `POST /api/user/purchase` – open a provider order for a plan.
    pub async fn purchase(
        &self,
        plan_id: impl Into<String>,
    ) -> Result<InitiatePurchaseResponse, ClientError> {
        let token = self.token.as_deref().ok_or(ClientError::MissingToken)?;
        let url = self.base_url.join("/api/user/purchase")?;
        let body = InitiatePurchaseRequest {
            plan_id: plan_id.into(),
        };
        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        parse_response(resp).await
    }

    /// `POST /api/user/verify` – settle a paid provider order.
    pub async fn verify(
        &self,
        order_id: impl Into<String>,
    ) -> Result<VerifyPaymentResponse, ClientError> {
        let url = self.base_url.join("/api/user/verify")?;
        let body = VerifyPaymentRequest {
            order_id: order_id.into(),
            plan_id: None,
        };
        let resp = self.http.post(url).json(&body).send().await?;
        parse_response(resp).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}

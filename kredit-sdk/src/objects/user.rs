//! Account request and response types.

use serde::{Deserialize, Serialize};

/// Request body for `POST /api/user/register`.
///
/// Fields default to empty so that a missing field is reported as
/// "Missing Details" instead of a deserialization rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for `POST /api/user/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub name: String,
}

/// Returned by register and login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    /// Session token to send as `Authorization: Bearer {token}`.
    pub token: String,
    pub user: UserSummary,
}

/// Returned by `GET /api/user/credits`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditsResponse {
    pub success: bool,
    pub credits: i64,
    pub user: UserSummary,
}

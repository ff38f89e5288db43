//! HTTP API.
//!
//! - [`user`]: account, purchase and payment verification endpoints under
//!   `/api/user`.
//! - [`extractors`]: bearer-token authentication.

pub mod extractors;
pub mod user;

//! Configuration types for Kredit.
//!
//! These types represent the validated runtime configuration used by the
//! server and can be shared across crates. Loading and parsing the TOML file
//! is handled by the server crate.

mod auth;
mod payment;
mod server;

pub use auth::AuthConfig;
pub use payment::{PayPalCredentials, PaymentConfig, ProviderSettings, RazorpayCredentials};
pub use server::ServerConfig;

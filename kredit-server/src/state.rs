//! Application state shared across all request handlers.

use kredit_core::config::AuthConfig;
use kredit_core::ledger::DynUserStore;
use kredit_core::settlement::SettlementCoordinator;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Account storage for registration and login.
    pub users: DynUserStore,
    /// Purchase initiation, verification and balance reads.
    pub coordinator: SettlementCoordinator,
    /// Session token signing settings.
    pub auth: Arc<AuthConfig>,
}

impl AppState {
    pub fn new(users: DynUserStore, coordinator: SettlementCoordinator, auth: AuthConfig) -> Self {
        Self {
            users,
            coordinator,
            auth: Arc::new(auth),
        }
    }

    /// Token lifetime in whole seconds, as the session module expects it.
    pub fn token_ttl_secs(&self) -> i64 {
        i64::try_from(self.auth.token_ttl.as_secs()).unwrap_or(i64::MAX)
    }
}

//! Credit plan identifiers.

use serde::{Deserialize, Serialize};

/// Credit plan for API responses.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use `kredit_core::plans::CreditPlan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanId {
    Basic,
    Advanced,
    Business,
}

impl PlanId {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanId::Basic => "Basic",
            PlanId::Advanced => "Advanced",
            PlanId::Business => "Business",
        }
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

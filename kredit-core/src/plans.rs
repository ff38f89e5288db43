//! Plan catalog.
//!
//! The only place credit and price amounts are defined. Purchases resolve
//! their amounts here at creation time and the stored values are used for
//! settlement; nothing a client sends can change them.

use kredit_sdk::objects::PlanId;

/// Credit plan for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `kredit_sdk::objects::PlanId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "credit_plan")]
pub enum CreditPlan {
    Basic,
    Advanced,
    Business,
}

/// Amounts fixed by a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanTerms {
    pub plan: CreditPlan,
    /// Credits granted once the purchase settles.
    pub credits: i64,
    /// Price in major currency units.
    pub price: i64,
}

impl CreditPlan {
    pub const ALL: [CreditPlan; 3] = [
        CreditPlan::Basic,
        CreditPlan::Advanced,
        CreditPlan::Business,
    ];

    pub fn terms(self) -> PlanTerms {
        let (credits, price) = match self {
            CreditPlan::Basic => (100, 10),
            CreditPlan::Advanced => (500, 50),
            CreditPlan::Business => (5000, 250),
        };
        PlanTerms {
            plan: self,
            credits,
            price,
        }
    }

    pub fn as_str(self) -> &'static str {
        PlanId::from(self).as_str()
    }
}

/// Resolve a client-supplied plan identifier.
///
/// Matching is exact: `"Basic"` resolves, `"basic"` and `"Gold"` do not.
pub fn lookup(plan_id: &str) -> Option<PlanTerms> {
    CreditPlan::ALL
        .into_iter()
        .find(|plan| plan.as_str() == plan_id)
        .map(CreditPlan::terms)
}

impl From<CreditPlan> for PlanId {
    fn from(value: CreditPlan) -> Self {
        match value {
            CreditPlan::Basic => PlanId::Basic,
            CreditPlan::Advanced => PlanId::Advanced,
            CreditPlan::Business => PlanId::Business,
        }
    }
}

impl From<PlanId> for CreditPlan {
    fn from(value: PlanId) -> Self {
        match value {
            PlanId::Basic => CreditPlan::Basic,
            PlanId::Advanced => CreditPlan::Advanced,
            PlanId::Business => CreditPlan::Business,
        }
    }
}

//! Settlement coordinator.
//!
//! Ties the plan catalog, the payment provider and the ledger together:
//!
//! - [`initiate`](SettlementCoordinator::initiate) records a pending
//!   transaction and opens a provider order that carries its id.
//! - [`verify`](SettlementCoordinator::verify) asks the provider for the true
//!   order status and, when it is paid, settles the matching transaction.
//!
//! Amounts always come from the stored transaction. Settlement is a single
//! compare-and-set in the ledger, so replayed or concurrent verifies credit
//! the user at most once.

use crate::ledger::{DynLedger, LedgerError, NewTransaction, SettleOutcome};
use crate::entities::credit_transactions::CreditTransaction;
use crate::plans::{self, PlanTerms};
use crate::providers::{CreateOrder, DynPaymentProvider, OrderRef, OrderStatus, ProviderError};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("invalid plan")]
    InvalidPlan,

    #[error("user not found")]
    UnknownUser,

    #[error("payment provider unavailable")]
    ProviderUnavailable,

    #[error("payment provider rejected the request")]
    ProviderRejected,

    #[error("order not found")]
    OrderNotFound,

    #[error("no transaction matches this order")]
    UnknownTransaction,

    #[error("transaction already processed")]
    AlreadyProcessed,

    #[error("payment not complete")]
    PaymentNotComplete,

    #[error("storage error: {0}")]
    Storage(#[source] LedgerError),
}

impl From<LedgerError> for SettlementError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::UserNotFound(_) => SettlementError::UnknownUser,
            other => SettlementError::Storage(other),
        }
    }
}

impl From<ProviderError> for SettlementError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Unavailable(detail) => {
                warn!(detail = %detail, "Payment provider unavailable");
                SettlementError::ProviderUnavailable
            }
            ProviderError::Rejected(detail) => {
                error!(detail = %detail, "Payment provider rejected the request");
                SettlementError::ProviderRejected
            }
            ProviderError::OrderNotFound(order_id) => {
                debug!(order_id = %order_id, "Provider does not know this order");
                SettlementError::OrderNotFound
            }
        }
    }
}

/// A purchase that has been recorded and opened at the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiatedPurchase {
    pub transaction_id: Uuid,
    pub terms: PlanTerms,
    pub order: OrderRef,
}

/// A verify call that credited the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettledPayment {
    pub transaction_id: Uuid,
    pub user_id: Uuid,
    pub credits_added: i64,
    pub new_balance: i64,
}

#[derive(Clone)]
pub struct SettlementCoordinator {
    ledger: DynLedger,
    provider: DynPaymentProvider,
    currency: String,
}

impl SettlementCoordinator {
    pub fn new(ledger: DynLedger, provider: DynPaymentProvider, currency: String) -> Self {
        Self {
            ledger,
            provider,
            currency,
        }
    }

    /// Start a purchase of `plan_id` for `user_id`.
    ///
    /// On an unknown plan nothing is recorded. If the provider fails, or the
    /// provider order cannot be recorded, the pending transaction stays
    /// behind unpaid and unbound, and no unbound transaction ever settles.
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    pub async fn initiate(
        &self,
        user_id: Uuid,
        plan_id: &str,
    ) -> Result<InitiatedPurchase, SettlementError> {
        let terms = plans::lookup(plan_id).ok_or(SettlementError::InvalidPlan)?;

        if self.ledger.get_balance(user_id).await?.is_none() {
            return Err(SettlementError::UnknownUser);
        }

        let transaction = self
            .ledger
            .insert_transaction(NewTransaction {
                user_id,
                terms,
                currency: self.currency.clone(),
            })
            .await?;

        let order = self
            .provider
            .create_order(CreateOrder {
                amount: terms.price,
                currency: self.currency.clone(),
                reference: transaction.id,
            })
            .await?;

        // An unbound transaction can never settle, so the buyer must not be
        // sent to pay for it.
        let attached = match self
            .ledger
            .attach_provider_order(transaction.id, &order.order_id)
            .await
        {
            Ok(attached) => attached,
            Err(e) => {
                warn!(
                    transaction_id = %transaction.id,
                    order_id = %order.order_id,
                    error = %e,
                    "Failed to record provider order id, retrying once"
                );
                self.ledger
                    .attach_provider_order(transaction.id, &order.order_id)
                    .await?
            }
        };
        if !attached {
            error!(
                transaction_id = %transaction.id,
                order_id = %order.order_id,
                "Transaction could not be bound to its provider order"
            );
            return Err(SettlementError::UnknownTransaction);
        }

        info!(
            transaction_id = %transaction.id,
            order_id = %order.order_id,
            plan = terms.plan.as_str(),
            "Purchase initiated"
        );

        Ok(InitiatedPurchase {
            transaction_id: transaction.id,
            terms,
            order,
        })
    }

    /// Check `order_id` with the provider and settle its transaction if paid.
    ///
    /// `claimed_plan` is whatever the client says it bought; it is only
    /// compared against the stored plan for logging.
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    pub async fn verify(
        &self,
        order_id: &str,
        claimed_plan: Option<&str>,
    ) -> Result<SettledPayment, SettlementError> {
        let fetched = self.provider.fetch_order_status(order_id).await?;
        if fetched.status != OrderStatus::Paid {
            debug!(status = %fetched.status, "Order not paid yet");
            return Err(SettlementError::PaymentNotComplete);
        }

        let transaction = self
            .resolve_transaction(order_id, fetched.reference.as_deref())
            .await?
            .ok_or_else(|| {
                warn!(reference = ?fetched.reference, "Paid order has no matching transaction");
                SettlementError::UnknownTransaction
            })?;

        if let Some(claimed) = claimed_plan {
            if claimed != transaction.plan.as_str() {
                warn!(
                    transaction_id = %transaction.id,
                    claimed_plan = claimed,
                    stored_plan = transaction.plan.as_str(),
                    "Client plan does not match stored plan, using stored amounts"
                );
            }
        }

        match self.ledger.settle(transaction.id).await? {
            SettleOutcome::Settled {
                user_id,
                credits_added,
                new_balance,
            } => {
                info!(
                    transaction_id = %transaction.id,
                    user_id = %user_id,
                    credits_added,
                    new_balance,
                    "Payment settled"
                );
                Ok(SettledPayment {
                    transaction_id: transaction.id,
                    user_id,
                    credits_added,
                    new_balance,
                })
            }
            SettleOutcome::AlreadyProcessed => {
                debug!(transaction_id = %transaction.id, "Transaction already settled");
                Err(SettlementError::AlreadyProcessed)
            }
            SettleOutcome::UnknownTransaction => Err(SettlementError::UnknownTransaction),
        }
    }

    /// Current balance of `user_id`.
    pub async fn balance(&self, user_id: Uuid) -> Result<i64, SettlementError> {
        self.ledger
            .get_balance(user_id)
            .await?
            .ok_or(SettlementError::UnknownUser)
    }

    /// Find the transaction a provider order belongs to.
    ///
    /// The echoed reference wins; without one, the order id recorded at
    /// initiation is used. Only a transaction bound to exactly this order
    /// matches.
    async fn resolve_transaction(
        &self,
        order_id: &str,
        reference: Option<&str>,
    ) -> Result<Option<CreditTransaction>, SettlementError> {
        let transaction = match reference {
            Some(reference) => match Uuid::parse_str(reference) {
                Ok(transaction_id) => self.ledger.get_transaction(transaction_id).await?,
                Err(_) => {
                    debug!(reference, "Order reference is not a transaction id");
                    None
                }
            },
            None => {
                self.ledger
                    .find_transaction_by_provider_order(order_id)
                    .await?
            }
        };

        Ok(transaction.filter(|t| match t.provider_order_id.as_deref() {
            Some(bound) if bound == order_id => true,
            Some(bound) => {
                warn!(
                    transaction_id = %t.id,
                    bound_order = bound,
                    "Order reference points at a transaction bound to another order"
                );
                false
            }
            None => {
                warn!(
                    transaction_id = %t.id,
                    "Order reference points at a transaction with no provider order"
                );
                false
            }
        }))
    }
}

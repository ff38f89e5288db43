//! Transaction ledger and user balance store.
//!
//! Two traits split the persistence surface:
//!
//! - [`UserStore`]: account creation and lookup.
//! - [`Ledger`]: purchase transactions and balances, including the atomic
//!   [`settle`](Ledger::settle) step that is the only way a balance changes.
//!
//! Both are implemented for [`DatabaseProcessor`](crate::framework::DatabaseProcessor)
//! (Postgres) and [`MemoryLedger`] (tests and local runs).

mod memory;
mod postgres;

pub use memory::MemoryLedger;

use crate::entities::credit_transactions::CreditTransaction;
use crate::entities::users::UserRecord;
use crate::plans::PlanTerms;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by ledger backends.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A user with this email already exists
    #[error("email already registered")]
    DuplicateEmail,

    /// The referenced user does not exist
    #[error("user not found: {0}")]
    UserNotFound(Uuid),
}

/// Data for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Data for creating a pending purchase transaction.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub terms: PlanTerms,
    pub currency: String,
}

/// Result of the atomic settle step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// This call flipped `paid` and credited the user.
    Settled {
        user_id: Uuid,
        credits_added: i64,
        new_balance: i64,
    },
    /// The transaction was already paid; nothing changed.
    AlreadyProcessed,
    /// No transaction with this id exists; nothing changed.
    UnknownTransaction,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a user with a zero balance.
    ///
    /// Fails with [`LedgerError::DuplicateEmail`] if the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, LedgerError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, LedgerError>;

    async fn get_user(&self, user_id: Uuid) -> Result<Option<UserRecord>, LedgerError>;
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Current balance, or `None` if the user does not exist.
    async fn get_balance(&self, user_id: Uuid) -> Result<Option<i64>, LedgerError>;

    /// Persist a new pending transaction.
    ///
    /// Fails with [`LedgerError::UserNotFound`] if the user does not exist.
    async fn insert_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<CreditTransaction, LedgerError>;

    async fn get_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<CreditTransaction>, LedgerError>;

    async fn find_transaction_by_provider_order(
        &self,
        provider_order_id: &str,
    ) -> Result<Option<CreditTransaction>, LedgerError>;

    /// Bind a provider order id to a transaction that has none yet.
    ///
    /// Returns `false` if the transaction is missing or already bound.
    async fn attach_provider_order(
        &self,
        transaction_id: Uuid,
        provider_order_id: &str,
    ) -> Result<bool, LedgerError>;

    /// Atomically mark a transaction paid and credit its owner.
    ///
    /// The paid check, the flag flip and the balance increment happen as
    /// one indivisible step scoped to `transaction_id`. Of any number of
    /// concurrent calls for the same id, at most one returns
    /// [`SettleOutcome::Settled`].
    async fn settle(&self, transaction_id: Uuid) -> Result<SettleOutcome, LedgerError>;
}

pub type DynLedger = Arc<dyn Ledger>;
pub type DynUserStore = Arc<dyn UserStore>;

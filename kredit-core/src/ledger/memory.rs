use super::{Ledger, LedgerError, NewTransaction, NewUser, SettleOutcome, UserStore};
use crate::entities::credit_transactions::CreditTransaction;
use crate::entities::now_primitive;
use crate::entities::users::UserRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// In-process ledger backed by hash maps.
///
/// Every operation runs under one lock guard, so `settle` performs the paid
/// check, the flag flip and the balance increment without interleaving.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<Uuid, UserRecord>,
    transactions: HashMap<Uuid, CreditTransaction>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All transactions owned by `user_id`, oldest first.
    pub async fn transactions_for(&self, user_id: Uuid) -> Vec<CreditTransaction> {
        let state = self.state.lock().await;
        let mut found: Vec<CreditTransaction> = state
            .transactions
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by_key(|t| t.id);
        found
    }
}

#[async_trait]
impl UserStore for MemoryLedger {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, LedgerError> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(LedgerError::DuplicateEmail);
        }
        let record = UserRecord {
            id: Uuid::now_v7(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            credit_balance: 0,
            created_at: now_primitive(),
        };
        state.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<UserRecord>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.users.get(&user_id).cloned())
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn get_balance(&self, user_id: Uuid) -> Result<Option<i64>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.users.get(&user_id).map(|u| u.credit_balance))
    }

    async fn insert_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<CreditTransaction, LedgerError> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&transaction.user_id) {
            return Err(LedgerError::UserNotFound(transaction.user_id));
        }
        let record = CreditTransaction {
            id: Uuid::now_v7(),
            user_id: transaction.user_id,
            plan: transaction.terms.plan,
            credit_amount: transaction.terms.credits,
            price_amount: transaction.terms.price,
            currency: transaction.currency,
            provider_order_id: None,
            paid: false,
            created_at: now_primitive(),
            paid_at: None,
        };
        state.transactions.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<CreditTransaction>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.transactions.get(&transaction_id).cloned())
    }

    async fn find_transaction_by_provider_order(
        &self,
        provider_order_id: &str,
    ) -> Result<Option<CreditTransaction>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .values()
            .find(|t| t.provider_order_id.as_deref() == Some(provider_order_id))
            .cloned())
    }

    async fn attach_provider_order(
        &self,
        transaction_id: Uuid,
        provider_order_id: &str,
    ) -> Result<bool, LedgerError> {
        let mut state = self.state.lock().await;
        match state.transactions.get_mut(&transaction_id) {
            Some(t) if t.provider_order_id.is_none() => {
                t.provider_order_id = Some(provider_order_id.to_owned());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn settle(&self, transaction_id: Uuid) -> Result<SettleOutcome, LedgerError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let Some(transaction) = state.transactions.get_mut(&transaction_id) else {
            return Ok(SettleOutcome::UnknownTransaction);
        };
        if transaction.paid {
            return Ok(SettleOutcome::AlreadyProcessed);
        }
        let Some(user) = state.users.get_mut(&transaction.user_id) else {
            return Err(LedgerError::UserNotFound(transaction.user_id));
        };

        transaction.paid = true;
        transaction.paid_at = Some(now_primitive());
        user.credit_balance += transaction.credit_amount;

        Ok(SettleOutcome::Settled {
            user_id: user.id,
            credits_added: transaction.credit_amount,
            new_balance: user.credit_balance,
        })
    }
}

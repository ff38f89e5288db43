use super::{Ledger, LedgerError, NewTransaction, NewUser, SettleOutcome, UserStore};
use crate::entities::credit_transactions::{
    AttachProviderOrder, CreditTransaction, GetCreditTransactionById,
    GetCreditTransactionByProviderOrder, InsertCreditTransaction,
};
use crate::entities::users::{
    CreateUser, GetCreditBalance, GetUserByEmail, GetUserById, UserRecord,
};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use tracing::{debug, warn};
use uuid::Uuid;

#[async_trait]
impl UserStore for DatabaseProcessor {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, LedgerError> {
        self.process(CreateUser {
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
        })
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                LedgerError::DuplicateEmail
            }
            other => LedgerError::Database(other),
        })
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, LedgerError> {
        Ok(self
            .process(GetUserByEmail {
                email: email.to_owned(),
            })
            .await?)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<UserRecord>, LedgerError> {
        Ok(self.process(GetUserById { user_id }).await?)
    }
}

#[async_trait]
impl Ledger for DatabaseProcessor {
    async fn get_balance(&self, user_id: Uuid) -> Result<Option<i64>, LedgerError> {
        Ok(self.process(GetCreditBalance { user_id }).await?)
    }

    async fn insert_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<CreditTransaction, LedgerError> {
        let user_id = transaction.user_id;
        self.process(InsertCreditTransaction {
            user_id,
            terms: transaction.terms,
            currency: transaction.currency,
        })
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                LedgerError::UserNotFound(user_id)
            }
            other => LedgerError::Database(other),
        })
    }

    async fn get_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<CreditTransaction>, LedgerError> {
        Ok(self
            .process(GetCreditTransactionById { transaction_id })
            .await?)
    }

    async fn find_transaction_by_provider_order(
        &self,
        provider_order_id: &str,
    ) -> Result<Option<CreditTransaction>, LedgerError> {
        Ok(self
            .process(GetCreditTransactionByProviderOrder {
                provider_order_id: provider_order_id.to_owned(),
            })
            .await?)
    }

    async fn attach_provider_order(
        &self,
        transaction_id: Uuid,
        provider_order_id: &str,
    ) -> Result<bool, LedgerError> {
        Ok(self
            .process(AttachProviderOrder {
                transaction_id,
                provider_order_id: provider_order_id.to_owned(),
            })
            .await?)
    }

    #[tracing::instrument(skip(self), err, name = "SQL:SettleCreditTransaction")]
    async fn settle(&self, transaction_id: Uuid) -> Result<SettleOutcome, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let Some(marked) = CreditTransaction::mark_paid_tx(&mut tx, transaction_id).await? else {
            // Lost the compare-and-set, or the row never existed.
            let outcome = match CreditTransaction::paid_flag_tx(&mut tx, transaction_id).await? {
                Some(_) => SettleOutcome::AlreadyProcessed,
                None => SettleOutcome::UnknownTransaction,
            };
            tx.rollback().await?;
            debug!(transaction_id = %transaction_id, outcome = ?outcome, "Settle was a no-op");
            return Ok(outcome);
        };

        let Some(new_balance) =
            UserRecord::add_credits_tx(&mut tx, marked.user_id, marked.credit_amount).await?
        else {
            // Dropping `tx` rolls back the paid flag as well.
            warn!(
                transaction_id = %transaction_id,
                user_id = %marked.user_id,
                "Transaction owner missing during settlement"
            );
            return Err(LedgerError::UserNotFound(marked.user_id));
        };

        tx.commit().await?;

        Ok(SettleOutcome::Settled {
            user_id: marked.user_id,
            credits_added: marked.credit_amount,
            new_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plans::{self, CreditPlan};
    use sqlx::PgPool;

    async fn ledger_with_user(pool: PgPool) -> (DatabaseProcessor, Uuid) {
        let ledger = DatabaseProcessor::new(pool);
        let user = ledger
            .create_user(NewUser {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        (ledger, user.id)
    }

    fn purchase(user_id: Uuid, plan_id: &str) -> NewTransaction {
        NewTransaction {
            user_id,
            terms: plans::lookup(plan_id).unwrap(),
            currency: "INR".to_string(),
        }
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_settle_once_then_already_processed(pool: PgPool) {
        let (ledger, user_id) = ledger_with_user(pool).await;
        let transaction = ledger
            .insert_transaction(purchase(user_id, "Basic"))
            .await
            .unwrap();

        let outcome = ledger.settle(transaction.id).await.unwrap();
        assert_eq!(
            outcome,
            SettleOutcome::Settled {
                user_id,
                credits_added: 100,
                new_balance: 100,
            }
        );
        assert_eq!(
            ledger.settle(transaction.id).await.unwrap(),
            SettleOutcome::AlreadyProcessed
        );
        assert_eq!(ledger.get_balance(user_id).await.unwrap(), Some(100));
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_concurrent_settles_credit_once(pool: PgPool) {
        let (ledger, user_id) = ledger_with_user(pool).await;
        let transaction = ledger
            .insert_transaction(purchase(user_id, "Advanced"))
            .await
            .unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.settle(transaction.id).await })
            })
            .collect();

        let mut settled = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                SettleOutcome::Settled { new_balance, .. } => {
                    settled += 1;
                    assert_eq!(new_balance, 500);
                }
                SettleOutcome::AlreadyProcessed => {}
                SettleOutcome::UnknownTransaction => panic!("transaction vanished"),
            }
        }
        assert_eq!(settled, 1);
        assert_eq!(ledger.get_balance(user_id).await.unwrap(), Some(500));
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_settle_unknown_transaction(pool: PgPool) {
        let (ledger, user_id) = ledger_with_user(pool).await;
        assert_eq!(
            ledger.settle(Uuid::now_v7()).await.unwrap(),
            SettleOutcome::UnknownTransaction
        );
        assert_eq!(ledger.get_balance(user_id).await.unwrap(), Some(0));
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_settlements_accumulate(pool: PgPool) {
        let (ledger, user_id) = ledger_with_user(pool).await;
        for plan_id in ["Basic", "Business"] {
            let transaction = ledger
                .insert_transaction(purchase(user_id, plan_id))
                .await
                .unwrap();
            ledger.settle(transaction.id).await.unwrap();
        }
        assert_eq!(ledger.get_balance(user_id).await.unwrap(), Some(5100));
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_attach_binds_once(pool: PgPool) {
        let (ledger, user_id) = ledger_with_user(pool).await;
        let first = ledger
            .insert_transaction(purchase(user_id, "Basic"))
            .await
            .unwrap();
        let second = ledger
            .insert_transaction(purchase(user_id, "Basic"))
            .await
            .unwrap();

        assert!(ledger.attach_provider_order(first.id, "order_1").await.unwrap());
        assert!(!ledger.attach_provider_order(first.id, "order_2").await.unwrap());
        assert!(!ledger.attach_provider_order(Uuid::now_v7(), "order_3").await.unwrap());
        // The order id is unique across transactions.
        assert!(ledger.attach_provider_order(second.id, "order_1").await.is_err());

        let found = ledger
            .find_transaction_by_provider_order("order_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, first.id);
        assert!(
            ledger
                .find_transaction_by_provider_order("order_2")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_transaction_round_trip(pool: PgPool) {
        let (ledger, user_id) = ledger_with_user(pool).await;
        let inserted = ledger
            .insert_transaction(purchase(user_id, "Business"))
            .await
            .unwrap();
        assert_eq!(inserted.plan, CreditPlan::Business);
        assert_eq!(inserted.credit_amount, 5000);
        assert_eq!(inserted.price_amount, 250);
        assert_eq!(inserted.currency, "INR");
        assert!(!inserted.paid);
        assert!(inserted.paid_at.is_none());
        assert!(inserted.provider_order_id.is_none());

        ledger.settle(inserted.id).await.unwrap();
        let stored = ledger.get_transaction(inserted.id).await.unwrap().unwrap();
        assert_eq!(stored.plan, CreditPlan::Business);
        assert_eq!(stored.created_at, inserted.created_at);
        assert!(stored.paid);
        let paid_at = stored.paid_at.unwrap();
        assert!(paid_at >= stored.created_at);
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_user_constraints(pool: PgPool) {
        let (ledger, user_id) = ledger_with_user(pool).await;

        let err = ledger
            .create_user(NewUser {
                name: "Other".to_string(),
                email: "ada@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateEmail));

        let stranger = Uuid::now_v7();
        let err = ledger
            .insert_transaction(purchase(stranger, "Basic"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::UserNotFound(id) if id == stranger));

        let user = ledger.get_user(user_id).await.unwrap().unwrap();
        assert_eq!(user.credit_balance, 0);
        let by_email = ledger
            .find_user_by_email("ada@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, user_id);
        assert_eq!(ledger.get_balance(stranger).await.unwrap(), None);
    }
}

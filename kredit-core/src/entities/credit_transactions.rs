use crate::framework::DatabaseProcessor;
use crate::plans::{CreditPlan, PlanTerms};
use kanau::processor::Processor;
use uuid::Uuid;

/// One purchase attempt.
///
/// `credit_amount` and `price_amount` are copied from the plan catalog when
/// the row is created and never updated. `paid` only ever goes from `false`
/// to `true`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CreditTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: CreditPlan,
    pub credit_amount: i64,
    pub price_amount: i64,
    pub currency: String,
    pub provider_order_id: Option<String>,
    pub paid: bool,
    pub created_at: time::PrimitiveDateTime,
    pub paid_at: Option<time::PrimitiveDateTime>,
}

#[derive(Debug, Clone)]
/// Insert a new pending transaction.
pub struct InsertCreditTransaction {
    pub user_id: Uuid,
    pub terms: PlanTerms,
    pub currency: String,
}

impl Processor<InsertCreditTransaction> for DatabaseProcessor {
    type Output = CreditTransaction;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertCreditTransaction")]
    async fn process(
        &self,
        insert: InsertCreditTransaction,
    ) -> Result<CreditTransaction, sqlx::Error> {
        let transaction = sqlx::query_as::<_, CreditTransaction>(
            r#"
            INSERT INTO credit_transactions (id, user_id, plan, credit_amount, price_amount, currency)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING
            id,
            user_id,
            plan,
            credit_amount,
            price_amount,
            currency,
            provider_order_id,
            paid,
            created_at,
            paid_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(insert.user_id)
        .bind(insert.terms.plan)
        .bind(insert.terms.credits)
        .bind(insert.terms.price)
        .bind(insert.currency)
        .fetch_one(&self.pool)
        .await?;
        Ok(transaction)
    }
}

#[derive(Debug, Clone)]
pub struct GetCreditTransactionById {
    pub transaction_id: Uuid,
}

impl Processor<GetCreditTransactionById> for DatabaseProcessor {
    type Output = Option<CreditTransaction>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetCreditTransactionById")]
    async fn process(
        &self,
        query: GetCreditTransactionById,
    ) -> Result<Option<CreditTransaction>, sqlx::Error> {
        let transaction = sqlx::query_as::<_, CreditTransaction>(
            r#"
            SELECT id, user_id, plan, credit_amount, price_amount, currency,
                   provider_order_id, paid, created_at, paid_at
            FROM credit_transactions
            WHERE id = $1
            "#,
        )
        .bind(query.transaction_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(transaction)
    }
}

#[derive(Debug, Clone)]
/// Look a transaction up by the order id the provider assigned to it.
pub struct GetCreditTransactionByProviderOrder {
    pub provider_order_id: String,
}

impl Processor<GetCreditTransactionByProviderOrder> for DatabaseProcessor {
    type Output = Option<CreditTransaction>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetCreditTransactionByProviderOrder")]
    async fn process(
        &self,
        query: GetCreditTransactionByProviderOrder,
    ) -> Result<Option<CreditTransaction>, sqlx::Error> {
        let transaction = sqlx::query_as::<_, CreditTransaction>(
            r#"
            SELECT id, user_id, plan, credit_amount, price_amount, currency,
                   provider_order_id, paid, created_at, paid_at
            FROM credit_transactions
            WHERE provider_order_id = $1
            "#,
        )
        .bind(query.provider_order_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(transaction)
    }
}

#[derive(Debug, Clone)]
/// Record the provider order id on a transaction that has none yet.
///
/// Returns whether the row was updated.
pub struct AttachProviderOrder {
    pub transaction_id: Uuid,
    pub provider_order_id: String,
}

impl Processor<AttachProviderOrder> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:AttachProviderOrder")]
    async fn process(&self, cmd: AttachProviderOrder) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE credit_transactions
            SET provider_order_id = $2
            WHERE id = $1 AND provider_order_id IS NULL
            "#,
        )
        .bind(cmd.transaction_id)
        .bind(cmd.provider_order_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

/// Row returned by a successful compare-and-set on `paid`.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct MarkedPaid {
    pub user_id: Uuid,
    pub credit_amount: i64,
}

impl CreditTransaction {
    /// Flip `paid` from `false` to `true` within a transaction.
    ///
    /// Returns `None` when the row does not exist or is already paid. The
    /// `paid = FALSE` predicate makes this a compare-and-set: of any number
    /// of concurrent callers, exactly one gets a row back.
    pub async fn mark_paid_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        transaction_id: Uuid,
    ) -> Result<Option<MarkedPaid>, sqlx::Error> {
        let marked = sqlx::query_as::<_, MarkedPaid>(
            r#"
            UPDATE credit_transactions
            SET paid = TRUE, paid_at = NOW()
            WHERE id = $1 AND paid = FALSE
            RETURNING user_id, credit_amount
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(marked)
    }

    /// Read the `paid` flag within a transaction. `None` if the row is missing.
    pub async fn paid_flag_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        transaction_id: Uuid,
    ) -> Result<Option<bool>, sqlx::Error> {
        let paid = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT paid
            FROM credit_transactions
            WHERE id = $1
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(paid)
    }
}

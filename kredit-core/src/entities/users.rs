use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub credit_balance: i64,
    pub created_at: time::PrimitiveDateTime,
}

#[derive(Debug, Clone)]
/// Insert a new user with a zero balance.
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

impl Processor<CreateUser> for DatabaseProcessor {
    type Output = UserRecord;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CreateUser")]
    async fn process(&self, insert: CreateUser) -> Result<UserRecord, sqlx::Error> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (id, name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, password_hash, credit_balance, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(insert.name)
        .bind(insert.email)
        .bind(insert.password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }
}

#[derive(Debug, Clone)]
pub struct GetUserById {
    pub user_id: Uuid,
}

impl Processor<GetUserById> for DatabaseProcessor {
    type Output = Option<UserRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetUserById")]
    async fn process(&self, query: GetUserById) -> Result<Option<UserRecord>, sqlx::Error> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, name, email, password_hash, credit_balance, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(query.user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

#[derive(Debug, Clone)]
pub struct GetUserByEmail {
    pub email: String,
}

impl Processor<GetUserByEmail> for DatabaseProcessor {
    type Output = Option<UserRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetUserByEmail")]
    async fn process(&self, query: GetUserByEmail) -> Result<Option<UserRecord>, sqlx::Error> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, name, email, password_hash, credit_balance, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(query.email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

#[derive(Debug, Clone)]
pub struct GetCreditBalance {
    pub user_id: Uuid,
}

impl Processor<GetCreditBalance> for DatabaseProcessor {
    type Output = Option<i64>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetCreditBalance")]
    async fn process(&self, query: GetCreditBalance) -> Result<Option<i64>, sqlx::Error> {
        let balance = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT credit_balance
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(query.user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(balance)
    }
}

impl UserRecord {
    /// Add credits to a user's balance within a transaction.
    ///
    /// The increment happens in the database, so concurrent settlements for
    /// the same user never lose an update. Returns the new balance, or `None`
    /// if the user does not exist.
    pub async fn add_credits_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: Uuid,
        credits: i64,
    ) -> Result<Option<i64>, sqlx::Error> {
        let balance = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE users
            SET credit_balance = credit_balance + $2
            WHERE id = $1
            RETURNING credit_balance
            "#,
        )
        .bind(user_id)
        .bind(credits)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(balance)
    }
}

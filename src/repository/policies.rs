//! Loan policy rows: one active, the rest history

use async_trait::async_trait;
use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::AppResult,
    models::policy::{LoanPolicy, PolicyValues},
    services::policy::PolicySource,
};

#[derive(Clone)]
pub struct PoliciesRepository {
    pool: Pool<Postgres>,
}

impl PoliciesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Active policy row, locked against a concurrent update
    pub async fn lock_active(&self, conn: &mut PgConnection) -> AppResult<Option<LoanPolicy>> {
        let policy = sqlx::query_as::<_, LoanPolicy>(
            "SELECT * FROM loan_policies WHERE is_active ORDER BY id DESC LIMIT 1 FOR UPDATE",
        )
        .fetch_optional(&mut *conn)
        .await?;
        Ok(policy)
    }

    pub async fn deactivate_all(&self, conn: &mut PgConnection) -> AppResult<u64> {
        let result = sqlx::query("UPDATE loan_policies SET is_active = FALSE WHERE is_active")
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Append a new active row. Callers deactivate the previous one first.
    pub async fn insert_active(
        &self,
        conn: &mut PgConnection,
        values: &PolicyValues,
    ) -> AppResult<LoanPolicy> {
        let policy = sqlx::query_as::<_, LoanPolicy>(
            r#"
            INSERT INTO loan_policies
                (loan_period_days, max_loans_per_user, max_renewals_per_loan,
                 fine_rate_per_day, grace_period_days, is_active)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING *
            "#,
        )
        .bind(values.loan_period_days)
        .bind(values.max_loans_per_user)
        .bind(values.max_renewals_per_loan)
        .bind(values.fine_rate_per_day)
        .bind(values.grace_period_days)
        .fetch_one(&mut *conn)
        .await?;
        Ok(policy)
    }

    /// Every policy ever written, newest first
    pub async fn history(&self) -> AppResult<Vec<LoanPolicy>> {
        let policies = sqlx::query_as::<_, LoanPolicy>(
            "SELECT * FROM loan_policies ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(policies)
    }
}

#[async_trait]
impl PolicySource for PoliciesRepository {
    async fn fetch_active(&self) -> AppResult<Option<LoanPolicy>> {
        let policy = sqlx::query_as::<_, LoanPolicy>(
            "SELECT * FROM loan_policies WHERE is_active ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(policy)
    }
}

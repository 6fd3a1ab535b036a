//! Fines repository

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult, CirculationError},
    models::fine::{Fine, FineDetails, FineSummary, FineType},
};

const FINE_DETAILS: &str = r#"
    SELECT f.*, COALESCE(l.book_id, h.book_id) AS book_id, b.title AS book_title
    FROM fines f
    LEFT JOIN loans l ON l.id = f.loan_id
    LEFT JOIN holds h ON h.id = f.hold_id
    LEFT JOIN books b ON b.id = COALESCE(l.book_id, h.book_id)
"#;

#[derive(Clone)]
pub struct FinesRepository {
    pool: Pool<Postgres>,
}

impl FinesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_details(&self, id: i32) -> AppResult<FineDetails> {
        sqlx::query_as::<_, FineDetails>(&format!("{} WHERE f.id = $1", FINE_DETAILS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Fine with id {} not found", id)))
    }

    /// Lock a fine row for the rest of the transaction
    pub async fn lock(&self, conn: &mut PgConnection, id: i32) -> AppResult<Fine> {
        sqlx::query_as::<_, Fine>("SELECT * FROM fines WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Fine with id {} not found", id)))
    }

    /// All fines of a user, newest first
    pub async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<FineDetails>> {
        let fines = sqlx::query_as::<_, FineDetails>(&format!(
            "{} WHERE f.user_id = $1 ORDER BY f.created_at DESC, f.id DESC",
            FINE_DETAILS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(fines)
    }

    pub async fn summary_for_user(&self, user_id: i32) -> AppResult<FineSummary> {
        let summary = sqlx::query_as::<_, FineSummary>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending') AS pending_count,
                COALESCE(SUM(amount) FILTER (WHERE status = 'pending'), 0) AS pending_amount,
                COALESCE(SUM(amount) FILTER (WHERE status = 'paid'), 0) AS paid_amount
            FROM fines
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(summary)
    }

    /// Insert an overdue fine unless the loan already carries a pending one.
    /// Returns `None` when a concurrent materialization won the race.
    pub async fn insert_overdue(
        &self,
        conn: &mut PgConnection,
        user_id: i32,
        loan_id: i32,
        amount: Decimal,
        description: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Fine>> {
        let fine = sqlx::query_as::<_, Fine>(
            r#"
            INSERT INTO fines (user_id, loan_id, amount, type, status, description, created_at)
            VALUES ($1, $2, $3, 'overdue', 'pending', $4, $5)
            ON CONFLICT (loan_id) WHERE type = 'overdue' AND status = 'pending' DO NOTHING
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(loan_id)
        .bind(amount)
        .bind(description)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(fine)
    }

    /// Insert the expiry fee for a hold; at most one per hold
    pub async fn insert_hold_expiry(
        &self,
        conn: &mut PgConnection,
        user_id: i32,
        hold_id: i32,
        amount: Decimal,
        description: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Fine>> {
        let fine = sqlx::query_as::<_, Fine>(
            r#"
            INSERT INTO fines (user_id, hold_id, amount, type, status, description, created_at)
            VALUES ($1, $2, $3, 'hold_expiry', 'pending', $4, $5)
            ON CONFLICT (hold_id) WHERE type = 'hold_expiry' DO NOTHING
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(hold_id)
        .bind(amount)
        .bind(description)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(fine)
    }

    /// Staff-assessed damage or lost fine against a loan
    pub async fn insert_assessed(
        &self,
        conn: &mut PgConnection,
        user_id: i32,
        loan_id: i32,
        fine_type: FineType,
        amount: Decimal,
        description: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Fine> {
        let fine = sqlx::query_as::<_, Fine>(
            r#"
            INSERT INTO fines (user_id, loan_id, amount, type, status, description, created_at)
            VALUES ($1, $2, $3, $4, 'pending', $5, $6)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(loan_id)
        .bind(amount)
        .bind(fine_type)
        .bind(description)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;
        Ok(fine)
    }

    /// Settle a pending fine as paid. A second call finds nothing to update.
    pub async fn mark_paid(
        &self,
        conn: &mut PgConnection,
        id: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Fine> {
        sqlx::query_as::<_, Fine>(
            r#"
            UPDATE fines SET status = 'paid', paid_at = $2
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| CirculationError::AlreadySettled("settled".to_string()).into())
    }

    pub async fn mark_waived(&self, conn: &mut PgConnection, id: i32) -> AppResult<Fine> {
        sqlx::query_as::<_, Fine>(
            "UPDATE fines SET status = 'waived' WHERE id = $1 AND status = 'pending' RETURNING *",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| CirculationError::AlreadySettled("settled".to_string()).into())
    }

    /// Count and total of all pending fines
    pub async fn pending_totals(&self) -> AppResult<(i64, Decimal)> {
        let totals: (i64, Decimal) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(amount), 0) FROM fines WHERE status = 'pending'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(totals)
    }
}

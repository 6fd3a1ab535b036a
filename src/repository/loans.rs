//! Loans repository for database operations

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{is_unique_violation, AppError, AppResult, CirculationError},
    models::loan::{Loan, LoanStatus, LoanWithBook, ReturnCondition},
};

const LOAN_WITH_BOOK: &str = r#"
    SELECT l.*, b.title AS book_title, b.author AS book_author, b.book_type
    FROM loans l
    JOIN books b ON b.id = l.book_id
"#;

const OPEN_LOAN_INDEX: &str = "uq_loans_open_per_user_book";

/// Values for a new loan row
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub user_id: i32,
    pub book_id: i32,
    pub loan_date: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub assigned_by_staff_id: Option<i32>,
}

/// Values written when a loan comes back
#[derive(Debug, Clone)]
pub struct LoanReturn {
    pub return_date: DateTime<Utc>,
    pub returned_by_staff_id: Option<i32>,
    pub return_condition: Option<ReturnCondition>,
    pub return_notes: Option<String>,
}

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// Get loan with book details
    pub async fn get_details(&self, id: i32) -> AppResult<LoanWithBook> {
        sqlx::query_as::<_, LoanWithBook>(&format!("{} WHERE l.id = $1", LOAN_WITH_BOOK))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// All loans of a user, newest first
    pub async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<LoanWithBook>> {
        let loans = sqlx::query_as::<_, LoanWithBook>(&format!(
            "{} WHERE l.user_id = $1 ORDER BY l.loan_date DESC, l.id DESC",
            LOAN_WITH_BOOK
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    /// Loans across all users; without a filter, every loan still out
    pub async fn list(&self, status: Option<LoanStatus>) -> AppResult<Vec<LoanWithBook>> {
        let loans = match status {
            Some(status) => {
                sqlx::query_as::<_, LoanWithBook>(&format!(
                    "{} WHERE l.status = $1 ORDER BY l.loan_date DESC, l.id DESC",
                    LOAN_WITH_BOOK
                ))
                .bind(status)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, LoanWithBook>(&format!(
                    "{} WHERE l.status IN ('active', 'overdue') ORDER BY l.loan_date DESC, l.id DESC",
                    LOAN_WITH_BOOK
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(loans)
    }

    /// Lock a loan row for the rest of the transaction
    pub async fn lock(&self, conn: &mut PgConnection, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// Whether the user already has this title out
    pub async fn has_open_loan(
        &self,
        conn: &mut PgConnection,
        user_id: i32,
        book_id: i32,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM loans
                WHERE user_id = $1 AND book_id = $2 AND status IN ('active', 'overdue')
            )
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(exists)
    }

    /// Active plus overdue loans held by a user
    pub async fn count_open_for_user(&self, conn: &mut PgConnection, user_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE user_id = $1 AND status IN ('active', 'overdue')",
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }

    /// Insert a loan. The open-loan unique index turns a duplicate into `AlreadyBorrowed`.
    pub async fn insert(&self, conn: &mut PgConnection, loan: &NewLoan) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (user_id, book_id, loan_date, due_date, status, renewal_count, assigned_by_staff_id)
            VALUES ($1, $2, $3, $4, 'active', 0, $5)
            RETURNING *
            "#,
        )
        .bind(loan.user_id)
        .bind(loan.book_id)
        .bind(loan.loan_date)
        .bind(loan.due_date)
        .bind(loan.assigned_by_staff_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, OPEN_LOAN_INDEX) {
                CirculationError::AlreadyBorrowed.into()
            } else {
                AppError::Database(e)
            }
        })
    }

    /// Extend the due date of a locked, renewable loan
    pub async fn renew(
        &self,
        conn: &mut PgConnection,
        id: i32,
        new_due_date: NaiveDate,
    ) -> AppResult<Loan> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET due_date = $2, renewal_count = renewal_count + 1
            WHERE id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(new_due_date)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(CirculationError::NotActive)?;
        Ok(loan)
    }

    /// Close a loan. Fails with `AlreadyReturned` if another request got there first.
    pub async fn mark_returned(
        &self,
        conn: &mut PgConnection,
        id: i32,
        ret: &LoanReturn,
    ) -> AppResult<Loan> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET status = 'returned',
                return_date = $2,
                returned_by_staff_id = $3,
                return_condition = $4,
                return_notes = $5
            WHERE id = $1 AND status <> 'returned'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(ret.return_date)
        .bind(ret.returned_by_staff_id)
        .bind(ret.return_condition)
        .bind(&ret.return_notes)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(CirculationError::AlreadyReturned)?;
        Ok(loan)
    }

    /// Flip an active loan to overdue (fine materialization side effect)
    pub async fn mark_overdue(&self, conn: &mut PgConnection, id: i32) -> AppResult<()> {
        sqlx::query("UPDATE loans SET status = 'overdue' WHERE id = $1 AND status = 'active'")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Open loans past due that carry no pending overdue fine, locked.
    /// Any fine insert for a loan happens under its row lock, so loans held
    /// by a concurrent return or sweep are skipped rather than waited on.
    pub async fn overdue_candidates(
        &self,
        conn: &mut PgConnection,
        today: NaiveDate,
    ) -> AppResult<Vec<LoanWithBook>> {
        let loans = sqlx::query_as::<_, LoanWithBook>(&format!(
            r#"{}
            WHERE l.status IN ('active', 'overdue')
              AND l.due_date < $1
              AND NOT EXISTS (
                  SELECT 1 FROM fines f
                  WHERE f.loan_id = l.id AND f.type = 'overdue' AND f.status = 'pending'
              )
            ORDER BY l.due_date, l.id
            FOR UPDATE OF l SKIP LOCKED
            "#,
            LOAN_WITH_BOOK
        ))
        .bind(today)
        .fetch_all(&mut *conn)
        .await?;
        Ok(loans)
    }

    /// Count loans still out
    pub async fn count_open(&self) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE status IN ('active', 'overdue')")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Count loans past due as of `today`, whether or not a sweep has flagged them
    pub async fn count_late(&self, today: NaiveDate) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE status IN ('active', 'overdue') AND due_date < $1",
        )
        .bind(today)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

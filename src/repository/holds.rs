//! Holds repository: the FIFO queue per title

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, Pool, Postgres};

use crate::{
    error::{is_unique_violation, AppError, AppResult, CirculationError},
    models::hold::{Hold, HoldStatus, HoldWithBook},
};

const HOLD_WITH_BOOK: &str = r#"
    SELECT h.*, b.title AS book_title, b.author AS book_author, b.available_copies
    FROM holds h
    JOIN books b ON b.id = h.book_id
"#;

const OPEN_HOLD_INDEX: &str = "uq_holds_open_per_user_book";

/// A hold moved to `expired` by the sweep, with what it was before
#[derive(Debug, Clone, FromRow)]
pub struct ExpiredHold {
    #[sqlx(flatten)]
    pub hold: Hold,
    pub previous_status: HoldStatus,
    pub book_title: String,
}

impl ExpiredHold {
    /// The hold was sitting on a copy that now needs a new home
    pub fn had_earmark(&self) -> bool {
        self.previous_status == HoldStatus::Available
    }
}

#[derive(Clone)]
pub struct HoldsRepository {
    pool: Pool<Postgres>,
}

impl HoldsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_details(&self, id: i32) -> AppResult<HoldWithBook> {
        sqlx::query_as::<_, HoldWithBook>(&format!("{} WHERE h.id = $1", HOLD_WITH_BOOK))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Hold with id {} not found", id)))
    }

    /// All holds of a user, newest first
    pub async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<HoldWithBook>> {
        let holds = sqlx::query_as::<_, HoldWithBook>(&format!(
            "{} WHERE h.user_id = $1 ORDER BY h.hold_date DESC, h.id DESC",
            HOLD_WITH_BOOK
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(holds)
    }

    /// Lock a hold row for the rest of the transaction
    pub async fn lock(&self, conn: &mut PgConnection, id: i32) -> AppResult<Hold> {
        sqlx::query_as::<_, Hold>("SELECT * FROM holds WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Hold with id {} not found", id)))
    }

    /// Open holds a user has on a title, locked
    pub async fn lock_open_for(
        &self,
        conn: &mut PgConnection,
        user_id: i32,
        book_id: i32,
    ) -> AppResult<Option<Hold>> {
        let hold = sqlx::query_as::<_, Hold>(
            r#"
            SELECT * FROM holds
            WHERE user_id = $1 AND book_id = $2 AND status IN ('pending', 'available')
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(hold)
    }

    /// Queue a new pending hold. The open-hold unique index turns a duplicate into `HoldExists`.
    pub async fn insert(
        &self,
        conn: &mut PgConnection,
        user_id: i32,
        book_id: i32,
        hold_date: DateTime<Utc>,
        expiry_datetime: DateTime<Utc>,
    ) -> AppResult<Hold> {
        sqlx::query_as::<_, Hold>(
            r#"
            INSERT INTO holds (user_id, book_id, hold_date, expiry_datetime, status, fee_amount, fee_applied)
            VALUES ($1, $2, $3, $4, 'pending', 0, FALSE)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(hold_date)
        .bind(expiry_datetime)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, OPEN_HOLD_INDEX) {
                CirculationError::HoldExists.into()
            } else {
                AppError::Database(e)
            }
        })
    }

    /// Head of the queue for a title, locked. A stored `pending` hold qualifies
    /// even when its creation-time window has passed; promotion restarts it.
    /// Rows another transaction is already promoting or expiring are skipped.
    pub async fn next_pending_for_update(
        &self,
        conn: &mut PgConnection,
        book_id: i32,
    ) -> AppResult<Option<Hold>> {
        let hold = sqlx::query_as::<_, Hold>(
            r#"
            SELECT * FROM holds
            WHERE book_id = $1 AND status = 'pending'
            ORDER BY hold_date, id
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(book_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(hold)
    }

    /// Mark a pending hold available and restart its pickup window
    pub async fn promote(
        &self,
        conn: &mut PgConnection,
        id: i32,
        expiry_datetime: DateTime<Utc>,
    ) -> AppResult<Hold> {
        sqlx::query_as::<_, Hold>(
            r#"
            UPDATE holds
            SET status = 'available', expiry_datetime = $2
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expiry_datetime)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::Conflict(format!("Hold {} is no longer pending", id)))
    }

    pub async fn cancel(&self, conn: &mut PgConnection, id: i32) -> AppResult<Hold> {
        sqlx::query_as::<_, Hold>(
            "UPDATE holds SET status = 'cancelled' WHERE id = $1 AND status <> 'cancelled' RETURNING *",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| CirculationError::AlreadyCancelled.into())
    }

    /// Expire every open hold whose window closed before `now` and that has
    /// not been charged yet. Rows locked by a concurrent sweep are skipped,
    /// so each lapsed hold is expired exactly once.
    pub async fn expire_lapsed(
        &self,
        conn: &mut PgConnection,
        now: DateTime<Utc>,
        fee: Decimal,
    ) -> AppResult<Vec<ExpiredHold>> {
        let expired = sqlx::query_as::<_, ExpiredHold>(
            r#"
            WITH lapsed AS (
                SELECT id, status AS previous_status
                FROM holds
                WHERE status IN ('pending', 'available')
                  AND expiry_datetime < $1
                  AND fee_applied = FALSE
                ORDER BY id
                FOR UPDATE SKIP LOCKED
            )
            UPDATE holds h
            SET status = 'expired', fee_amount = $2, fee_applied = TRUE
            FROM lapsed, books b
            WHERE h.id = lapsed.id AND b.id = h.book_id
            RETURNING h.*, lapsed.previous_status, b.title AS book_title
            "#,
        )
        .bind(now)
        .bind(fee)
        .fetch_all(&mut *conn)
        .await?;
        Ok(expired)
    }

    pub async fn count_by_status(&self, status: HoldStatus) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM holds WHERE status = $1")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

//! Copy inventory: the only mutators of `books.available_copies`

use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult, CirculationError},
    models::book::{Book, CopyInventory},
};

const BOOK_COLUMNS: &str =
    "SELECT id, title, author, book_type, total_copies, available_copies FROM books";

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!("{} WHERE id = $1", BOOK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Get book by ID inside a transaction
    pub async fn get_in(&self, conn: &mut PgConnection, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!("{} WHERE id = $1", BOOK_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    pub async fn inventory(&self, id: i32) -> AppResult<CopyInventory> {
        Ok(self.get_by_id(id).await?.inventory())
    }

    /// Take one copy out of general availability.
    ///
    /// Single conditional update: concurrent callers racing for the last copy
    /// cannot both succeed. Returns the remaining available count.
    pub async fn reserve_copy(&self, conn: &mut PgConnection, id: i32) -> AppResult<i32> {
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE books
            SET available_copies = available_copies - 1
            WHERE id = $1 AND available_copies > 0
            RETURNING available_copies
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        match remaining {
            Some(remaining) => Ok(remaining),
            None => {
                // Distinguish a missing book from an empty shelf
                self.get_in(conn, id).await?;
                Err(CirculationError::OutOfStock.into())
            }
        }
    }

    /// Put one copy back into general availability, capped at `total_copies`.
    /// Returns the new available count.
    pub async fn release_copy(&self, conn: &mut PgConnection, id: i32) -> AppResult<i32> {
        sqlx::query_scalar(
            r#"
            UPDATE books
            SET available_copies = LEAST(available_copies + 1, total_copies)
            WHERE id = $1
            RETURNING available_copies
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }
}

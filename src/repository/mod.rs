//! Repository layer for database operations

pub mod audit;
pub mod books;
pub mod fines;
pub mod holds;
pub mod loans;
pub mod policies;

use sqlx::{PgConnection, Pool, Postgres};

use crate::error::AppResult;

/// Advisory lock namespaces (first key of `pg_advisory_xact_lock(int, int)`)
pub const LOCK_BORROWER: i32 = 1;
pub const LOCK_POLICY: i32 = 2;

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub loans: loans::LoansRepository,
    pub holds: holds::HoldsRepository,
    pub fines: fines::FinesRepository,
    pub policies: policies::PoliciesRepository,
    pub audit: audit::AuditRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            holds: holds::HoldsRepository::new(pool.clone()),
            fines: fines::FinesRepository::new(pool.clone()),
            policies: policies::PoliciesRepository::new(pool.clone()),
            audit: audit::AuditRepository,
            pool,
        }
    }

    /// Check database connectivity
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Transaction-scoped advisory lock, released on commit or rollback
pub async fn advisory_lock(conn: &mut PgConnection, namespace: i32, key: i32) -> AppResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
        .bind(namespace)
        .bind(key)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

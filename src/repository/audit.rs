//! Audit log writer

use sqlx::PgConnection;

use crate::{error::AppResult, models::audit::AuditEntry};

#[derive(Clone, Copy, Default)]
pub struct AuditRepository;

impl AuditRepository {
    /// Record an entry inside the caller's transaction, so the trail
    /// commits or rolls back with the change it describes.
    pub async fn record(&self, conn: &mut PgConnection, entry: &AuditEntry) -> AppResult<i32> {
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO audit_log
                (admin_id, action_type, entity_type, entity_id, old_values, new_values, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(entry.admin_id)
        .bind(entry.action_type)
        .bind(entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.old_values)
        .bind(&entry.new_values)
        .bind(&entry.description)
        .fetch_one(&mut *conn)
        .await?;
        Ok(id)
    }
}

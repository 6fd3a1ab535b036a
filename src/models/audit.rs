//! Audit trail entries handed to the audit-log collaborator

use serde::Serialize;
use serde_json::Value;

/// One admin-mediated mutation, with before/after snapshots
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub admin_id: i32,
    pub action_type: &'static str,
    pub entity_type: &'static str,
    pub entity_id: Option<i32>,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub description: String,
}

pub const ACTION_LOAN_POLICY_UPDATED: &str = "loan_policy_updated";
pub const ENTITY_POLICY: &str = "policy";

//! Loan policy administration

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::policy::{LoanPolicy, UpdatePolicyRequest},
    AppState,
};

use super::AuthenticatedUser;

/// Get the active loan policy
#[utoipa::path(
    get,
    path = "/admin/loan-policy",
    tag = "policy",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active policy", body = LoanPolicy),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn get_policy(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<LoanPolicy>> {
    claims.require_admin()?;

    let policy = state.services.policy.get_active_policy().await?;
    Ok(Json(policy))
}

/// Replace the active loan policy with a new version
#[utoipa::path(
    put,
    path = "/admin/loan-policy",
    tag = "policy",
    security(("bearer_auth" = [])),
    request_body = UpdatePolicyRequest,
    responses(
        (status = 200, description = "New active policy", body = LoanPolicy),
        (status = 400, description = "Value out of range"),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn update_policy(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<UpdatePolicyRequest>,
) -> AppResult<Json<LoanPolicy>> {
    claims.require_admin()?;

    let policy = state
        .services
        .policy
        .update_policy(claims.user_id, &request)
        .await?;
    Ok(Json(policy))
}

/// All policy versions, newest first
#[utoipa::path(
    get,
    path = "/admin/loan-policy/history",
    tag = "policy",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Policy history", body = Vec<LoanPolicy>),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn policy_history(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanPolicy>>> {
    claims.require_admin()?;

    let policies = state.services.policy.history().await?;
    Ok(Json(policies))
}

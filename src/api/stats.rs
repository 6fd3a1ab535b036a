//! Statistics endpoints

use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppResult, AppState};

use super::AuthenticatedUser;

/// Statistics response
#[derive(Serialize, ToSchema)]
pub struct StatsResponse {
    pub loans: LoanStats,
    pub holds: HoldStats,
    pub fines: FineStats,
}

#[derive(Serialize, ToSchema)]
pub struct LoanStats {
    /// Loans not yet returned (active or overdue)
    pub open: i64,
    /// Open loans past their due date
    pub late: i64,
}

#[derive(Serialize, ToSchema)]
pub struct HoldStats {
    /// Holds waiting in a queue
    pub pending: i64,
    /// Holds with a copy set aside for pickup
    pub available: i64,
}

#[derive(Serialize, ToSchema)]
pub struct FineStats {
    pub pending_count: i64,
    pub pending_amount: Decimal,
}

/// Get circulation statistics
#[utoipa::path(
    get,
    path = "/stats",
    tag = "stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Circulation statistics", body = StatsResponse),
        (status = 403, description = "Staff privileges required")
    )
)]
pub async fn get_stats(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<StatsResponse>> {
    claims.require_staff()?;

    let stats = state.services.stats.get_stats().await?;
    Ok(Json(stats))
}

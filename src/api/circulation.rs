//! Explicit sweep trigger for schedulers and staff

use axum::{extract::State, Json};

use crate::{error::AppResult, models::hold::SweepReport, AppState};

use super::AuthenticatedUser;

/// Expire lapsed holds and materialize overdue fines now
#[utoipa::path(
    post,
    path = "/circulation/sweep",
    tag = "circulation",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sweep completed", body = SweepReport),
        (status = 403, description = "Staff privileges required")
    )
)]
pub async fn run_sweep(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<SweepReport>> {
    claims.require_staff()?;

    let report = state.services.circulation.sweep().await?;
    Ok(Json(report))
}

//! Fine endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::fine::{AssessFineRequest, Fine, FineDetails, FineList},
    AppState,
};

use super::AuthenticatedUser;

/// List the caller's fines with totals
#[utoipa::path(
    get,
    path = "/fines",
    tag = "fines",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's fines and summary", body = FineList)
    )
)]
pub async fn list_my_fines(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<FineList>> {
    let fines = state.services.circulation.list_fines(&claims).await?;
    Ok(Json(fines))
}

/// Get a fine
#[utoipa::path(
    get,
    path = "/fines/{id}",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Fine ID")
    ),
    responses(
        (status = 200, description = "Fine details", body = FineDetails),
        (status = 404, description = "Fine not found")
    )
)]
pub async fn get_fine(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(fine_id): Path<i32>,
) -> AppResult<Json<FineDetails>> {
    let fine = state.services.circulation.get_fine(&claims, fine_id).await?;
    Ok(Json(fine))
}

/// Pay a pending fine
#[utoipa::path(
    post,
    path = "/fines/{id}/pay",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Fine ID")
    ),
    responses(
        (status = 200, description = "Fine paid", body = Fine),
        (status = 404, description = "Fine not found"),
        (status = 409, description = "Fine already paid or waived", body = crate::error::ErrorResponse)
    )
)]
pub async fn pay_fine(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(fine_id): Path<i32>,
) -> AppResult<Json<Fine>> {
    let fine = state.services.circulation.pay_fine(&claims, fine_id).await?;
    Ok(Json(fine))
}

/// Waive a pending fine (staff)
#[utoipa::path(
    post,
    path = "/fines/{id}/waive",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Fine ID")
    ),
    responses(
        (status = 200, description = "Fine waived", body = Fine),
        (status = 403, description = "Staff privileges required"),
        (status = 404, description = "Fine not found"),
        (status = 409, description = "Fine already paid or waived", body = crate::error::ErrorResponse)
    )
)]
pub async fn waive_fine(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(fine_id): Path<i32>,
) -> AppResult<Json<Fine>> {
    claims.require_staff()?;

    let fine = state
        .services
        .circulation
        .waive_fine(claims.user_id, fine_id)
        .await?;
    Ok(Json(fine))
}

/// Assess a damage or lost-item fine against a loan (staff)
#[utoipa::path(
    post,
    path = "/fines",
    tag = "fines",
    security(("bearer_auth" = [])),
    request_body = AssessFineRequest,
    responses(
        (status = 201, description = "Fine created", body = Fine),
        (status = 400, description = "Invalid type or amount"),
        (status = 403, description = "Staff privileges required"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn assess_fine(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<AssessFineRequest>,
) -> AppResult<(StatusCode, Json<Fine>)> {
    claims.require_staff()?;

    let fine = state
        .services
        .circulation
        .assess_fine(claims.user_id, &request)
        .await?;
    Ok((StatusCode::CREATED, Json(fine)))
}

//! Hold queue endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::hold::{CreateHoldRequest, Hold, HoldDetails},
    AppState,
};

use super::AuthenticatedUser;

/// List the caller's holds
#[utoipa::path(
    get,
    path = "/holds",
    tag = "holds",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's holds, newest first", body = Vec<HoldDetails>)
    )
)]
pub async fn list_my_holds(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<HoldDetails>>> {
    let holds = state.services.circulation.list_holds(&claims).await?;
    Ok(Json(holds))
}

/// Get a hold
#[utoipa::path(
    get,
    path = "/holds/{id}",
    tag = "holds",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Hold ID")
    ),
    responses(
        (status = 200, description = "Hold details", body = HoldDetails),
        (status = 404, description = "Hold not found")
    )
)]
pub async fn get_hold(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(hold_id): Path<i32>,
) -> AppResult<Json<HoldDetails>> {
    let hold = state.services.circulation.get_hold(&claims, hold_id).await?;
    Ok(Json(hold))
}

/// Place a hold on a physical book
#[utoipa::path(
    post,
    path = "/holds",
    tag = "holds",
    security(("bearer_auth" = [])),
    request_body = CreateHoldRequest,
    responses(
        (status = 201, description = "Hold placed", body = Hold),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Not eligible or hold already open", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_hold(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateHoldRequest>,
) -> AppResult<(StatusCode, Json<Hold>)> {
    let hold = state
        .services
        .circulation
        .create_hold(&claims, request.book_id)
        .await?;
    Ok((StatusCode::CREATED, Json(hold)))
}

/// Cancel a hold
#[utoipa::path(
    delete,
    path = "/holds/{id}",
    tag = "holds",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Hold ID")
    ),
    responses(
        (status = 200, description = "Hold cancelled", body = Hold),
        (status = 404, description = "Hold not found"),
        (status = 409, description = "Already cancelled", body = crate::error::ErrorResponse)
    )
)]
pub async fn cancel_hold(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(hold_id): Path<i32>,
) -> AppResult<Json<Hold>> {
    let hold = state.services.circulation.cancel_hold(&claims, hold_id).await?;
    Ok(Json(hold))
}

//! Loan endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::loan::{
        AssignLoanRequest, CreateLoanRequest, Loan, LoanDetails, LoanQuery, ReturnLoanRequest,
        ReturnOutcome,
    },
    AppState,
};

use super::AuthenticatedUser;

/// List the caller's loans
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's loans, newest first", body = Vec<LoanDetails>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_my_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.circulation.list_loans(&claims).await?;
    Ok(Json(loans))
}

/// Get a loan
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.circulation.get_loan(&claims, loan_id).await?;
    Ok(Json(loan))
}

/// Borrow a book (self-service, electronic titles)
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoanRequest,
    responses(
        (status = 201, description = "Loan created", body = Loan),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Not eligible, already borrowed, limit reached or out of stock", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateLoanRequest>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    let loan = state
        .services
        .circulation
        .borrow(&claims, request.book_id)
        .await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Check a book out to a patron (staff)
#[utoipa::path(
    post,
    path = "/staff/loans/assign",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = AssignLoanRequest,
    responses(
        (status = 201, description = "Loan created", body = Loan),
        (status = 400, description = "Invalid loan period"),
        (status = 403, description = "Staff privileges required"),
        (status = 409, description = "Already borrowed, limit reached or out of stock", body = crate::error::ErrorResponse)
    )
)]
pub async fn assign_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<AssignLoanRequest>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    claims.require_staff()?;

    let loan = state
        .services
        .circulation
        .assign(claims.user_id, &request)
        .await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// List loans across all patrons (staff)
#[utoipa::path(
    get,
    path = "/staff/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanQuery),
    responses(
        (status = 200, description = "Loans; open loans when no status is given", body = Vec<LoanDetails>),
        (status = 403, description = "Staff privileges required")
    )
)]
pub async fn list_all_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    claims.require_staff()?;

    let loans = state.services.circulation.list_all_loans(query.status).await?;
    Ok(Json(loans))
}

/// Renew a loan
#[utoipa::path(
    post,
    path = "/loans/{id}/renew",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan renewed", body = Loan),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Not active, overdue or renewal limit reached", body = crate::error::ErrorResponse)
    )
)]
pub async fn renew_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.circulation.renew(&claims, loan_id).await?;
    Ok(Json(loan))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body = ReturnLoanRequest,
    responses(
        (status = 200, description = "Book returned", body = ReturnOutcome),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
    request: Option<Json<ReturnLoanRequest>>,
) -> AppResult<Json<ReturnOutcome>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();

    let outcome = state
        .services
        .circulation
        .return_loan(&claims, loan_id, &request)
        .await?;
    Ok(Json(outcome))
}

//! API handlers for the circulation REST endpoints

pub mod circulation;
pub mod fines;
pub mod health;
pub mod holds;
pub mod loans;
pub mod openapi;
pub mod policy;
pub mod stats;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Authentication("Invalid authorization header format".to_string())
        })?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Loans
        .route("/loans", get(loans::list_my_loans).post(loans::borrow))
        .route("/loans/:id", get(loans::get_loan))
        .route("/loans/:id/renew", post(loans::renew_loan))
        .route("/loans/:id/return", post(loans::return_loan))
        .route("/staff/loans", get(loans::list_all_loans))
        .route("/staff/loans/assign", post(loans::assign_loan))
        // Holds
        .route("/holds", get(holds::list_my_holds).post(holds::create_hold))
        .route("/holds/:id", get(holds::get_hold).delete(holds::cancel_hold))
        // Fines
        .route("/fines", get(fines::list_my_fines).post(fines::assess_fine))
        .route("/fines/:id", get(fines::get_fine))
        .route("/fines/:id/pay", post(fines::pay_fine))
        .route("/fines/:id/waive", post(fines::waive_fine))
        // Sweeps
        .route("/circulation/sweep", post(circulation::run_sweep))
        // Loan policy
        .route(
            "/admin/loan-policy",
            get(policy::get_policy).put(policy::update_policy),
        )
        .route("/admin/loan-policy/history", get(policy::policy_history))
        // Statistics
        .route("/stats", get(stats::get_stats))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
}

//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{circulation, fines, health, holds, loans, policy, stats};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Circulation API",
        version = "1.0.0",
        description = "University library circulation: loans, holds and fines",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Loans
        loans::list_my_loans,
        loans::get_loan,
        loans::borrow,
        loans::assign_loan,
        loans::list_all_loans,
        loans::renew_loan,
        loans::return_loan,
        // Holds
        holds::list_my_holds,
        holds::get_hold,
        holds::create_hold,
        holds::cancel_hold,
        // Fines
        fines::list_my_fines,
        fines::get_fine,
        fines::pay_fine,
        fines::waive_fine,
        fines::assess_fine,
        // Sweeps
        circulation::run_sweep,
        // Policy
        policy::get_policy,
        policy::update_policy,
        policy::policy_history,
        // Stats
        stats::get_stats,
    ),
    components(
        schemas(
            // Books
            crate::models::book::BookType,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanStatus,
            crate::models::loan::ReturnCondition,
            crate::models::loan::LoanDetails,
            crate::models::loan::CreateLoanRequest,
            crate::models::loan::AssignLoanRequest,
            crate::models::loan::ReturnLoanRequest,
            crate::models::loan::ReturnOutcome,
            // Holds
            crate::models::hold::Hold,
            crate::models::hold::HoldStatus,
            crate::models::hold::HoldDetails,
            crate::models::hold::CreateHoldRequest,
            crate::models::hold::SweepReport,
            // Fines
            crate::models::fine::Fine,
            crate::models::fine::FineType,
            crate::models::fine::FineStatus,
            crate::models::fine::FineDetails,
            crate::models::fine::FineSummary,
            crate::models::fine::FineList,
            crate::models::fine::AssessFineRequest,
            // Policy
            crate::models::policy::LoanPolicy,
            crate::models::policy::UpdatePolicyRequest,
            // Stats
            stats::StatsResponse,
            stats::LoanStats,
            stats::HoldStats,
            stats::FineStats,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "loans", description = "Borrowing, renewal and return"),
        (name = "holds", description = "Hold queue"),
        (name = "fines", description = "Fine ledger"),
        (name = "circulation", description = "Expiry and overdue sweeps"),
        (name = "policy", description = "Loan policy administration"),
        (name = "stats", description = "Statistics")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by the secured paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

//! Versioned loan policy

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Loan policy row. Exactly one row is active at a time; older rows are kept as history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanPolicy {
    /// None for the built-in default used when no row is active
    pub id: Option<i32>,
    pub loan_period_days: i32,
    pub max_loans_per_user: i32,
    pub max_renewals_per_loan: i32,
    pub fine_rate_per_day: Decimal,
    pub grace_period_days: i32,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            id: None,
            loan_period_days: 14,
            max_loans_per_user: 5,
            max_renewals_per_loan: 1,
            fine_rate_per_day: Decimal::new(500, 2),
            grace_period_days: 0,
            is_active: true,
            created_at: None,
        }
    }
}

impl LoanPolicy {
    /// Fine owed for `days_overdue` days under this policy.
    /// Nothing accrues inside the grace period; after it, every late day is charged.
    pub fn fine_amount(&self, days_overdue: i64) -> Decimal {
        let grace = i64::from(self.grace_period_days);
        if days_overdue <= grace {
            return Decimal::ZERO;
        }
        Decimal::from(days_overdue - grace) * self.fine_rate_per_day
    }

    pub fn values(&self) -> PolicyValues {
        PolicyValues {
            loan_period_days: self.loan_period_days,
            max_loans_per_user: self.max_loans_per_user,
            max_renewals_per_loan: self.max_renewals_per_loan,
            fine_rate_per_day: self.fine_rate_per_day,
            grace_period_days: self.grace_period_days,
        }
    }
}

/// The tunable part of a policy, as written to a new row and to the audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PolicyValues {
    pub loan_period_days: i32,
    pub max_loans_per_user: i32,
    pub max_renewals_per_loan: i32,
    pub fine_rate_per_day: Decimal,
    pub grace_period_days: i32,
}

impl PolicyValues {
    /// Human-readable summary used in the audit trail
    pub fn describe(&self) -> String {
        format!(
            "Updated loan policy: {} days, max {} loans, {} renewals, {}/day fine, {} grace days",
            self.loan_period_days,
            self.max_loans_per_user,
            self.max_renewals_per_loan,
            self.fine_rate_per_day,
            self.grace_period_days
        )
    }
}

/// Update policy request (admin only). Omitted fields keep their current value.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdatePolicyRequest {
    #[validate(range(min = 1, max = 365, message = "Loan period must be between 1 and 365 days"))]
    pub loan_period_days: Option<i32>,
    #[validate(range(min = 1, max = 50, message = "Max loans per user must be between 1 and 50"))]
    pub max_loans_per_user: Option<i32>,
    #[validate(range(min = 0, max = 10, message = "Max renewals per loan must be between 0 and 10"))]
    pub max_renewals_per_loan: Option<i32>,
    pub fine_rate_per_day: Option<Decimal>,
    #[validate(range(min = 0, max = 30, message = "Grace period must be between 0 and 30 days"))]
    pub grace_period_days: Option<i32>,
}

impl UpdatePolicyRequest {
    /// Validate bounds, then merge over the current policy
    pub fn apply_to(&self, current: &LoanPolicy) -> AppResult<PolicyValues> {
        self.validate()?;

        if let Some(rate) = self.fine_rate_per_day {
            if rate < Decimal::ZERO || rate > Decimal::from(100) {
                return Err(AppError::Validation(
                    "Fine rate per day must be between 0 and 100".to_string(),
                ));
            }
        }

        let current = current.values();
        Ok(PolicyValues {
            loan_period_days: self.loan_period_days.unwrap_or(current.loan_period_days),
            max_loans_per_user: self.max_loans_per_user.unwrap_or(current.max_loans_per_user),
            max_renewals_per_loan: self
                .max_renewals_per_loan
                .unwrap_or(current.max_renewals_per_loan),
            fine_rate_per_day: self.fine_rate_per_day.unwrap_or(current.fine_rate_per_day),
            grace_period_days: self.grace_period_days.unwrap_or(current.grace_period_days),
        })
    }
}

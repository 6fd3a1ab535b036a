//! Fine ledger model
//!
//! Fines are derived records: overdue fines are materialized lazily from late
//! loans, hold-expiry fines from the expiry sweep. Once created a fine only
//! changes through payment or waiver.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, AppResult, CirculationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FineType {
    Overdue,
    HoldExpiry,
    Damage,
    Lost,
}

text_enum!(FineType {
    Overdue => "overdue",
    HoldExpiry => "hold_expiry",
    Damage => "damage",
    Lost => "lost",
});

impl FineType {
    /// Types staff may assess by hand; the others are derived
    pub fn is_assessable(&self) -> bool {
        matches!(self, FineType::Damage | FineType::Lost)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FineStatus {
    Pending,
    Paid,
    Waived,
}

text_enum!(FineStatus {
    Pending => "pending",
    Paid => "paid",
    Waived => "waived",
});

/// Whole days between the due date and today, both taken at midnight.
pub fn days_overdue(due_date: NaiveDate, today: NaiveDate) -> i64 {
    (today - due_date).num_days().max(0)
}

pub fn overdue_description(book_title: &str, days_overdue: i64) -> String {
    format!(
        "Overdue fine for \"{}\". {} day(s) overdue.",
        book_title, days_overdue
    )
}

pub fn hold_expiry_description(book_title: &str) -> String {
    format!("Hold on \"{}\" expired without pickup.", book_title)
}

/// Fine model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Fine {
    pub id: i32,
    pub user_id: i32,
    pub loan_id: Option<i32>,
    pub hold_id: Option<i32>,
    pub amount: Decimal,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub fine_type: FineType,
    pub status: FineStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Fine {
    /// Only pending fines can be paid or waived
    pub fn check_settleable(&self) -> Result<(), CirculationError> {
        if self.status != FineStatus::Pending {
            return Err(CirculationError::AlreadySettled(self.status.to_string()));
        }
        Ok(())
    }
}

/// Fine with the title of the book it relates to (via its loan or hold)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct FineDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub fine: Fine,
    pub book_id: Option<i32>,
    pub book_title: Option<String>,
}

/// Totals shown next to a patron's fine list
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow, ToSchema)]
pub struct FineSummary {
    pub pending_count: i64,
    pub pending_amount: Decimal,
    pub paid_amount: Decimal,
}

/// A patron's fines with totals
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FineList {
    pub fines: Vec<FineDetails>,
    pub summary: FineSummary,
}

/// Staff assessment of a damage or lost-item fine
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AssessFineRequest {
    pub loan_id: i32,
    #[serde(rename = "type")]
    pub fine_type: FineType,
    pub amount: Decimal,
    #[validate(length(min = 1, max = 2000, message = "Description must be 1-2000 characters"))]
    pub description: String,
}

impl AssessFineRequest {
    pub fn check(&self) -> AppResult<()> {
        self.validate()?;
        if !self.fine_type.is_assessable() {
            return Err(AppError::Validation(
                "Only damage and lost fines can be assessed manually".to_string(),
            ));
        }
        if self.amount <= Decimal::ZERO {
            return Err(AppError::Validation("Amount must be positive".to_string()));
        }
        Ok(())
    }
}

//! Loan model and lifecycle rules
//!
//! A loan moves `active -> returned` or `active -> overdue -> returned`.
//! The stored `overdue` status is only written when a fine is materialized,
//! so read paths derive lateness from `due_date` instead of trusting `status`.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{
    book::BookType,
    fine::{days_overdue, Fine},
    hold::Hold,
    policy::LoanPolicy,
};
use crate::error::CirculationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Active,
    Returned,
    Overdue,
}

text_enum!(LoanStatus {
    Active => "active",
    Returned => "returned",
    Overdue => "overdue",
});

impl LoanStatus {
    /// The book is still out (overdue is a sub-state of active)
    pub fn is_open(&self) -> bool {
        matches!(self, LoanStatus::Active | LoanStatus::Overdue)
    }
}

/// Condition noted by staff when a book comes back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReturnCondition {
    Excellent,
    Good,
    Fair,
    Poor,
    Damaged,
}

text_enum!(ReturnCondition {
    Excellent => "excellent",
    Good => "good",
    Fair => "fair",
    Poor => "poor",
    Damaged => "damaged",
});

/// How a loan is being created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowChannel {
    /// Patron self-service
    Direct,
    /// Front desk assignment
    Staff { staff_id: i32 },
}

impl BorrowChannel {
    pub fn staff_id(&self) -> Option<i32> {
        match self {
            BorrowChannel::Direct => None,
            BorrowChannel::Staff { staff_id } => Some(*staff_id),
        }
    }
}

/// Physical copies must be handed out by staff; electronic titles are self-service.
pub fn check_borrow_channel(
    channel: BorrowChannel,
    book_type: BookType,
) -> Result<(), CirculationError> {
    match channel {
        BorrowChannel::Staff { .. } => Ok(()),
        BorrowChannel::Direct if book_type.allows_self_checkout() => Ok(()),
        BorrowChannel::Direct => Err(CirculationError::NotEligible(
            "Physical books must be checked out at the front desk".to_string(),
        )),
    }
}

/// Loan-count limit, counting both active and overdue loans
pub fn check_loan_limit(open_loans: i64, policy: &LoanPolicy) -> Result<(), CirculationError> {
    if open_loans >= i64::from(policy.max_loans_per_user) {
        return Err(CirculationError::LoanLimitReached {
            current: open_loans,
            max: policy.max_loans_per_user,
        });
    }
    Ok(())
}

/// Due date fixed at creation from the policy in effect at that moment
pub fn due_date_for(loan_date: DateTime<Utc>, loan_period_days: i32) -> NaiveDate {
    loan_date.date_naive() + Duration::days(i64::from(loan_period_days))
}

/// Loan model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub loan_date: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub renewal_count: i32,
    pub assigned_by_staff_id: Option<i32>,
    pub returned_by_staff_id: Option<i32>,
    pub return_condition: Option<ReturnCondition>,
    pub return_notes: Option<String>,
}

impl Loan {
    /// Logically late, whatever the stored status says
    pub fn is_late(&self, today: NaiveDate) -> bool {
        self.status.is_open() && self.due_date < today
    }

    /// Status as of `today`, without waiting for the next fine sweep
    pub fn effective_status(&self, today: NaiveDate) -> LoanStatus {
        if self.is_late(today) {
            LoanStatus::Overdue
        } else {
            self.status
        }
    }

    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        if self.status.is_open() {
            days_overdue(self.due_date, today)
        } else {
            0
        }
    }

    /// Renewal rules, evaluated against the policy active right now
    /// (which may differ from the one the loan was created under).
    pub fn check_renewable(
        &self,
        policy: &LoanPolicy,
        today: NaiveDate,
    ) -> Result<(), CirculationError> {
        match self.status {
            LoanStatus::Returned => return Err(CirculationError::NotActive),
            LoanStatus::Overdue => return Err(CirculationError::Overdue),
            LoanStatus::Active => {}
        }
        if self.due_date < today {
            return Err(CirculationError::Overdue);
        }
        if self.renewal_count >= policy.max_renewals_per_loan {
            return Err(CirculationError::RenewalLimitReached {
                current: self.renewal_count,
                max: policy.max_renewals_per_loan,
            });
        }
        Ok(())
    }

    /// Due date after one renewal under `policy`
    pub fn renewed_due_date(&self, policy: &LoanPolicy) -> NaiveDate {
        self.due_date + Duration::days(i64::from(policy.loan_period_days))
    }

    pub fn check_returnable(&self) -> Result<(), CirculationError> {
        if self.status == LoanStatus::Returned {
            return Err(CirculationError::AlreadyReturned);
        }
        Ok(())
    }
}

/// Loan joined with its book, as read from the database
#[derive(Debug, Clone, FromRow)]
pub struct LoanWithBook {
    #[sqlx(flatten)]
    pub loan: Loan,
    pub book_title: String,
    pub book_author: String,
    pub book_type: BookType,
}

/// Loan with book details and read-time derived state
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    #[serde(flatten)]
    pub loan: Loan,
    pub book_title: String,
    pub book_author: String,
    pub book_type: BookType,
    /// Derived from the due date; may be true while `status` is still `active`
    pub is_overdue: bool,
    pub effective_status: LoanStatus,
    pub days_overdue: i64,
    /// Fine the loan would carry today under the current policy
    pub accrued_fine: Decimal,
}

impl LoanDetails {
    pub fn derive(row: LoanWithBook, today: NaiveDate, policy: &LoanPolicy) -> Self {
        let days = row.loan.days_overdue(today);
        Self {
            is_overdue: row.loan.is_late(today),
            effective_status: row.loan.effective_status(today),
            days_overdue: days,
            accrued_fine: policy.fine_amount(days),
            book_title: row.book_title,
            book_author: row.book_author,
            book_type: row.book_type,
            loan: row.loan,
        }
    }
}

/// Patron self-service borrow request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLoanRequest {
    pub book_id: i32,
}

/// Staff assignment request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AssignLoanRequest {
    pub user_id: i32,
    pub book_id: i32,
    /// Overrides the policy loan period for this loan only
    #[validate(range(min = 1, max = 365, message = "Loan period must be between 1 and 365 days"))]
    pub loan_period_days: Option<i32>,
}

/// Return request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct ReturnLoanRequest {
    pub return_condition: Option<ReturnCondition>,
    #[validate(length(max = 2000, message = "Return notes must be at most 2000 characters"))]
    pub return_notes: Option<String>,
}

/// Loan list filter (staff)
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct LoanQuery {
    pub status: Option<LoanStatus>,
}

/// Everything a return changed
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReturnOutcome {
    pub loan: Loan,
    pub days_overdue: i64,
    /// Overdue fine materialized by this return, if any
    pub fine: Option<Fine>,
    /// Hold that received the freed copy, if any
    pub promoted_hold: Option<Hold>,
}

//! Hold (reservation) queue model
//!
//! One FIFO queue per physical title, ordered by `hold_date`. A hold is
//! `pending` while queued and `available` once a returned copy has been
//! earmarked for it; either way it lapses at `expiry_datetime`.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::{book::BookType, user::Role};
use crate::error::CirculationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HoldStatus {
    Pending,
    Available,
    Cancelled,
    Expired,
}

text_enum!(HoldStatus {
    Pending => "pending",
    Available => "available",
    Cancelled => "cancelled",
    Expired => "expired",
});

impl HoldStatus {
    /// Still in the queue or waiting for pickup
    pub fn is_open(&self) -> bool {
        matches!(self, HoldStatus::Pending | HoldStatus::Available)
    }
}

/// End of a hold window opened at `from`
pub fn hold_window_end(from: DateTime<Utc>, window_hours: i64) -> DateTime<Utc> {
    from + Duration::hours(window_hours)
}

/// Only patrons queue, and only for titles with a physical copy
pub fn check_hold_eligibility(role: Role, book_type: BookType) -> Result<(), CirculationError> {
    if role != Role::User {
        return Err(CirculationError::NotEligible(
            "Staff and administrators cannot place holds".to_string(),
        ));
    }
    if !book_type.is_holdable() {
        return Err(CirculationError::NotEligible(
            "Holds can only be placed on physical books".to_string(),
        ));
    }
    Ok(())
}

/// Hold model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Hold {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub hold_date: DateTime<Utc>,
    pub expiry_datetime: DateTime<Utc>,
    pub status: HoldStatus,
    pub fee_amount: Decimal,
    pub fee_applied: bool,
}

impl Hold {
    /// Status as of `now`, without waiting for the next expiry sweep
    pub fn effective_status(&self, now: DateTime<Utc>) -> HoldStatus {
        if self.status.is_open() && self.expiry_datetime < now {
            HoldStatus::Expired
        } else {
            self.status
        }
    }

    /// An `available` hold has a copy set aside for it
    pub fn holds_earmark(&self) -> bool {
        self.status == HoldStatus::Available
    }

    pub fn check_cancellable(&self) -> Result<(), CirculationError> {
        if self.status == HoldStatus::Cancelled {
            return Err(CirculationError::AlreadyCancelled);
        }
        Ok(())
    }
}

/// Hold joined with its book, as read from the database
#[derive(Debug, Clone, FromRow)]
pub struct HoldWithBook {
    #[sqlx(flatten)]
    pub hold: Hold,
    pub book_title: String,
    pub book_author: String,
    pub available_copies: i32,
}

/// Hold with book details and read-time derived status
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HoldDetails {
    #[serde(flatten)]
    pub hold: Hold,
    pub book_title: String,
    pub book_author: String,
    pub available_copies: i32,
    pub effective_status: HoldStatus,
}

impl HoldDetails {
    pub fn derive(row: HoldWithBook, now: DateTime<Utc>) -> Self {
        Self {
            effective_status: row.hold.effective_status(now),
            book_title: row.book_title,
            book_author: row.book_author,
            available_copies: row.available_copies,
            hold: row.hold,
        }
    }
}

/// Place hold request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateHoldRequest {
    pub book_id: i32,
}

/// Counts produced by a sweep call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SweepReport {
    pub holds_expired: usize,
    pub hold_fines_created: usize,
    pub holds_promoted: usize,
    pub copies_released: usize,
    pub overdue_fines_created: usize,
}

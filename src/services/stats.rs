//! Statistics service: read-only aggregates for reporting

use chrono::Utc;

use crate::{
    api::stats::{FineStats, HoldStats, LoanStats, StatsResponse},
    error::AppResult,
    models::hold::HoldStatus,
    repository::Repository,
};

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Current circulation counts. Never triggers a sweep, so `loans.late`
    /// may exceed the number of loans already flagged overdue.
    pub async fn get_stats(&self) -> AppResult<StatsResponse> {
        let today = Utc::now().date_naive();

        let loans = LoanStats {
            open: self.repository.loans.count_open().await?,
            late: self.repository.loans.count_late(today).await?,
        };

        let holds = HoldStats {
            pending: self.repository.holds.count_by_status(HoldStatus::Pending).await?,
            available: self.repository.holds.count_by_status(HoldStatus::Available).await?,
        };

        let (pending_count, pending_amount) = self.repository.fines.pending_totals().await?;
        let fines = FineStats {
            pending_count,
            pending_amount,
        };

        Ok(StatsResponse { loans, holds, fines })
    }
}

//! Circulation coordinator
//!
//! The only component that touches more than one of books, loans, holds and
//! fines in a single operation. Every cross-entity transition runs in one
//! database transaction; copy counters move only through
//! `BooksRepository::reserve_copy` / `release_copy`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use validator::Validate;

use crate::{
    config::CirculationConfig,
    error::{AppError, AppResult, CirculationError},
    models::{
        fine::{
            hold_expiry_description, overdue_description, AssessFineRequest, Fine, FineDetails,
            FineList,
        },
        hold::{check_hold_eligibility, hold_window_end, Hold, HoldDetails, SweepReport},
        loan::{
            check_borrow_channel, check_loan_limit, due_date_for, AssignLoanRequest,
            BorrowChannel, Loan, LoanDetails, LoanStatus, LoanWithBook, ReturnLoanRequest,
            ReturnOutcome,
        },
        user::UserClaims,
    },
    repository::{advisory_lock, loans::LoanReturn, loans::NewLoan, Repository, LOCK_BORROWER},
    services::policy::PolicyStore,
};

#[derive(Clone)]
pub struct CirculationService {
    repository: Repository,
    policies: PolicyStore,
    config: CirculationConfig,
}

/// Patrons only see their own records; anything else reads as missing.
fn ensure_visible(claims: &UserClaims, owner_id: i32, entity: &str, id: i32) -> AppResult<()> {
    if claims.can_access(owner_id) {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("{} with id {} not found", entity, id)))
    }
}

impl CirculationService {
    pub fn new(repository: Repository, policies: PolicyStore, config: CirculationConfig) -> Self {
        Self {
            repository,
            policies,
            config,
        }
    }

    // =========================================================================
    // LOANS
    // =========================================================================

    /// Patron self-service borrow (electronic titles)
    pub async fn borrow(&self, claims: &UserClaims, book_id: i32) -> AppResult<Loan> {
        self.create_loan(claims.user_id, book_id, BorrowChannel::Direct, None)
            .await
    }

    /// Front-desk checkout on behalf of a patron
    pub async fn assign(&self, staff_id: i32, request: &AssignLoanRequest) -> AppResult<Loan> {
        request.validate()?;
        self.create_loan(
            request.user_id,
            request.book_id,
            BorrowChannel::Staff { staff_id },
            request.loan_period_days,
        )
        .await
    }

    async fn create_loan(
        &self,
        user_id: i32,
        book_id: i32,
        channel: BorrowChannel,
        period_override: Option<i32>,
    ) -> AppResult<Loan> {
        let policy = self.policies.get_active_policy().await?;
        let now = Utc::now();

        let mut tx = self.repository.pool.begin().await?;
        // Serializes the open-loan count per borrower
        advisory_lock(&mut tx, LOCK_BORROWER, user_id).await?;

        let book = self.repository.books.get_in(&mut tx, book_id).await?;
        check_borrow_channel(channel, book.book_type)?;

        if self.repository.loans.has_open_loan(&mut tx, user_id, book_id).await? {
            return Err(CirculationError::AlreadyBorrowed.into());
        }
        let open_loans = self.repository.loans.count_open_for_user(&mut tx, user_id).await?;
        check_loan_limit(open_loans, &policy)?;

        // A borrower's own open hold on the title is closed by the checkout;
        // if a copy was earmarked for it, the loan takes that copy.
        let consumed_earmark = match self
            .repository
            .holds
            .lock_open_for(&mut tx, user_id, book_id)
            .await?
        {
            Some(hold) => {
                self.repository.holds.cancel(&mut tx, hold.id).await?;
                hold.holds_earmark()
            }
            None => false,
        };
        if !consumed_earmark {
            self.repository.books.reserve_copy(&mut tx, book_id).await?;
        }

        let period = period_override.unwrap_or(policy.loan_period_days);
        let loan = self
            .repository
            .loans
            .insert(
                &mut tx,
                &NewLoan {
                    user_id,
                    book_id,
                    loan_date: now,
                    due_date: due_date_for(now, period),
                    assigned_by_staff_id: channel.staff_id(),
                },
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            loan_id = loan.id,
            user_id,
            book_id,
            staff_id = ?channel.staff_id(),
            due_date = %loan.due_date,
            consumed_earmark,
            "Loan created"
        );
        Ok(loan)
    }

    /// Extend a loan by one loan period, under the policy active now
    pub async fn renew(&self, claims: &UserClaims, loan_id: i32) -> AppResult<Loan> {
        let policy = self.policies.get_active_policy().await?;
        let today = Utc::now().date_naive();

        let mut tx = self.repository.pool.begin().await?;
        let loan = self.repository.loans.lock(&mut tx, loan_id).await?;
        ensure_visible(claims, loan.user_id, "Loan", loan_id)?;
        loan.check_renewable(&policy, today)?;

        let renewed = self
            .repository
            .loans
            .renew(&mut tx, loan_id, loan.renewed_due_date(&policy))
            .await?;
        tx.commit().await?;

        tracing::info!(
            loan_id,
            renewal_count = renewed.renewal_count,
            due_date = %renewed.due_date,
            "Loan renewed"
        );
        Ok(renewed)
    }

    /// Close a loan, charge any lateness, free the copy and hand it to the
    /// head of the hold queue. All or nothing.
    pub async fn return_loan(
        &self,
        claims: &UserClaims,
        loan_id: i32,
        request: &ReturnLoanRequest,
    ) -> AppResult<ReturnOutcome> {
        request.validate()?;
        let policy = self.policies.get_active_policy().await?;
        let now = Utc::now();
        let today = now.date_naive();

        let mut tx = self.repository.pool.begin().await?;
        let loan = self.repository.loans.lock(&mut tx, loan_id).await?;
        ensure_visible(claims, loan.user_id, "Loan", loan_id)?;
        loan.check_returnable()?;

        let days_overdue = loan.days_overdue(today);
        let amount = policy.fine_amount(days_overdue);
        let fine = if amount > Decimal::ZERO {
            let book = self.repository.books.get_in(&mut tx, loan.book_id).await?;
            // An already materialized pending fine is left as is
            self.repository
                .fines
                .insert_overdue(
                    &mut tx,
                    loan.user_id,
                    loan.id,
                    amount,
                    &overdue_description(&book.title, days_overdue),
                    now,
                )
                .await?
        } else {
            None
        };

        let staff_id = claims.is_staff().then_some(claims.user_id);
        let returned = self
            .repository
            .loans
            .mark_returned(
                &mut tx,
                loan_id,
                &LoanReturn {
                    return_date: now,
                    returned_by_staff_id: staff_id,
                    return_condition: request.return_condition,
                    return_notes: request.return_notes.clone(),
                },
            )
            .await?;

        let promoted_hold = self.release_and_promote(&mut tx, loan.book_id, now).await?;
        tx.commit().await?;

        tracing::info!(
            loan_id,
            book_id = loan.book_id,
            days_overdue,
            fine_id = ?fine.as_ref().map(|f| f.id),
            promoted_hold = ?promoted_hold.as_ref().map(|h| h.id),
            "Loan returned"
        );

        Ok(ReturnOutcome {
            loan: returned,
            days_overdue,
            fine,
            promoted_hold,
        })
    }

    /// Put a copy back on the shelf, then give it to the oldest pending hold,
    /// if any, with a fresh pickup window. Returns the promoted hold.
    async fn release_and_promote(
        &self,
        conn: &mut PgConnection,
        book_id: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Hold>> {
        self.repository.books.release_copy(conn, book_id).await?;

        let Some(next) = self
            .repository
            .holds
            .next_pending_for_update(conn, book_id)
            .await?
        else {
            return Ok(None);
        };

        self.repository.books.reserve_copy(conn, book_id).await?;
        let window_end = hold_window_end(now, self.config.hold_window_hours);
        let promoted = self.repository.holds.promote(conn, next.id, window_end).await?;

        tracing::info!(
            hold_id = promoted.id,
            user_id = promoted.user_id,
            book_id,
            expiry = %promoted.expiry_datetime,
            "Hold promoted"
        );
        Ok(Some(promoted))
    }

    /// The caller's loans with derived lateness, after materializing overdue fines
    pub async fn list_loans(&self, claims: &UserClaims) -> AppResult<Vec<LoanDetails>> {
        self.materialize_overdue_fines().await?;
        let rows = self.repository.loans.list_for_user(claims.user_id).await?;
        self.loan_details(rows).await
    }

    /// Loans across all patrons (staff); open loans when no status is given
    pub async fn list_all_loans(&self, status: Option<LoanStatus>) -> AppResult<Vec<LoanDetails>> {
        self.materialize_overdue_fines().await?;
        let rows = self.repository.loans.list(status).await?;
        self.loan_details(rows).await
    }

    pub async fn get_loan(&self, claims: &UserClaims, loan_id: i32) -> AppResult<LoanDetails> {
        let row = self.repository.loans.get_details(loan_id).await?;
        ensure_visible(claims, row.loan.user_id, "Loan", loan_id)?;
        let policy = self.policies.get_active_policy().await?;
        Ok(LoanDetails::derive(row, Utc::now().date_naive(), &policy))
    }

    async fn loan_details(
        &self,
        rows: Vec<LoanWithBook>,
    ) -> AppResult<Vec<LoanDetails>> {
        let policy = self.policies.get_active_policy().await?;
        let today = Utc::now().date_naive();
        Ok(rows
            .into_iter()
            .map(|row| LoanDetails::derive(row, today, &policy))
            .collect())
    }

    // =========================================================================
    // HOLDS
    // =========================================================================

    /// Join the queue for a physical title
    pub async fn create_hold(&self, claims: &UserClaims, book_id: i32) -> AppResult<Hold> {
        let now = Utc::now();

        let mut tx = self.repository.pool.begin().await?;
        let book = self.repository.books.get_in(&mut tx, book_id).await?;
        check_hold_eligibility(claims.role, book.book_type)?;

        let hold = self
            .repository
            .holds
            .insert(
                &mut tx,
                claims.user_id,
                book_id,
                now,
                hold_window_end(now, self.config.hold_window_hours),
            )
            .await?;
        tx.commit().await?;

        tracing::info!(hold_id = hold.id, user_id = claims.user_id, book_id, "Hold placed");
        Ok(hold)
    }

    /// Cancel a hold. An earmarked copy goes to the next pending hold, or back
    /// to the shelf when nobody is waiting.
    pub async fn cancel_hold(&self, claims: &UserClaims, hold_id: i32) -> AppResult<Hold> {
        let now = Utc::now();

        let mut tx = self.repository.pool.begin().await?;
        let hold = self.repository.holds.lock(&mut tx, hold_id).await?;
        ensure_visible(claims, hold.user_id, "Hold", hold_id)?;
        hold.check_cancellable()?;

        let cancelled = self.repository.holds.cancel(&mut tx, hold_id).await?;
        let promoted = if hold.holds_earmark() {
            self.release_and_promote(&mut tx, hold.book_id, now).await?
        } else {
            None
        };
        tx.commit().await?;

        tracing::info!(
            hold_id,
            released_earmark = hold.holds_earmark(),
            promoted_hold = ?promoted.map(|h| h.id),
            "Hold cancelled"
        );
        Ok(cancelled)
    }

    /// The caller's holds, after expiring lapsed ones
    pub async fn list_holds(&self, claims: &UserClaims) -> AppResult<Vec<HoldDetails>> {
        self.expire_sweep().await?;
        let now = Utc::now();
        Ok(self
            .repository
            .holds
            .list_for_user(claims.user_id)
            .await?
            .into_iter()
            .map(|row| HoldDetails::derive(row, now))
            .collect())
    }

    pub async fn get_hold(&self, claims: &UserClaims, hold_id: i32) -> AppResult<HoldDetails> {
        let row = self.repository.holds.get_details(hold_id).await?;
        ensure_visible(claims, row.hold.user_id, "Hold", hold_id)?;
        Ok(HoldDetails::derive(row, Utc::now()))
    }

    pub async fn expire_sweep(&self) -> AppResult<SweepReport> {
        self.expire_sweep_at(Utc::now()).await
    }

    /// Expire lapsed holds as of `now`, charge one expiry fee per hold and
    /// re-route any copy they had earmarked. Safe to call repeatedly.
    pub async fn expire_sweep_at(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let fee = self.config.hold_expiry_fee;
        let mut report = SweepReport::default();

        let mut tx = self.repository.pool.begin().await?;
        let expired = self.repository.holds.expire_lapsed(&mut tx, now, fee).await?;

        for lapsed in &expired {
            report.holds_expired += 1;

            let fine = self
                .repository
                .fines
                .insert_hold_expiry(
                    &mut tx,
                    lapsed.hold.user_id,
                    lapsed.hold.id,
                    fee,
                    &hold_expiry_description(&lapsed.book_title),
                    now,
                )
                .await?;
            if fine.is_some() {
                report.hold_fines_created += 1;
            }

            if lapsed.had_earmark() {
                match self.release_and_promote(&mut tx, lapsed.hold.book_id, now).await? {
                    Some(_) => report.holds_promoted += 1,
                    None => report.copies_released += 1,
                }
            }
        }
        tx.commit().await?;

        if report.holds_expired > 0 {
            tracing::info!(
                expired = report.holds_expired,
                fines = report.hold_fines_created,
                promoted = report.holds_promoted,
                released = report.copies_released,
                "Hold expiry sweep"
            );
        }
        Ok(report)
    }

    // =========================================================================
    // FINES
    // =========================================================================

    pub async fn materialize_overdue_fines(&self) -> AppResult<usize> {
        self.materialize_overdue_fines_at(Utc::now()).await
    }

    /// Create the pending overdue fine for every late loan that lacks one and
    /// flag the loan `overdue`. Concurrent calls create each fine once.
    pub async fn materialize_overdue_fines_at(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let policy = self.policies.get_active_policy().await?;
        let today: NaiveDate = now.date_naive();
        let mut created = 0;

        let mut tx = self.repository.pool.begin().await?;
        let candidates = self
            .repository
            .loans
            .overdue_candidates(&mut tx, today)
            .await?;

        for row in &candidates {
            let days = row.loan.days_overdue(today);
            let amount = policy.fine_amount(days);
            if amount <= Decimal::ZERO {
                continue;
            }

            let fine = self
                .repository
                .fines
                .insert_overdue(
                    &mut tx,
                    row.loan.user_id,
                    row.loan.id,
                    amount,
                    &overdue_description(&row.book_title, days),
                    now,
                )
                .await?;

            if fine.is_some() {
                self.repository.loans.mark_overdue(&mut tx, row.loan.id).await?;
                created += 1;
            }
        }
        tx.commit().await?;

        if created > 0 {
            tracing::info!(created, "Overdue fines materialized");
        }
        Ok(created)
    }

    /// Run both lazy sweeps now
    pub async fn sweep(&self) -> AppResult<SweepReport> {
        self.sweep_at(Utc::now()).await
    }

    pub async fn sweep_at(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let mut report = self.expire_sweep_at(now).await?;
        report.overdue_fines_created = self.materialize_overdue_fines_at(now).await?;
        Ok(report)
    }

    /// The caller's fines with totals, after both sweeps
    pub async fn list_fines(&self, claims: &UserClaims) -> AppResult<FineList> {
        self.sweep().await?;
        let fines = self.repository.fines.list_for_user(claims.user_id).await?;
        let summary = self.repository.fines.summary_for_user(claims.user_id).await?;
        Ok(FineList { fines, summary })
    }

    pub async fn get_fine(&self, claims: &UserClaims, fine_id: i32) -> AppResult<FineDetails> {
        let fine = self.repository.fines.get_details(fine_id).await?;
        ensure_visible(claims, fine.fine.user_id, "Fine", fine_id)?;
        Ok(fine)
    }

    /// Settle a pending fine. Paying twice is rejected and changes nothing.
    pub async fn pay_fine(&self, claims: &UserClaims, fine_id: i32) -> AppResult<Fine> {
        let mut tx = self.repository.pool.begin().await?;
        let fine = self.repository.fines.lock(&mut tx, fine_id).await?;
        ensure_visible(claims, fine.user_id, "Fine", fine_id)?;
        fine.check_settleable()?;

        let paid = self.repository.fines.mark_paid(&mut tx, fine_id, Utc::now()).await?;
        tx.commit().await?;

        tracing::info!(fine_id, user_id = paid.user_id, amount = %paid.amount, "Fine paid");
        Ok(paid)
    }

    /// Forgive a pending fine (staff)
    pub async fn waive_fine(&self, staff_id: i32, fine_id: i32) -> AppResult<Fine> {
        let mut tx = self.repository.pool.begin().await?;
        let fine = self.repository.fines.lock(&mut tx, fine_id).await?;
        fine.check_settleable()?;

        let waived = self.repository.fines.mark_waived(&mut tx, fine_id).await?;
        tx.commit().await?;

        tracing::info!(fine_id, staff_id, amount = %waived.amount, "Fine waived");
        Ok(waived)
    }

    /// Charge a damage or lost-item fine against a loan (staff)
    pub async fn assess_fine(&self, staff_id: i32, request: &AssessFineRequest) -> AppResult<Fine> {
        request.check()?;
        let loan = self.repository.loans.get_by_id(request.loan_id).await?;

        let mut tx = self.repository.pool.begin().await?;
        let fine = self
            .repository
            .fines
            .insert_assessed(
                &mut tx,
                loan.user_id,
                loan.id,
                request.fine_type,
                request.amount,
                &request.description,
                Utc::now(),
            )
            .await?;
        tx.commit().await?;

        tracing::info!(
            fine_id = fine.id,
            loan_id = loan.id,
            staff_id,
            fine_type = %fine.fine_type,
            amount = %fine.amount,
            "Fine assessed"
        );
        Ok(fine)
    }
}

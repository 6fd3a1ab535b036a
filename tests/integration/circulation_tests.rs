//! Circulation engine integration tests
//!
//! These run against a real PostgreSQL database:
//! DATABASE_URL=postgres://... cargo test --test circulation -- --ignored

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::{Mutex, MutexGuard};

use circulation_server::{
    config::CirculationConfig,
    error::{AppError, CirculationError},
    models::{
        fine::FineStatus,
        hold::HoldStatus,
        loan::{AssignLoanRequest, LoanStatus, ReturnCondition, ReturnLoanRequest},
        policy::UpdatePolicyRequest,
        user::{Role, UserClaims},
    },
    repository::Repository,
    services::Services,
};

static SEQ: AtomicU32 = AtomicU32::new(0);

// Sweeps are global, so one test's time-shifted sweep would touch another's rows
static SERIAL: Mutex<()> = Mutex::const_new(());

async fn setup() -> (Services, PgPool, MutexGuard<'static, ()>) {
    let serial = SERIAL.lock().await;
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let services = Services::new(Repository::new(pool.clone()), CirculationConfig::default());
    (services, pool, serial)
}

fn unique(prefix: &str) -> String {
    format!(
        "{}-{}-{}",
        prefix,
        Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        SEQ.fetch_add(1, Ordering::SeqCst)
    )
}

async fn create_user(pool: &PgPool, role: Role) -> UserClaims {
    let email = format!("{}@example.edu", unique("user"));
    let user_id: i32 = sqlx::query_scalar(
        "INSERT INTO users (email, display_name, role) VALUES ($1, $1, $2) RETURNING id",
    )
    .bind(&email)
    .bind(role)
    .fetch_one(pool)
    .await
    .unwrap();

    let now = Utc::now();
    UserClaims {
        sub: user_id.to_string(),
        user_id,
        role,
        exp: (now + Duration::hours(1)).timestamp(),
        iat: now.timestamp(),
    }
}

async fn create_book(pool: &PgPool, book_type: &str, copies: i32) -> i32 {
    sqlx::query_scalar(
        r#"
        INSERT INTO books (title, author, book_type, total_copies, available_copies)
        VALUES ($1, 'Test Author', $2, $3, $3)
        RETURNING id
        "#,
    )
    .bind(unique("Book"))
    .bind(book_type)
    .bind(copies)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn available_copies(pool: &PgPool, book_id: i32) -> i32 {
    let inventory = Repository::new(pool.clone())
        .books
        .inventory(book_id)
        .await
        .unwrap();
    assert!(inventory.is_consistent(), "{:?}", inventory);
    inventory.available_copies
}

async fn set_due_date_days_ago(pool: &PgPool, loan_id: i32, days: i64) {
    sqlx::query("UPDATE loans SET due_date = $2 WHERE id = $1")
        .bind(loan_id)
        .bind(Utc::now().date_naive() - Duration::days(days))
        .execute(pool)
        .await
        .unwrap();
}

fn assign(user: &UserClaims, book_id: i32) -> AssignLoanRequest {
    AssignLoanRequest {
        user_id: user.user_id,
        book_id,
        loan_period_days: None,
    }
}

fn circulation_error(result: Result<impl std::fmt::Debug, AppError>) -> CirculationError {
    match result {
        Err(AppError::Circulation(e)) => e,
        other => panic!("expected a circulation error, got {:?}", other),
    }
}

#[tokio::test]
#[ignore]
async fn test_borrow_then_return_restores_availability() {
    let (services, pool, _serial) = setup().await;
    let patron = create_user(&pool, Role::User).await;
    let book_id = create_book(&pool, "electronic", 2).await;

    let loan = services.circulation.borrow(&patron, book_id).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Active);
    assert_eq!(available_copies(&pool, book_id).await, 1);

    let outcome = services
        .circulation
        .return_loan(&patron, loan.id, &ReturnLoanRequest::default())
        .await
        .unwrap();
    assert_eq!(outcome.loan.status, LoanStatus::Returned);
    assert!(outcome.fine.is_none());
    assert!(outcome.promoted_hold.is_none());
    assert_eq!(available_copies(&pool, book_id).await, 2);
}

#[tokio::test]
#[ignore]
async fn test_due_date_follows_active_policy() {
    let (services, pool, _serial) = setup().await;
    let patron = create_user(&pool, Role::User).await;
    let book_id = create_book(&pool, "electronic", 1).await;
    let policy = services.policy.get_active_policy().await.unwrap();

    let loan = services.circulation.borrow(&patron, book_id).await.unwrap();
    assert_eq!(
        loan.due_date,
        loan.loan_date.date_naive() + Duration::days(i64::from(policy.loan_period_days))
    );
}

#[tokio::test]
#[ignore]
async fn test_direct_borrow_of_physical_book_rejected() {
    let (services, pool, _serial) = setup().await;
    let patron = create_user(&pool, Role::User).await;
    let book_id = create_book(&pool, "physical", 1).await;

    let err = circulation_error(services.circulation.borrow(&patron, book_id).await);
    assert!(matches!(err, CirculationError::NotEligible(_)));
    assert_eq!(available_copies(&pool, book_id).await, 1);
}

#[tokio::test]
#[ignore]
async fn test_second_open_loan_for_same_book_rejected() {
    let (services, pool, _serial) = setup().await;
    let patron = create_user(&pool, Role::User).await;
    let book_id = create_book(&pool, "electronic", 3).await;

    services.circulation.borrow(&patron, book_id).await.unwrap();
    let err = circulation_error(services.circulation.borrow(&patron, book_id).await);
    assert_eq!(err, CirculationError::AlreadyBorrowed);
    assert_eq!(available_copies(&pool, book_id).await, 2);
}

#[tokio::test]
#[ignore]
async fn test_missing_book_is_not_found() {
    let (services, pool, _serial) = setup().await;
    let patron = create_user(&pool, Role::User).await;

    let result = services.circulation.borrow(&patron, i32::MAX).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
#[ignore]
async fn test_concurrent_borrows_of_last_copy() {
    let (services, pool, _serial) = setup().await;
    let first = create_user(&pool, Role::User).await;
    let second = create_user(&pool, Role::User).await;
    let book_id = create_book(&pool, "electronic", 1).await;

    let (a, b) = tokio::join!(
        services.circulation.borrow(&first, book_id),
        services.circulation.borrow(&second, book_id),
    );

    let succeeded = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(succeeded, 1);
    let failure = if a.is_err() { a } else { b };
    assert_eq!(circulation_error(failure), CirculationError::OutOfStock);
    assert_eq!(available_copies(&pool, book_id).await, 0);
}

#[tokio::test]
#[ignore]
async fn test_return_promotes_head_of_queue() {
    let (services, pool, _serial) = setup().await;
    let staff = create_user(&pool, Role::Staff).await;
    let patron_a = create_user(&pool, Role::User).await;
    let patron_b = create_user(&pool, Role::User).await;
    let book_id = create_book(&pool, "physical", 1).await;

    let loan = services
        .circulation
        .assign(staff.user_id, &assign(&patron_a, book_id))
        .await
        .unwrap();
    assert_eq!(loan.assigned_by_staff_id, Some(staff.user_id));
    assert_eq!(available_copies(&pool, book_id).await, 0);

    let hold = services.circulation.create_hold(&patron_b, book_id).await.unwrap();
    assert_eq!(hold.status, HoldStatus::Pending);

    let before_return = Utc::now();
    let outcome = services
        .circulation
        .return_loan(
            &staff,
            loan.id,
            &ReturnLoanRequest {
                return_condition: Some(ReturnCondition::Good),
                return_notes: Some("Corner bent".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.loan.returned_by_staff_id, Some(staff.user_id));
    assert_eq!(outcome.loan.return_condition, Some(ReturnCondition::Good));
    let promoted = outcome.promoted_hold.expect("hold should be promoted");
    assert_eq!(promoted.id, hold.id);
    assert_eq!(promoted.status, HoldStatus::Available);
    assert!(promoted.expiry_datetime >= before_return + Duration::hours(48) - Duration::seconds(1));
    assert!(promoted.expiry_datetime <= Utc::now() + Duration::hours(48));
    // The freed copy is earmarked, not back on the shelf
    assert_eq!(available_copies(&pool, book_id).await, 0);

    // Checking out to the promoted patron consumes the earmark
    services
        .circulation
        .assign(staff.user_id, &assign(&patron_b, book_id))
        .await
        .unwrap();
    assert_eq!(available_copies(&pool, book_id).await, 0);
    let hold = services.circulation.get_hold(&patron_b, hold.id).await.unwrap();
    assert_eq!(hold.hold.status, HoldStatus::Cancelled);
}

#[tokio::test]
#[ignore]
async fn test_return_promotes_hold_past_its_creation_window() {
    let (services, pool, _serial) = setup().await;
    let staff = create_user(&pool, Role::Staff).await;
    let patron_a = create_user(&pool, Role::User).await;
    let patron_b = create_user(&pool, Role::User).await;
    let book_id = create_book(&pool, "physical", 1).await;

    let loan = services
        .circulation
        .assign(staff.user_id, &assign(&patron_a, book_id))
        .await
        .unwrap();
    let hold = services.circulation.create_hold(&patron_b, book_id).await.unwrap();

    // Queued for days while the loan was out; no sweep has run since
    sqlx::query("UPDATE holds SET hold_date = $2, expiry_datetime = $3 WHERE id = $1")
        .bind(hold.id)
        .bind(Utc::now() - Duration::days(3))
        .bind(Utc::now() - Duration::days(1))
        .execute(&pool)
        .await
        .unwrap();

    let before_return = Utc::now();
    let outcome = services
        .circulation
        .return_loan(&staff, loan.id, &ReturnLoanRequest::default())
        .await
        .unwrap();

    let promoted = outcome.promoted_hold.expect("stored pending hold should be promoted");
    assert_eq!(promoted.id, hold.id);
    assert_eq!(promoted.status, HoldStatus::Available);
    assert!(!promoted.fee_applied);
    assert!(promoted.expiry_datetime >= before_return + Duration::hours(48) - Duration::seconds(1));
    assert_eq!(available_copies(&pool, book_id).await, 0);

    // The fresh window keeps the promoted hold out of the next sweep
    services.circulation.expire_sweep().await.unwrap();
    let details = services.circulation.get_hold(&patron_b, hold.id).await.unwrap();
    assert_eq!(details.hold.status, HoldStatus::Available);
    assert_eq!(details.effective_status, HoldStatus::Available);
}

#[tokio::test]
#[ignore]
async fn test_cancelling_earmarked_hold_releases_copy() {
    let (services, pool, _serial) = setup().await;
    let staff = create_user(&pool, Role::Staff).await;
    let borrower = create_user(&pool, Role::User).await;
    let waiting = create_user(&pool, Role::User).await;
    let book_id = create_book(&pool, "physical", 1).await;

    let loan = services
        .circulation
        .assign(staff.user_id, &assign(&borrower, book_id))
        .await
        .unwrap();
    let hold = services.circulation.create_hold(&waiting, book_id).await.unwrap();
    services
        .circulation
        .return_loan(&staff, loan.id, &ReturnLoanRequest::default())
        .await
        .unwrap();
    assert_eq!(available_copies(&pool, book_id).await, 0);

    let cancelled = services.circulation.cancel_hold(&waiting, hold.id).await.unwrap();
    assert_eq!(cancelled.status, HoldStatus::Cancelled);
    assert_eq!(available_copies(&pool, book_id).await, 1);

    let err = circulation_error(services.circulation.cancel_hold(&waiting, hold.id).await);
    assert_eq!(err, CirculationError::AlreadyCancelled);
}

#[tokio::test]
#[ignore]
async fn test_cancelling_earmarked_hold_passes_copy_down_the_queue() {
    let (services, pool, _serial) = setup().await;
    let staff = create_user(&pool, Role::Staff).await;
    let borrower = create_user(&pool, Role::User).await;
    let first = create_user(&pool, Role::User).await;
    let second = create_user(&pool, Role::User).await;
    let book_id = create_book(&pool, "physical", 1).await;

    let loan = services
        .circulation
        .assign(staff.user_id, &assign(&borrower, book_id))
        .await
        .unwrap();
    let first_hold = services.circulation.create_hold(&first, book_id).await.unwrap();
    let second_hold = services.circulation.create_hold(&second, book_id).await.unwrap();
    services
        .circulation
        .return_loan(&staff, loan.id, &ReturnLoanRequest::default())
        .await
        .unwrap();

    services.circulation.cancel_hold(&first, first_hold.id).await.unwrap();

    let next = services.circulation.get_hold(&second, second_hold.id).await.unwrap();
    assert_eq!(next.hold.status, HoldStatus::Available);
    assert_eq!(available_copies(&pool, book_id).await, 0);
}

#[tokio::test]
#[ignore]
async fn test_hold_eligibility() {
    let (services, pool, _serial) = setup().await;
    let patron = create_user(&pool, Role::User).await;
    let staff = create_user(&pool, Role::Staff).await;
    let physical = create_book(&pool, "physical", 1).await;
    let electronic = create_book(&pool, "electronic", 1).await;

    let err = circulation_error(services.circulation.create_hold(&staff, physical).await);
    assert!(matches!(err, CirculationError::NotEligible(_)));

    let err = circulation_error(services.circulation.create_hold(&patron, electronic).await);
    assert!(matches!(err, CirculationError::NotEligible(_)));

    services.circulation.create_hold(&patron, physical).await.unwrap();
    let err = circulation_error(services.circulation.create_hold(&patron, physical).await);
    assert_eq!(err, CirculationError::HoldExists);
}

#[tokio::test]
#[ignore]
async fn test_expire_sweep_charges_once() {
    let (services, pool, _serial) = setup().await;
    let patron = create_user(&pool, Role::User).await;
    let book_id = create_book(&pool, "physical", 1).await;
    let hold = services.circulation.create_hold(&patron, book_id).await.unwrap();

    let later = Utc::now() + Duration::hours(49);
    let report = services.circulation.expire_sweep_at(later).await.unwrap();
    assert!(report.holds_expired >= 1);

    let expired = services.circulation.get_hold(&patron, hold.id).await.unwrap();
    assert_eq!(expired.hold.status, HoldStatus::Expired);
    assert!(expired.hold.fee_applied);
    assert_eq!(expired.hold.fee_amount, CirculationConfig::default().hold_expiry_fee);

    services.circulation.expire_sweep_at(later).await.unwrap();

    let fines: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM fines WHERE hold_id = $1 AND type = 'hold_expiry'",
    )
    .bind(hold.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(fines, 1);
}

#[tokio::test]
#[ignore]
async fn test_expired_earmark_returns_copy_to_shelf() {
    let (services, pool, _serial) = setup().await;
    let staff = create_user(&pool, Role::Staff).await;
    let borrower = create_user(&pool, Role::User).await;
    let waiting = create_user(&pool, Role::User).await;
    let book_id = create_book(&pool, "physical", 1).await;

    let loan = services
        .circulation
        .assign(staff.user_id, &assign(&borrower, book_id))
        .await
        .unwrap();
    services.circulation.create_hold(&waiting, book_id).await.unwrap();
    services
        .circulation
        .return_loan(&staff, loan.id, &ReturnLoanRequest::default())
        .await
        .unwrap();
    assert_eq!(available_copies(&pool, book_id).await, 0);

    services
        .circulation
        .expire_sweep_at(Utc::now() + Duration::hours(49))
        .await
        .unwrap();
    assert_eq!(available_copies(&pool, book_id).await, 1);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_materialization_creates_one_fine() {
    let (services, pool, _serial) = setup().await;
    let staff = create_user(&pool, Role::Staff).await;
    let patron = create_user(&pool, Role::User).await;
    let book_id = create_book(&pool, "physical", 1).await;

    let loan = services
        .circulation
        .assign(staff.user_id, &assign(&patron, book_id))
        .await
        .unwrap();
    set_due_date_days_ago(&pool, loan.id, 40).await;

    let (a, b) = tokio::join!(
        services.circulation.materialize_overdue_fines(),
        services.circulation.materialize_overdue_fines(),
    );
    a.unwrap();
    b.unwrap();

    let pending: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM fines WHERE loan_id = $1 AND type = 'overdue' AND status = 'pending'",
    )
    .bind(loan.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(pending, 1);

    let details = services.circulation.get_loan(&patron, loan.id).await.unwrap();
    assert_eq!(details.loan.status, LoanStatus::Overdue);
    assert_eq!(details.days_overdue, 40);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_returns_race_fine_materialization_without_deadlock() {
    let (services, pool, _serial) = setup().await;
    let staff = create_user(&pool, Role::Staff).await;

    let mut loan_ids = Vec::new();
    for _ in 0..8 {
        let patron = create_user(&pool, Role::User).await;
        let book_id = create_book(&pool, "physical", 1).await;
        let loan = services
            .circulation
            .assign(staff.user_id, &assign(&patron, book_id))
            .await
            .unwrap();
        set_due_date_days_ago(&pool, loan.id, 40).await;
        loan_ids.push(loan.id);
    }

    let mut tasks = Vec::new();
    for &loan_id in &loan_ids {
        let return_services = services.clone();
        let staff = staff.clone();
        tasks.push(tokio::spawn(async move {
            return_services
                .circulation
                .return_loan(&staff, loan_id, &ReturnLoanRequest::default())
                .await
                .map(|_| 0)
        }));
        let services = services.clone();
        tasks.push(tokio::spawn(async move {
            services.circulation.materialize_overdue_fines().await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    for &loan_id in &loan_ids {
        let details = services.circulation.get_loan(&staff, loan_id).await.unwrap();
        assert_eq!(details.loan.status, LoanStatus::Returned);
    }

    // Whichever side charged the loan, it was charged exactly once
    for loan_id in loan_ids {
        let fines: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM fines WHERE loan_id = $1 AND type = 'overdue'",
        )
        .bind(loan_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(fines, 1, "loan {}", loan_id);
    }
}

#[tokio::test]
#[ignore]
async fn test_late_loan_reads_overdue_before_sweep() {
    let (services, pool, _serial) = setup().await;
    let staff = create_user(&pool, Role::Staff).await;
    let patron = create_user(&pool, Role::User).await;
    let book_id = create_book(&pool, "physical", 1).await;

    let loan = services
        .circulation
        .assign(staff.user_id, &assign(&patron, book_id))
        .await
        .unwrap();
    set_due_date_days_ago(&pool, loan.id, 2).await;

    let details = services.circulation.get_loan(&patron, loan.id).await.unwrap();
    assert_eq!(details.loan.status, LoanStatus::Active);
    assert!(details.is_overdue);
    assert_eq!(details.effective_status, LoanStatus::Overdue);
    assert_eq!(details.days_overdue, 2);
}

#[tokio::test]
#[ignore]
async fn test_pay_fine_twice() {
    let (services, pool, _serial) = setup().await;
    let staff = create_user(&pool, Role::Staff).await;
    let patron = create_user(&pool, Role::User).await;
    let book_id = create_book(&pool, "physical", 1).await;

    let loan = services
        .circulation
        .assign(staff.user_id, &assign(&patron, book_id))
        .await
        .unwrap();
    set_due_date_days_ago(&pool, loan.id, 45).await;

    let outcome = services
        .circulation
        .return_loan(&staff, loan.id, &ReturnLoanRequest::default())
        .await
        .unwrap();
    let policy = services.policy.get_active_policy().await.unwrap();
    assert_eq!(outcome.days_overdue, 45);
    let fine = outcome.fine.expect("late return creates a fine");
    assert_eq!(fine.amount, policy.fine_amount(45));
    assert!(fine.amount > Decimal::ZERO);

    let paid = services.circulation.pay_fine(&patron, fine.id).await.unwrap();
    assert_eq!(paid.status, FineStatus::Paid);
    assert!(paid.paid_at.is_some());

    let err = circulation_error(services.circulation.pay_fine(&patron, fine.id).await);
    assert_eq!(err, CirculationError::AlreadySettled("paid".to_string()));

    let fine = services.circulation.get_fine(&patron, fine.id).await.unwrap();
    assert_eq!(fine.fine.status, FineStatus::Paid);
    assert_eq!(fine.fine.paid_at, paid.paid_at);
    assert_eq!(fine.book_id, Some(book_id));
}

#[tokio::test]
#[ignore]
async fn test_renewal_limit_and_overdue_renewal() {
    let (services, pool, _serial) = setup().await;
    let staff = create_user(&pool, Role::Staff).await;
    let patron = create_user(&pool, Role::User).await;
    let book_id = create_book(&pool, "physical", 2).await;
    let policy = services.policy.get_active_policy().await.unwrap();

    let loan = services
        .circulation
        .assign(staff.user_id, &assign(&patron, book_id))
        .await
        .unwrap();

    let mut due = loan.due_date;
    for _ in 0..policy.max_renewals_per_loan {
        let renewed = services.circulation.renew(&patron, loan.id).await.unwrap();
        assert_eq!(renewed.due_date, due + Duration::days(i64::from(policy.loan_period_days)));
        due = renewed.due_date;
    }

    let err = circulation_error(services.circulation.renew(&patron, loan.id).await);
    assert!(matches!(err, CirculationError::RenewalLimitReached { .. }));
    let details = services.circulation.get_loan(&patron, loan.id).await.unwrap();
    assert_eq!(details.loan.renewal_count, policy.max_renewals_per_loan);

    let other = create_user(&pool, Role::User).await;
    let late = services
        .circulation
        .assign(staff.user_id, &assign(&other, book_id))
        .await
        .unwrap();
    set_due_date_days_ago(&pool, late.id, 1).await;
    let err = circulation_error(services.circulation.renew(&other, late.id).await);
    assert_eq!(err, CirculationError::Overdue);
}

#[tokio::test]
#[ignore]
async fn test_patrons_cannot_see_each_others_records() {
    let (services, pool, _serial) = setup().await;
    let owner = create_user(&pool, Role::User).await;
    let stranger = create_user(&pool, Role::User).await;
    let book_id = create_book(&pool, "electronic", 1).await;

    let loan = services.circulation.borrow(&owner, book_id).await.unwrap();
    assert!(matches!(
        services.circulation.get_loan(&stranger, loan.id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        services
            .circulation
            .return_loan(&stranger, loan.id, &ReturnLoanRequest::default())
            .await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
#[ignore]
async fn test_policy_update_versions_and_audits() {
    let (services, pool, _serial) = setup().await;
    let admin = create_user(&pool, Role::Admin).await;
    let current = services.policy.get_active_policy().await.unwrap();
    let versions_before = services.policy.history().await.unwrap().len();

    // Re-apply the current values so concurrently running tests see no change
    let request = UpdatePolicyRequest {
        loan_period_days: Some(current.loan_period_days),
        ..Default::default()
    };
    let updated = services
        .policy
        .update_policy(admin.user_id, &request)
        .await
        .unwrap();
    assert!(updated.is_active);
    assert_ne!(updated.id, current.id);
    assert_eq!(updated.values(), current.values());

    let history = services.policy.history().await.unwrap();
    assert_eq!(history.iter().filter(|p| p.is_active).count(), 1);
    assert!(history.len() > versions_before);
    assert_eq!(services.policy.get_active_policy().await.unwrap().id, updated.id);

    let audited: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM audit_log WHERE admin_id = $1 AND action_type = 'loan_policy_updated'",
    )
    .bind(admin.user_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(audited, 1);
}

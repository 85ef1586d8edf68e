use chrono::{Duration, NaiveDateTime};
use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument, warn};

use crate::auth::Role;
use crate::coaching::{SubscriptionStatus, consume_session, status_after_consumption};
use crate::error::AppError;
use crate::models::{CoachingSubscription, DbCoachingSubscription};

use super::{get_package, get_user};

#[instrument]
pub async fn get_subscription(
    pool: &Pool<Sqlite>,
    subscription_id: i64,
) -> Result<CoachingSubscription, AppError> {
    info!("Getting subscription");
    let row = sqlx::query_as::<_, DbCoachingSubscription>(
        "SELECT * FROM coaching_subscriptions WHERE id = ?",
    )
    .bind(subscription_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => CoachingSubscription::try_from(row),
        _ => Err(AppError::NotFound(format!(
            "Subscription with id {} not found",
            subscription_id
        ))),
    }
}

/// Records a package purchase. Payment happens elsewhere; only the price is kept.
#[instrument]
pub async fn create_subscription(
    pool: &Pool<Sqlite>,
    student_id: i64,
    coach_id: i64,
    package_id: i64,
    now: NaiveDateTime,
) -> Result<CoachingSubscription, AppError> {
    info!("Creating subscription");

    let package = get_package(pool, package_id).await?;
    if !package.is_active {
        return Err(AppError::Validation(format!(
            "Package '{}' is no longer offered",
            package.name
        )));
    }

    let coach = get_user(pool, coach_id).await?;
    if coach.role != Role::Coach || coach.archived {
        return Err(AppError::Validation(format!(
            "User {} is not an active coach",
            coach_id
        )));
    }

    let end_date = now + Duration::days(package.duration_days);

    let res = sqlx::query(
        "INSERT INTO coaching_subscriptions
         (student_id, coach_id, package_id, start_date, end_date,
          total_sessions, remaining_sessions, status, purchase_price)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(student_id)
    .bind(coach_id)
    .bind(package_id)
    .bind(now)
    .bind(end_date)
    .bind(package.session_count)
    .bind(package.session_count)
    .bind(SubscriptionStatus::Active.as_str())
    .bind(package.price)
    .execute(pool)
    .await?;

    get_subscription(pool, res.last_insert_rowid()).await
}

#[instrument]
pub async fn get_student_subscriptions(
    pool: &Pool<Sqlite>,
    student_id: i64,
) -> Result<Vec<CoachingSubscription>, AppError> {
    info!("Getting student subscriptions");
    let rows = sqlx::query_as::<_, DbCoachingSubscription>(
        "SELECT * FROM coaching_subscriptions WHERE student_id = ? ORDER BY start_date DESC",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(CoachingSubscription::try_from).collect()
}

/// Subscriptions a coach delivers sessions for, limited to ones still worth showing.
#[instrument]
pub async fn get_coach_subscriptions(
    pool: &Pool<Sqlite>,
    coach_id: i64,
) -> Result<Vec<CoachingSubscription>, AppError> {
    info!("Getting coach subscriptions");
    let rows = sqlx::query_as::<_, DbCoachingSubscription>(
        "SELECT * FROM coaching_subscriptions
         WHERE coach_id = ? AND status IN ('active', 'expired')
         ORDER BY start_date DESC",
    )
    .bind(coach_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(CoachingSubscription::try_from).collect()
}

#[instrument]
pub async fn cancel_subscription(
    pool: &Pool<Sqlite>,
    subscription_id: i64,
) -> Result<CoachingSubscription, AppError> {
    info!("Cancelling subscription");
    let current = get_subscription(pool, subscription_id).await?;

    let res = sqlx::query(
        "UPDATE coaching_subscriptions
         SET status = 'cancelled', updated_at = CURRENT_TIMESTAMP
         WHERE id = ? AND status = 'active'",
    )
    .bind(subscription_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::Conflict(format!(
            "Subscription is {} and cannot be cancelled",
            current.status
        )));
    }

    get_subscription(pool, subscription_id).await
}

/// Marks active subscriptions whose end date has passed as expired.
#[instrument(skip(pool))]
pub async fn expire_subscriptions(pool: &Pool<Sqlite>, now: NaiveDateTime) -> Result<u64, AppError> {
    info!("Expiring past-due subscriptions");
    let res = sqlx::query(
        "UPDATE coaching_subscriptions
         SET status = 'expired', updated_at = CURRENT_TIMESTAMP
         WHERE status = 'active' AND end_date < ?",
    )
    .bind(now)
    .execute(pool)
    .await?;

    Ok(res.rows_affected())
}

/// Uses one session of a subscription. Runs on the caller's connection so it
/// can share a transaction with the appointment that completed.
pub(crate) async fn consume_subscription_session(
    conn: &mut SqliteConnection,
    subscription_id: i64,
    now: NaiveDateTime,
) -> Result<CoachingSubscription, AppError> {
    let row = sqlx::query_as::<_, DbCoachingSubscription>(
        "SELECT * FROM coaching_subscriptions WHERE id = ?",
    )
    .bind(subscription_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| {
        AppError::NotFound(format!("Subscription with id {} not found", subscription_id))
    })?;
    let subscription = CoachingSubscription::try_from(row)?;

    let remaining = consume_session(subscription.remaining_sessions);
    let status = status_after_consumption(subscription.status, remaining);

    if remaining == subscription.remaining_sessions {
        warn!(subscription_id, "Subscription has no sessions left to consume");
    }

    let res = sqlx::query(
        "UPDATE coaching_subscriptions
         SET remaining_sessions = ?, status = ?, updated_at = ?
         WHERE id = ? AND remaining_sessions = ?",
    )
    .bind(remaining)
    .bind(status.as_str())
    .bind(now)
    .bind(subscription_id)
    .bind(subscription.remaining_sessions)
    .execute(&mut *conn)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "Subscription was modified concurrently".to_string(),
        ));
    }

    Ok(CoachingSubscription {
        remaining_sessions: remaining,
        status,
        ..subscription
    })
}

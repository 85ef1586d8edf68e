use chrono::{Duration, NaiveDateTime};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::coaching::{AppointmentSlot, AppointmentStatus, BookedInterval, SlotWindow, generate_slots};
use crate::error::AppError;
use crate::models::{CoachAvailability, DbCoachAvailability, NewAvailability};

#[instrument]
pub async fn get_coach_availability(
    pool: &Pool<Sqlite>,
    coach_id: i64,
) -> Result<Vec<CoachAvailability>, AppError> {
    info!("Getting coach availability");
    let rows = sqlx::query_as::<_, DbCoachAvailability>(
        "SELECT id, coach_id, day_of_week, start_time, end_time, is_available
         FROM coach_availability
         WHERE coach_id = ?
         ORDER BY day_of_week, start_time",
    )
    .bind(coach_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(CoachAvailability::from).collect())
}

/// Replaces every availability row of a coach in one transaction.
#[instrument(skip(rows), fields(row_count = rows.len()))]
pub async fn replace_coach_availability(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    rows: &[NewAvailability],
) -> Result<Vec<CoachAvailability>, AppError> {
    info!("Replacing coach availability");
    for row in rows {
        row.validate()?;
    }

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM coach_availability WHERE coach_id = ?")
        .bind(coach_id)
        .execute(&mut *tx)
        .await?;

    for row in rows {
        sqlx::query(
            "INSERT INTO coach_availability (coach_id, day_of_week, start_time, end_time, is_available)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(coach_id)
        .bind(row.day_of_week as i64)
        .bind(row.start_time)
        .bind(row.end_time)
        .bind(row.is_available)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    get_coach_availability(pool, coach_id).await
}

#[instrument]
pub async fn add_availability_slot(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    row: &NewAvailability,
) -> Result<i64, AppError> {
    info!("Adding availability slot");
    row.validate()?;

    let res = sqlx::query(
        "INSERT INTO coach_availability (coach_id, day_of_week, start_time, end_time, is_available)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(coach_id)
    .bind(row.day_of_week as i64)
    .bind(row.start_time)
    .bind(row.end_time)
    .bind(row.is_available)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn remove_availability_slot(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    availability_id: i64,
) -> Result<(), AppError> {
    info!("Removing availability slot");
    let res = sqlx::query("DELETE FROM coach_availability WHERE id = ? AND coach_id = ?")
        .bind(availability_id)
        .bind(coach_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Availability slot with id {} not found",
            availability_id
        )));
    }

    Ok(())
}

/// Appointments of a coach that can touch any tick inside `window`.
#[instrument(skip(pool))]
pub async fn get_booked_intervals(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    window: &SlotWindow,
) -> Result<Vec<BookedInterval>, AppError> {
    let (from, to) = window.bounds();
    // Appointments are capped well below a day, so one day of lookback is enough.
    let lookback = from
        .checked_sub_signed(Duration::days(1))
        .unwrap_or(NaiveDateTime::MIN);

    let rows: Vec<(NaiveDateTime, i64, String)> = sqlx::query_as(
        "SELECT appointment_date, duration_minutes, status
         FROM coaching_appointments
         WHERE coach_id = ? AND appointment_date >= ? AND appointment_date < ?
           AND status NOT IN ('cancelled', 'rejected')",
    )
    .bind(coach_id)
    .bind(lookback)
    .bind(to)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(start, duration_minutes, status)| {
            let status = AppointmentStatus::parse(&status).ok_or_else(|| {
                AppError::Internal(format!("Unknown appointment status '{}'", status))
            })?;
            Ok(BookedInterval {
                start,
                duration_minutes,
                status,
            })
        })
        .collect()
}

/// Bookable slots of a coach over `window`, each flagged with whether it is still free.
#[instrument(skip(pool))]
pub async fn get_coach_slots(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    window: &SlotWindow,
) -> Result<Vec<AppointmentSlot>, AppError> {
    info!("Generating coach slots");
    let availability = get_coach_availability(pool, coach_id).await?;
    if availability.is_empty() {
        return Ok(Vec::new());
    }

    let booked = get_booked_intervals(pool, coach_id, window).await?;
    Ok(generate_slots(&availability, &booked, window))
}

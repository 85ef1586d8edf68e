use chrono::NaiveDateTime;
use sqlx::{Executor, Pool, QueryBuilder, Sqlite};
use tracing::{info, instrument, warn};

use crate::coaching::{
    AppointmentAction, AppointmentStatus, InvalidTransition, SlotWindow, ensure_open, transition,
};
use crate::error::AppError;
use crate::models::{CoachingAppointment, CoachingSubscription, DbCoachingAppointment};

use super::{consume_subscription_session, get_coach_slots, get_subscription};

pub const MIN_DURATION_MINUTES: i64 = 15;
pub const MAX_DURATION_MINUTES: i64 = 240;

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub statuses: Vec<AppointmentStatus>,
}

/// A booking against a subscription, before it is stored.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub subscription_id: i64,
    pub appointment_date: NaiveDateTime,
    pub duration_minutes: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub google_meet_link: Option<String>,
}

/// Optional fields written alongside a status change.
#[derive(Debug, Clone, Default)]
pub struct TransitionDetails {
    pub google_meet_link: Option<String>,
    pub coach_notes: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentChanges {
    pub appointment_date: Option<NaiveDateTime>,
    pub duration_minutes: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub google_meet_link: Option<String>,
}

impl AppointmentChanges {
    pub fn is_empty(&self) -> bool {
        self.appointment_date.is_none()
            && self.duration_minutes.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.google_meet_link.is_none()
    }
}

fn validate_duration(duration_minutes: i64) -> Result<(), AppError> {
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration_minutes) {
        return Err(AppError::Validation(format!(
            "duration_minutes must be between {} and {}",
            MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
        )));
    }
    Ok(())
}

async fn fetch_appointment<'e, E>(executor: E, appointment_id: i64) -> Result<CoachingAppointment, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, DbCoachingAppointment>(
        "SELECT * FROM coaching_appointments WHERE id = ?",
    )
    .bind(appointment_id)
    .fetch_optional(executor)
    .await?;

    match row {
        Some(row) => CoachingAppointment::try_from(row),
        _ => Err(AppError::NotFound(format!(
            "Appointment with id {} not found",
            appointment_id
        ))),
    }
}

#[instrument]
pub async fn get_appointment(
    pool: &Pool<Sqlite>,
    appointment_id: i64,
) -> Result<CoachingAppointment, AppError> {
    info!("Getting appointment");
    fetch_appointment(pool, appointment_id).await
}

async fn list_appointments(
    pool: &Pool<Sqlite>,
    owner_column: &'static str,
    owner_id: i64,
    filter: &AppointmentFilter,
) -> Result<Vec<CoachingAppointment>, AppError> {
    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT * FROM coaching_appointments WHERE ");
    builder.push(owner_column).push(" = ").push_bind(owner_id);

    if let Some(start) = filter.start {
        builder.push(" AND appointment_date >= ").push_bind(start);
    }
    if let Some(end) = filter.end {
        builder.push(" AND appointment_date <= ").push_bind(end);
    }
    if !filter.statuses.is_empty() {
        builder.push(" AND status IN (");
        let mut separated = builder.separated(", ");
        for status in &filter.statuses {
            separated.push_bind(status.as_str());
        }
        separated.push_unseparated(")");
    }
    builder.push(" ORDER BY appointment_date ASC, id ASC");

    let rows = builder
        .build_query_as::<DbCoachingAppointment>()
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(CoachingAppointment::try_from).collect()
}

#[instrument]
pub async fn get_coach_appointments(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    filter: &AppointmentFilter,
) -> Result<Vec<CoachingAppointment>, AppError> {
    info!("Getting coach appointments");
    list_appointments(pool, "coach_id", coach_id, filter).await
}

#[instrument]
pub async fn get_student_appointments(
    pool: &Pool<Sqlite>,
    student_id: i64,
    filter: &AppointmentFilter,
) -> Result<Vec<CoachingAppointment>, AppError> {
    info!("Getting student appointments");
    list_appointments(pool, "student_id", student_id, filter).await
}

async fn insert_appointment(
    pool: &Pool<Sqlite>,
    subscription: &CoachingSubscription,
    appointment: &NewAppointment,
    status: AppointmentStatus,
    now: NaiveDateTime,
) -> Result<CoachingAppointment, AppError> {
    let approved_at = (status == AppointmentStatus::Approved).then_some(now);

    let res = sqlx::query(
        "INSERT INTO coaching_appointments
         (subscription_id, coach_id, student_id, appointment_date, duration_minutes,
          status, google_meet_link, title, description, approved_at, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(subscription.id)
    .bind(subscription.coach_id)
    .bind(subscription.student_id)
    .bind(appointment.appointment_date)
    .bind(appointment.duration_minutes)
    .bind(status.as_str())
    .bind(&appointment.google_meet_link)
    .bind(&appointment.title)
    .bind(&appointment.description)
    .bind(approved_at)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(AppError::from_db_write)?;

    fetch_appointment(pool, res.last_insert_rowid()).await
}

fn ensure_bookable(
    subscription: &CoachingSubscription,
    appointment: &NewAppointment,
    now: NaiveDateTime,
) -> Result<(), AppError> {
    validate_duration(appointment.duration_minutes)?;

    if !subscription.is_active(now) {
        return Err(AppError::Validation(
            "Subscription is not active or has no remaining sessions".to_string(),
        ));
    }
    if appointment.appointment_date <= now {
        return Err(AppError::Validation(
            "Appointments must be scheduled in the future".to_string(),
        ));
    }
    if appointment.appointment_date > subscription.end_date {
        return Err(AppError::Validation(
            "Appointment falls after the subscription end date".to_string(),
        ));
    }
    Ok(())
}

/// A student asks for one of the coach's generated slots. The new appointment is `pending`.
#[instrument]
pub async fn request_appointment(
    pool: &Pool<Sqlite>,
    student_id: i64,
    appointment: &NewAppointment,
    now: NaiveDateTime,
) -> Result<CoachingAppointment, AppError> {
    info!("Requesting appointment");
    let subscription = get_subscription(pool, appointment.subscription_id).await?;
    if subscription.student_id != student_id {
        return Err(AppError::Authorization(
            "Subscription belongs to another student".to_string(),
        ));
    }
    ensure_bookable(&subscription, appointment, now)?;

    let date = appointment.appointment_date.date();
    let end_date = date
        .succ_opt()
        .ok_or_else(|| AppError::Validation("Appointment date is out of range".to_string()))?;
    let window = SlotWindow {
        start_date: date,
        end_date,
        slot_minutes: appointment.duration_minutes,
    };

    let slots = get_coach_slots(pool, subscription.coach_id, &window).await?;
    {
        let mut matching = slots
            .iter()
            .filter(|slot| slot.starts_at() == appointment.appointment_date)
            .peekable();

        if matching.peek().is_none() {
            return Err(AppError::Validation(
                "Requested time is not one of the coach's offered slots".to_string(),
            ));
        }
        if !matching.any(|slot| slot.available) {
            return Err(AppError::Conflict(
                "Requested slot is no longer available".to_string(),
            ));
        }
    }

    insert_appointment(pool, &subscription, appointment, AppointmentStatus::Pending, now).await
}

/// A coach books a session for one of their own subscriptions. It starts out `approved`.
#[instrument]
pub async fn create_direct_appointment(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    appointment: &NewAppointment,
    now: NaiveDateTime,
) -> Result<CoachingAppointment, AppError> {
    info!("Creating appointment directly");
    let subscription = get_subscription(pool, appointment.subscription_id).await?;
    if subscription.coach_id != coach_id {
        return Err(AppError::Authorization(
            "Subscription is coached by someone else".to_string(),
        ));
    }
    ensure_bookable(&subscription, appointment, now)?;

    insert_appointment(pool, &subscription, appointment, AppointmentStatus::Approved, now).await
}

/// Applies a lifecycle action. The update only lands if the status is still
/// the one that was read, and completion consumes a session in the same
/// transaction.
#[instrument]
pub async fn apply_transition(
    pool: &Pool<Sqlite>,
    appointment_id: i64,
    action: AppointmentAction,
    details: &TransitionDetails,
    now: NaiveDateTime,
) -> Result<CoachingAppointment, AppError> {
    info!(action = %action, "Applying appointment transition");
    let mut tx = pool.begin().await?;

    let current = fetch_appointment(&mut *tx, appointment_id).await?;
    let next = transition(current.status, action)?;

    let stamp_column = match action {
        AppointmentAction::Approve => Some("approved_at"),
        AppointmentAction::Reject => Some("rejected_at"),
        AppointmentAction::Complete => Some("completed_at"),
        AppointmentAction::Cancel => Some("cancelled_at"),
        AppointmentAction::MarkNoShow => None,
    };

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("UPDATE coaching_appointments SET status = ");
    builder.push_bind(next.as_str());
    builder.push(", updated_at = ").push_bind(now);
    if let Some(column) = stamp_column {
        builder.push(", ").push(column).push(" = ").push_bind(now);
    }
    if let Some(link) = &details.google_meet_link {
        builder.push(", google_meet_link = ").push_bind(link.clone());
    }
    if let Some(notes) = &details.coach_notes {
        builder.push(", coach_notes = ").push_bind(notes.clone());
    }
    if let Some(reason) = &details.reason {
        builder.push(", cancellation_reason = ").push_bind(reason.clone());
    }
    builder
        .push(" WHERE id = ")
        .push_bind(appointment_id)
        .push(" AND status = ")
        .push_bind(current.status.as_str());

    let res = builder.build().execute(&mut *tx).await?;
    if res.rows_affected() == 0 {
        warn!(appointment_id, "Appointment status changed before the update landed");
        tx.rollback().await?;
        return Err(AppError::InvalidTransition(InvalidTransition {
            from: current.status,
            attempted: action.as_str(),
        }));
    }

    if action.consumes_session() {
        consume_subscription_session(&mut *tx, current.subscription_id, now).await?;
    }

    let updated = fetch_appointment(&mut *tx, appointment_id).await?;
    tx.commit().await?;

    Ok(updated)
}

/// Edits an appointment that is still pending or approved. Rescheduling goes
/// through the overlap trigger.
#[instrument]
pub async fn update_appointment(
    pool: &Pool<Sqlite>,
    appointment_id: i64,
    changes: &AppointmentChanges,
    now: NaiveDateTime,
) -> Result<CoachingAppointment, AppError> {
    info!("Updating appointment");
    let current = fetch_appointment(pool, appointment_id).await?;
    ensure_open(current.status, "edit")?;

    if changes.is_empty() {
        return Ok(current);
    }
    if let Some(duration) = changes.duration_minutes {
        validate_duration(duration)?;
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("UPDATE coaching_appointments SET updated_at = ");
    builder.push_bind(now);
    if let Some(date) = changes.appointment_date {
        builder.push(", appointment_date = ").push_bind(date);
    }
    if let Some(duration) = changes.duration_minutes {
        builder.push(", duration_minutes = ").push_bind(duration);
    }
    if let Some(title) = &changes.title {
        builder.push(", title = ").push_bind(title.clone());
    }
    if let Some(description) = &changes.description {
        builder.push(", description = ").push_bind(description.clone());
    }
    if let Some(link) = &changes.google_meet_link {
        builder.push(", google_meet_link = ").push_bind(link.clone());
    }
    builder
        .push(" WHERE id = ")
        .push_bind(appointment_id)
        .push(" AND status = ")
        .push_bind(current.status.as_str());

    let res = builder
        .build()
        .execute(pool)
        .await
        .map_err(AppError::from_db_write)?;

    if res.rows_affected() == 0 {
        return Err(AppError::InvalidTransition(InvalidTransition {
            from: current.status,
            attempted: "edit",
        }));
    }

    fetch_appointment(pool, appointment_id).await
}

#[instrument]
pub async fn delete_appointment(pool: &Pool<Sqlite>, appointment_id: i64) -> Result<(), AppError> {
    info!("Deleting appointment");
    let current = fetch_appointment(pool, appointment_id).await?;
    ensure_open(current.status, "delete")?;

    let res = sqlx::query(
        "DELETE FROM coaching_appointments WHERE id = ? AND status IN ('pending', 'approved')",
    )
    .bind(appointment_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::InvalidTransition(InvalidTransition {
            from: current.status,
            attempted: "delete",
        }));
    }

    Ok(())
}

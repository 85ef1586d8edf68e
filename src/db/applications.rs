use chrono::NaiveDateTime;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{ApplicationStatus, CoachApplication, DbCoachApplication, encode_string_list};

#[derive(Debug, Clone)]
pub struct NewCoachApplication {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub experience_years: i64,
    pub bio: String,
    pub specializations: Vec<String>,
    pub hourly_rate: Option<f64>,
    pub terms_accepted: bool,
}

#[instrument]
pub async fn get_coach_application(
    pool: &Pool<Sqlite>,
    application_id: i64,
) -> Result<CoachApplication, AppError> {
    info!("Getting coach application");
    let row = sqlx::query_as::<_, DbCoachApplication>("SELECT * FROM coach_applications WHERE id = ?")
        .bind(application_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => CoachApplication::try_from(row),
        _ => Err(AppError::NotFound(format!(
            "Coach application with id {} not found",
            application_id
        ))),
    }
}

#[instrument]
pub async fn submit_coach_application(
    pool: &Pool<Sqlite>,
    user_id: i64,
    application: &NewCoachApplication,
) -> Result<CoachApplication, AppError> {
    info!("Submitting coach application");
    if !application.terms_accepted {
        return Err(AppError::Validation(
            "Terms must be accepted to apply".to_string(),
        ));
    }

    let pending: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM coach_applications WHERE user_id = ? AND status = 'pending'",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    if pending > 0 {
        return Err(AppError::Conflict(
            "An application is already awaiting review".to_string(),
        ));
    }

    let res = sqlx::query(
        "INSERT INTO coach_applications
         (user_id, full_name, email, phone, experience_years, bio, specializations, hourly_rate, terms_accepted)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(&application.full_name)
    .bind(&application.email)
    .bind(&application.phone)
    .bind(application.experience_years)
    .bind(&application.bio)
    .bind(encode_string_list(&application.specializations))
    .bind(application.hourly_rate)
    .bind(application.terms_accepted)
    .execute(pool)
    .await?;

    get_coach_application(pool, res.last_insert_rowid()).await
}

#[instrument]
pub async fn get_coach_applications(
    pool: &Pool<Sqlite>,
    status: Option<ApplicationStatus>,
) -> Result<Vec<CoachApplication>, AppError> {
    info!("Listing coach applications");
    let rows = match status {
        Some(status) => {
            sqlx::query_as::<_, DbCoachApplication>(
                "SELECT * FROM coach_applications WHERE status = ? ORDER BY created_at ASC, id ASC",
            )
            .bind(status.as_str())
            .fetch_all(pool)
            .await?
        }
        _ => {
            sqlx::query_as::<_, DbCoachApplication>(
                "SELECT * FROM coach_applications ORDER BY created_at ASC, id ASC",
            )
            .fetch_all(pool)
            .await?
        }
    };

    rows.into_iter().map(CoachApplication::try_from).collect()
}

/// Settles a pending application. Approval promotes the applicant to coach and
/// copies the application details onto their profile in the same transaction.
#[instrument]
pub async fn review_coach_application(
    pool: &Pool<Sqlite>,
    application_id: i64,
    decision: ApplicationStatus,
    reviewer_notes: Option<&str>,
    now: NaiveDateTime,
) -> Result<CoachApplication, AppError> {
    info!(decision = decision.as_str(), "Reviewing coach application");
    if decision == ApplicationStatus::Pending {
        return Err(AppError::Validation(
            "A review must approve or reject".to_string(),
        ));
    }

    let application = get_coach_application(pool, application_id).await?;

    let mut tx = pool.begin().await?;

    let res = sqlx::query(
        "UPDATE coach_applications
         SET status = ?, reviewer_notes = ?, reviewed_at = ?
         WHERE id = ? AND status = 'pending'",
    )
    .bind(decision.as_str())
    .bind(reviewer_notes)
    .bind(now)
    .bind(application_id)
    .execute(&mut *tx)
    .await?;

    if res.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(AppError::Conflict(format!(
            "Application has already been {}",
            application.status.as_str()
        )));
    }

    if decision == ApplicationStatus::Approved {
        sqlx::query(
            "UPDATE users
             SET role = 'coach',
                 coach_bio = ?,
                 coach_specializations = ?,
                 coach_hourly_rate = ?
             WHERE id = ? AND role = 'student'",
        )
        .bind(&application.bio)
        .bind(encode_string_list(&application.specializations))
        .bind(application.hourly_rate)
        .bind(application.user_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    get_coach_application(pool, application_id).await
}

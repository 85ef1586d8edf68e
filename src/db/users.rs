use chrono::NaiveDateTime;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::{DbUser, Role, User};
use crate::error::AppError;
use crate::models::{CoachProfile, CoachStats, DbCoachProfile, encode_string_list};

const USER_COLUMNS: &str = "id, username, role, display_name, email, archived";
const COACH_COLUMNS: &str = "id, username, display_name, coach_bio, coach_specializations, coach_hourly_rate, coach_timezone";

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users WHERE id = ?",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => User::try_from(user),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn find_user_by_username(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<Option<User>, AppError> {
    info!("Finding user by username");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users WHERE username = ?",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;

    row.map(User::try_from).transpose()
}

#[instrument(skip_all, fields(username, role))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
    role: &str,
    display_name: Option<&str>,
    email: Option<&str>,
) -> Result<i64, AppError> {
    info!("Creating new user");

    Role::from_str(role).map_err(|e| AppError::Validation(e.to_string()))?;

    if find_user_by_username(pool, username).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "Username '{}' already exists",
            username
        )));
    }

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query(
        "INSERT INTO users (username, password, role, display_name, email) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(username)
    .bind(hashed_password)
    .bind(role)
    .bind(display_name)
    .bind(email)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

/// Returns the user when the password matches, `None` otherwise.
#[instrument(skip_all, fields(username))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");

    let stored: Option<(i64, String)> =
        sqlx::query_as("SELECT id, password FROM users WHERE username = ? AND archived = FALSE")
            .bind(username)
            .fetch_optional(pool)
            .await?;

    match stored {
        Some((id, hash)) => match bcrypt::verify(password, &hash) {
            Ok(true) => Ok(Some(get_user(pool, id).await?)),
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

#[instrument]
pub async fn update_user_profile(
    pool: &Pool<Sqlite>,
    user_id: i64,
    display_name: Option<&str>,
    email: Option<&str>,
) -> Result<(), AppError> {
    info!("Updating user profile");
    sqlx::query(
        "UPDATE users
         SET display_name = COALESCE(?, display_name), email = COALESCE(?, email)
         WHERE id = ?",
    )
    .bind(display_name)
    .bind(email)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}

#[instrument(skip_all, fields(user_id))]
pub async fn update_user_password(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new_password: &str,
) -> Result<(), AppError> {
    info!("Updating user password");
    let hashed_password = bcrypt::hash(new_password, bcrypt::DEFAULT_COST)?;

    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(hashed_password)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn get_coaches(pool: &Pool<Sqlite>) -> Result<Vec<CoachProfile>, AppError> {
    info!("Getting all coaches");
    let rows = sqlx::query_as::<_, DbCoachProfile>(&format!(
        "SELECT {} FROM users
         WHERE role = 'coach' AND archived = FALSE
         ORDER BY COALESCE(display_name, username)",
        COACH_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(CoachProfile::from).collect())
}

#[instrument]
pub async fn get_coach_profile(pool: &Pool<Sqlite>, coach_id: i64) -> Result<CoachProfile, AppError> {
    info!("Getting coach profile");
    let row = sqlx::query_as::<_, DbCoachProfile>(&format!(
        "SELECT {} FROM users WHERE id = ? AND role = 'coach'",
        COACH_COLUMNS
    ))
    .bind(coach_id)
    .fetch_optional(pool)
    .await?;

    row.map(CoachProfile::from)
        .ok_or_else(|| AppError::NotFound(format!("Coach with id {} not found", coach_id)))
}

#[instrument]
pub async fn update_coach_profile(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    bio: Option<&str>,
    specializations: Option<&[String]>,
    hourly_rate: Option<f64>,
    timezone: Option<&str>,
) -> Result<(), AppError> {
    info!("Updating coach profile");
    let specializations = specializations.map(encode_string_list);

    sqlx::query(
        "UPDATE users
         SET coach_bio = COALESCE(?, coach_bio),
             coach_specializations = COALESCE(?, coach_specializations),
             coach_hourly_rate = COALESCE(?, coach_hourly_rate),
             coach_timezone = COALESCE(?, coach_timezone)
         WHERE id = ? AND role = 'coach'",
    )
    .bind(bio)
    .bind(specializations)
    .bind(hourly_rate)
    .bind(timezone)
    .bind(coach_id)
    .execute(pool)
    .await?;

    Ok(())
}

#[instrument]
pub async fn get_coach_stats(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    now: NaiveDateTime,
) -> Result<CoachStats, AppError> {
    info!("Getting coach stats");
    get_coach_profile(pool, coach_id).await?;

    let stats = sqlx::query_as::<_, CoachStats>(
        "SELECT ? AS coach_id,
            (SELECT COUNT(DISTINCT student_id) FROM coaching_subscriptions
             WHERE coach_id = ?) AS total_students,
            (SELECT COUNT(*) FROM coaching_appointments
             WHERE coach_id = ? AND status = 'completed') AS completed_sessions,
            (SELECT COUNT(*) FROM coaching_appointments
             WHERE coach_id = ? AND status IN ('pending', 'approved')
               AND appointment_date >= ?) AS upcoming_sessions",
    )
    .bind(coach_id)
    .bind(coach_id)
    .bind(coach_id)
    .bind(coach_id)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(stats)
}

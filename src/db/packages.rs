use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{CoachingPackage, DbCoachingPackage, encode_string_list};

#[derive(Debug, Clone)]
pub struct NewPackage {
    pub name: String,
    pub description: Option<String>,
    pub session_count: i64,
    pub duration_days: i64,
    pub price: f64,
    pub is_popular: bool,
    pub features: Vec<String>,
}

#[instrument]
pub async fn get_active_packages(pool: &Pool<Sqlite>) -> Result<Vec<CoachingPackage>, AppError> {
    info!("Getting active packages");
    let rows = sqlx::query_as::<_, DbCoachingPackage>(
        "SELECT * FROM coaching_packages WHERE is_active = TRUE ORDER BY price ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(CoachingPackage::from).collect())
}

#[instrument]
pub async fn get_package(pool: &Pool<Sqlite>, package_id: i64) -> Result<CoachingPackage, AppError> {
    info!("Getting package");
    let row = sqlx::query_as::<_, DbCoachingPackage>("SELECT * FROM coaching_packages WHERE id = ?")
        .bind(package_id)
        .fetch_optional(pool)
        .await?;

    row.map(CoachingPackage::from)
        .ok_or_else(|| AppError::NotFound(format!("Package with id {} not found", package_id)))
}

#[instrument]
pub async fn create_package(pool: &Pool<Sqlite>, package: &NewPackage) -> Result<i64, AppError> {
    info!("Creating package");
    let res = sqlx::query(
        "INSERT INTO coaching_packages
         (name, description, session_count, duration_days, price, is_popular, features)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&package.name)
    .bind(&package.description)
    .bind(package.session_count)
    .bind(package.duration_days)
    .bind(package.price)
    .bind(package.is_popular)
    .bind(encode_string_list(&package.features))
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn set_package_active(
    pool: &Pool<Sqlite>,
    package_id: i64,
    is_active: bool,
) -> Result<(), AppError> {
    info!("Toggling package active flag");
    let res = sqlx::query(
        "UPDATE coaching_packages SET is_active = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(is_active)
    .bind(package_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Package with id {} not found",
            package_id
        )));
    }

    Ok(())
}

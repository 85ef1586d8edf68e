use rocket::State;
use rocket::serde::{Deserialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, User};
use crate::db::{NewPackage, create_package, get_active_packages, get_package};
use crate::models::CoachingPackage;
use crate::validation::{AppErrorExt, ApiError, JsonValidateExt, PermissionCheckExt};

#[get("/packages")]
pub async fn api_get_packages(
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<CoachingPackage>>, ApiError> {
    let packages = get_active_packages(db).await.validate_custom()?;
    Ok(Json(packages))
}

#[get("/packages/<id>")]
pub async fn api_get_package(
    id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<CoachingPackage>, ApiError> {
    let package = get_package(db, id).await.validate_custom()?;
    Ok(Json(package))
}

#[derive(Deserialize, Validate)]
pub struct CreatePackageRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    name: String,
    description: Option<String>,
    #[validate(range(min = 1, message = "A package needs at least one session"))]
    session_count: i64,
    #[validate(range(min = 1, message = "Duration must be at least one day"))]
    duration_days: i64,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    price: f64,
    #[serde(default)]
    is_popular: bool,
    #[serde(default)]
    features: Vec<String>,
}

#[post("/admin/packages", data = "<package>")]
pub async fn api_create_package(
    package: Json<CreatePackageRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<CoachingPackage>, ApiError> {
    user.require_permission(Permission::ManagePackages)
        .validate_custom()?;
    let validated = package.validate_custom()?;

    let id = create_package(
        db,
        &NewPackage {
            name: validated.name,
            description: validated.description,
            session_count: validated.session_count,
            duration_days: validated.duration_days,
            price: validated.price,
            is_popular: validated.is_popular,
            features: validated.features,
        },
    )
    .await
    .validate_custom()?;

    let created = get_package(db, id).await.validate_custom()?;
    Ok(Json(created))
}

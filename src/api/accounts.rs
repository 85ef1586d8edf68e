use chrono::Duration;
use rocket::State;
use rocket::http::{CookieJar, Status};
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, SESSION_COOKIE, User, UserSession};
use crate::config::AppConfig;
use crate::db::{
    authenticate_user, create_user, create_user_session, invalidate_session,
    update_user_password, update_user_profile,
};
use crate::edge::{removal_cookie, session_cookie};
use crate::validation::{
    AppErrorExt, ApiError, JsonValidateExt, PermissionCheckExt, ValidationResponse,
};

use super::now;

#[derive(Serialize, Deserialize, Debug)]
pub struct UserData {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub email: Option<String>,
    pub role: String,
}

impl From<User> for UserData {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            role: user.role.to_string(),
            username: user.username,
            display_name: user.display_name,
            email: user.email,
        }
    }
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserData>,
    pub error: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    password: String,
    display_name: Option<String>,
    #[validate(email(message = "Email address is not valid"))]
    email: Option<String>,
}

/// Public registration. New accounts are always students.
#[post("/signup", data = "<signup>")]
pub async fn api_signup(
    signup: Json<SignupRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, ApiError> {
    let validated = signup.validate_custom()?;

    create_user(
        db,
        &validated.username,
        &validated.password,
        "student",
        validated.display_name.as_deref(),
        validated.email.as_deref(),
    )
    .await
    .validate_custom()?;

    Ok(Status::Created)
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<LoginResponse>, ApiError> {
    let validated = login.validate_custom()?;

    match authenticate_user(db, &validated.username, &validated.password)
        .await
        .validate_custom()?
    {
        Some(user) => {
            let token = UserSession::generate_token();
            let expires_at = now() + Duration::days(config.session_ttl_days);

            create_user_session(db, user.id, &token, expires_at)
                .await
                .validate_custom()?;

            cookies.add_private(session_cookie(config, token));

            Ok(Json(LoginResponse {
                success: true,
                user: Some(UserData::from(user)),
                error: None,
            }))
        }
        None => Ok(Json(LoginResponse {
            success: false,
            user: None,
            error: Some("Invalid username or password".to_string()),
        })),
    }
}

#[post("/logout")]
pub async fn api_logout(
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Status {
    let token = cookies
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        if let Err(err) = invalidate_session(db, &token).await {
            err.log_and_record("Invalidating session on logout");
        }
    }

    cookies.remove_private(removal_cookie(config));

    Status::Ok
}

#[get("/me")]
pub async fn api_me(user: User) -> Result<Json<UserData>, ApiError> {
    user.require_permission(Permission::ViewOwnProfile)
        .validate_custom()?;

    Ok(Json(UserData::from(user)))
}

#[get("/me", rank = 2)]
pub async fn api_me_unauthorized() -> Status {
    Status::Unauthorized
}

#[derive(Deserialize, Validate)]
pub struct ProfileUpdateRequest {
    #[validate(length(min = 1, max = 100, message = "Display name must be 1-100 characters"))]
    display_name: Option<String>,
    #[validate(email(message = "Email address is not valid"))]
    email: Option<String>,
}

#[put("/profile", data = "<profile>")]
pub async fn api_update_profile(
    profile: Json<ProfileUpdateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, ApiError> {
    user.require_permission(Permission::EditOwnProfile)
        .validate_custom()?;

    let validated = profile.validate_custom()?;

    update_user_profile(
        db,
        user.id,
        validated.display_name.as_deref(),
        validated.email.as_deref(),
    )
    .await
    .validate_custom()?;

    Ok(Status::Ok)
}

#[derive(Deserialize, Validate)]
pub struct PasswordChangeRequest {
    current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    new_password: String,
}

#[post("/change-password", data = "<password>")]
pub async fn api_change_password(
    password: Json<PasswordChangeRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, ApiError> {
    user.require_permission(Permission::EditOwnProfile)
        .validate_custom()?;

    let validated = password.validate_custom()?;

    let is_valid = authenticate_user(db, &user.username, &validated.current_password)
        .await
        .validate_custom()?;

    match is_valid {
        Some(_) => {
            update_user_password(db, user.id, &validated.new_password)
                .await
                .validate_custom()?;

            Ok(Status::Ok)
        }
        _ => Err(Custom(
            Status::Unauthorized,
            Json(ValidationResponse::with_error(
                "current_password",
                "Current password is incorrect",
            )),
        )),
    }
}

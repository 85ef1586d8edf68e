use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tracing::Instrument;

use crate::db::{get_session_by_token, get_user};

use super::User;

pub const SESSION_COOKIE: &str = "session_token";

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        authenticate(request)
            .instrument(tracing::info_span!("user_auth_guard"))
            .await
    }
}

async fn authenticate(request: &Request<'_>) -> Outcome<User, ()> {
    let cookies = request.cookies();

    let token = cookies
        .get_private(SESSION_COOKIE)
        .map(|c| c.value().to_string());

    if let Some(token) = token {
        let db = match request.rocket().state::<SqlitePool>() {
            Some(pool) => pool,
            _ => {
                tracing::error!("Database pool not found in managed state");
                return Outcome::Error((Status::InternalServerError, ()));
            }
        };

        match get_session_by_token(db, &token).await {
            Ok(session) => {
                if !session.is_valid() {
                    tracing::warn!(session_id = session.id, "Session token expired");
                    return Outcome::Error((Status::Unauthorized, ()));
                }

                match get_user(db, session.user_id).await {
                    Ok(user) if user.archived => {
                        tracing::warn!(username = %user.username, "Archived user attempted to authenticate");
                        return Outcome::Error((Status::Unauthorized, ()));
                    }
                    Ok(user) => {
                        tracing::info!(username = %user.username, role = %user.role.as_str(), "User authenticated via session token");
                        return Outcome::Success(user);
                    }
                    Err(err) => {
                        tracing::error!(user_id = %session.user_id, error = ?err, "Failed to fetch user for valid session");
                        return Outcome::Error((Status::InternalServerError, ()));
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = ?err, "Invalid session token");
                return Outcome::Error((Status::Unauthorized, ()));
            }
        }
    }

    Outcome::Error((Status::Unauthorized, ()))
}

fn json_error(status: Status, error: &str, message: &str) -> Custom<Json<Value>> {
    Custom(
        status,
        Json(json!({
            "error": error,
            "message": message
        })),
    )
}

#[catch(401)]
pub fn unauthorized_api(_req: &Request) -> Custom<Json<Value>> {
    json_error(Status::Unauthorized, "Unauthorized", "Authentication required")
}

#[catch(403)]
pub fn forbidden_api(_req: &Request) -> Custom<Json<Value>> {
    tracing::warn!("Forbidden access attempt");
    json_error(
        Status::Forbidden,
        "Forbidden",
        "You don't have permission to perform this action",
    )
}

#[catch(404)]
pub fn not_found_api(_req: &Request) -> Custom<Json<Value>> {
    json_error(Status::NotFound, "Not Found", "Endpoint not found")
}

#[catch(422)]
pub fn unprocessable_api(_req: &Request) -> Custom<Json<Value>> {
    json_error(
        Status::UnprocessableEntity,
        "Unprocessable Entity",
        "The request body could not be parsed",
    )
}

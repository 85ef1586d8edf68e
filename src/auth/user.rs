use chrono::{NaiveDateTime, Utc};
use rand::{Rng, distr::Alphanumeric};
use rocket::http::Status;
use serde::Serialize;

use super::{Permission, Role};
use crate::error::AppError;

#[derive(Debug, Serialize, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub display_name: String,
    pub email: Option<String>,
    pub archived: bool,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUser {
    pub id: Option<i64>,
    pub username: Option<String>,
    pub role: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub archived: Option<bool>,
}

impl TryFrom<DbUser> for User {
    type Error = AppError;

    fn try_from(user: DbUser) -> Result<Self, Self::Error> {
        let role = Role::from_str(&user.role.unwrap_or_default())
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let username = user.username.unwrap_or_default();

        Ok(Self {
            id: user.id.unwrap_or_default(),
            display_name: user.display_name.unwrap_or_else(|| username.clone()),
            username,
            role,
            email: user.email,
            archived: user.archived.unwrap_or_default(),
        })
    }
}

impl User {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    pub fn require_permission(&self, permission: Permission) -> Result<(), Status> {
        if self.role.has_permission(permission) {
            Ok(())
        } else {
            tracing::warn!(
                username = %self.username,
                role = %self.role.as_str(),
                permission = ?permission,
                "Permission denied"
            );
            Err(Status::Forbidden)
        }
    }

    pub fn require_any_permission(&self, permissions: &[Permission]) -> Result<(), Status> {
        if permissions.iter().any(|p| self.role.has_permission(*p)) {
            Ok(())
        } else {
            tracing::warn!(
                username = %self.username,
                role = %self.role.as_str(),
                permissions = ?permissions,
                "Permission denied (require any)"
            );
            Err(Status::Forbidden)
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserSession {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUserSession {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub token: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub expires_at: Option<NaiveDateTime>,
}

impl From<DbUserSession> for UserSession {
    fn from(session: DbUserSession) -> Self {
        Self {
            id: session.id.unwrap_or_default(),
            user_id: session.user_id.unwrap_or_default(),
            token: session.token.unwrap_or_default(),
            created_at: session.created_at.unwrap_or_default(),
            expires_at: session.expires_at.unwrap_or_default(),
        }
    }
}

impl UserSession {
    pub fn generate_token() -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(64)
            .map(char::from)
            .collect()
    }

    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now().naive_utc()
    }
}

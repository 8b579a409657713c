// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::{error::AppError, utils::jwt::Claims};

/// Role carried by the session. Stored lowercase in `users.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "student" => Some(Role::Student),
            "instructor" => Some(Role::Instructor),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Display name, copied into certificate snapshots.
    pub name: String,

    pub email: String,

    pub role: Role,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for an administrator provisioning a user.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name length must be between 1 and 100 characters."
    ))]
    pub name: String,
    #[validate(email(message = "Email must be a valid address."))]
    pub email: String,
    pub role: Role,
}

/// The identity of the caller, as supplied by the session provider.
///
/// Trusted verbatim; role checks happen against this value only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
    pub role: Role,
}

impl Session {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn from_claims(claims: &Claims) -> Result<Self, AppError> {
        let user_id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::AuthError("Invalid token subject".to_string()))?;
        let role = Role::parse(&claims.role)
            .ok_or_else(|| AppError::AuthError("Invalid token role".to_string()))?;
        Ok(Self { user_id, role })
    }

    /// Instructors and admins may author content and review attempts.
    pub fn require_instructor(&self) -> Result<(), AppError> {
        match self.role {
            Role::Instructor | Role::Admin => Ok(()),
            Role::Student => Err(AppError::Forbidden(
                "Instructor role required".to_string(),
            )),
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin role required".to_string()))
        }
    }
}

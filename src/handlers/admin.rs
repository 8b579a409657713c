// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        certificate::ManualIssueRequest,
        user::{CreateUserRequest, Session, User},
    },
    services::certificates::CertificateService,
    utils::jwt::Claims,
};

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id DESC")
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list users: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(users))
}

/// Provisions a user with a specific role.
/// Admin only.
pub async fn create_user(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, email, role, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(payload.name.trim())
    .bind(payload.email.trim().to_lowercase())
    .bind(payload.role)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if e.as_database_error().is_some_and(|d| d.is_unique_violation()) {
            AppError::Conflict(format!("Email '{}' already exists", payload.email))
        } else {
            tracing::error!("Failed to create user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Issues a certificate without checking course progress.
/// Admin only.
pub async fn issue_manual_certificate(
    State(certificates): State<CertificateService>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ManualIssueRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = Session::from_claims(&claims)?;
    let certificate = certificates
        .issue_manual_certificate(&session, payload.user_id, payload.course_id)
        .await?;

    Ok((StatusCode::CREATED, Json(certificate)))
}

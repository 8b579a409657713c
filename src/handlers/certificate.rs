// src/handlers/certificate.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    error::AppError, models::user::Session, services::certificates::CertificateService,
    utils::jwt::Claims,
};

/// Issues (or returns) the caller's certificate for a completed course.
/// Responds with `null` while the course is incomplete.
pub async fn claim_certificate(
    State(certificates): State<CertificateService>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = Session::from_claims(&claims)?;
    let certificate = certificates
        .check_and_issue_certificate(session.user_id, course_id)
        .await?;

    Ok(Json(certificate))
}

/// Lists the caller's certificates.
pub async fn list_my_certificates(
    State(certificates): State<CertificateService>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let session = Session::from_claims(&claims)?;
    let list = certificates.list_certificates(session.user_id).await?;

    Ok(Json(list))
}

/// Public verification by code.
pub async fn verify_certificate(
    State(certificates): State<CertificateService>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let verification = certificates
        .verify_certificate(&code)
        .await?
        .ok_or_else(|| AppError::NotFound("Certificate not found".to_string()))?;

    Ok(Json(verification))
}

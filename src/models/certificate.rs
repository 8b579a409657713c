// src/models/certificate.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

/// Display data frozen at issuance, so later edits to the course or the
/// user never change an issued certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateMetadata {
    pub course_title: String,
    pub recipient_name: String,
    pub issued_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'certificates' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Certificate {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,

    /// Globally unique verification code, e.g. `LUMINA-7Q2K-0ZXD`.
    pub code: String,

    pub issued_at: chrono::DateTime<chrono::Utc>,

    /// Stored as a JSON object in the database.
    pub metadata: Json<CertificateMetadata>,
}

/// Public view returned by code verification.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CertificateVerification {
    pub code: String,
    pub issued_at: chrono::DateTime<chrono::Utc>,
    pub user_id: i64,
    pub course_id: i64,

    /// Current display name of the holder.
    pub user_name: String,

    /// Current title of the course.
    pub course_title: String,

    pub metadata: Json<CertificateMetadata>,
}

/// DTO for the administrative override.
#[derive(Debug, Deserialize)]
pub struct ManualIssueRequest {
    pub user_id: i64,
    pub course_id: i64,
}

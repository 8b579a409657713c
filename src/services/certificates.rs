// src/services/certificates.rs

use std::sync::LazyLock;

use chrono::Utc;
use rand::Rng;
use regex::Regex;
use sqlx::{SqlitePool, types::Json};
use tracing::{Instrument, Span};

use crate::{
    config::{
        CERTIFICATE_CODE_PREFIX, CODE_ISSUE_RETRIES, CODE_SEGMENT_LENGTH,
        MANUAL_CERTIFICATE_CODE_PREFIX,
    },
    error::AppError,
    models::{
        achievement::AchievementTrigger,
        certificate::{Certificate, CertificateMetadata, CertificateVerification},
        course::Course,
        user::Session,
    },
    services::achievements::AchievementService,
};

const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

static CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(LUMINA|MANUAL)-[0-9A-Z]{4}-[0-9A-Z]{4}$").expect("code pattern is valid")
});

/// Builds `PREFIX-XXXX-XXXX` from uppercase base36 characters.
pub fn generate_code(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let mut segment = || -> String {
        (0..CODE_SEGMENT_LENGTH)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect()
    };
    let first = segment();
    let second = segment();
    format!("{}-{}-{}", prefix, first, second)
}

/// Whether `code` has the shape of a code this service issues.
pub fn is_well_formed_code(code: &str) -> bool {
    CODE_PATTERN.is_match(code)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|e| e.is_unique_violation())
}

/// Course-completion certificates and their verification.
#[derive(Clone)]
pub struct CertificateService {
    pool: SqlitePool,
    span: Span,
    achievements: AchievementService,
}

impl CertificateService {
    pub fn new(pool: SqlitePool, achievements: AchievementService) -> Self {
        Self::with_span(pool, achievements, tracing::info_span!("certificates"))
    }

    pub fn with_span(pool: SqlitePool, achievements: AchievementService, span: Span) -> Self {
        Self {
            pool,
            span,
            achievements,
        }
    }

    /// Issues the certificate for (user, course) once every published topic
    /// of the course is complete.
    ///
    /// Returns `None` while the course is incomplete or has no published
    /// topics. Repeated calls return the same certificate.
    pub async fn check_and_issue_certificate(
        &self,
        user_id: i64,
        course_id: i64,
    ) -> Result<Option<Certificate>, AppError> {
        self.check_and_issue(user_id, course_id)
            .instrument(self.span.clone())
            .await
    }

    async fn check_and_issue(
        &self,
        user_id: i64,
        course_id: i64,
    ) -> Result<Option<Certificate>, AppError> {
        let course = self.fetch_course(course_id).await?;

        let published: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM topics t
            JOIN lessons l ON t.lesson_id = l.id
            WHERE l.course_id = ? AND t.is_published = TRUE
            "#,
        )
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;

        if published == 0 {
            return Ok(None);
        }

        let completed: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM user_progress p
            JOIN topics t ON p.topic_id = t.id
            JOIN lessons l ON t.lesson_id = l.id
            WHERE p.user_id = ?
              AND p.is_completed = TRUE
              AND l.course_id = ?
              AND t.is_published = TRUE
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;

        if completed != published {
            tracing::debug!(user_id, course_id, completed, published, "course not complete");
            return Ok(None);
        }

        let certificate = match self.find(user_id, course_id).await? {
            Some(existing) => existing,
            None => self.issue(user_id, &course, CERTIFICATE_CODE_PREFIX).await?,
        };

        // Rules are idempotent, so evaluating on the existing-certificate path
        // also repairs a grant lost to an earlier failure.
        self.run_achievements(user_id, AchievementTrigger::CourseCompletion { course_id })
            .await;

        Ok(Some(certificate))
    }

    /// Administrative override: issues a `MANUAL-` certificate without
    /// checking progress. Idempotent per (user, course).
    pub async fn issue_manual_certificate(
        &self,
        session: &Session,
        user_id: i64,
        course_id: i64,
    ) -> Result<Certificate, AppError> {
        session.require_admin()?;
        self.issue_manual(session.user_id, user_id, course_id)
            .instrument(self.span.clone())
            .await
    }

    async fn issue_manual(
        &self,
        admin_id: i64,
        user_id: i64,
        course_id: i64,
    ) -> Result<Certificate, AppError> {
        let course = self.fetch_course(course_id).await?;

        let certificate = match self.find(user_id, course_id).await? {
            Some(existing) => existing,
            None => {
                let certificate = self
                    .issue(user_id, &course, MANUAL_CERTIFICATE_CODE_PREFIX)
                    .await?;
                tracing::info!(admin_id, user_id, course_id, "manual certificate issued");
                certificate
            }
        };

        self.run_achievements(user_id, AchievementTrigger::ManualIssue { course_id })
            .await;

        Ok(certificate)
    }

    /// Public lookup by verification code. A miss is `None`, not an error.
    pub async fn verify_certificate(
        &self,
        code: &str,
    ) -> Result<Option<CertificateVerification>, AppError> {
        if !is_well_formed_code(code) {
            return Ok(None);
        }

        let verification = sqlx::query_as::<_, CertificateVerification>(
            r#"
            SELECT
                c.code,
                c.issued_at,
                c.user_id,
                c.course_id,
                u.name AS user_name,
                co.title AS course_title,
                c.metadata
            FROM certificates c
            JOIN users u ON c.user_id = u.id
            JOIN courses co ON c.course_id = co.id
            WHERE c.code = ?
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .instrument(self.span.clone())
        .await?;

        Ok(verification)
    }

    /// The user's certificates, newest first.
    pub async fn list_certificates(&self, user_id: i64) -> Result<Vec<Certificate>, AppError> {
        let certificates = sqlx::query_as::<_, Certificate>(
            "SELECT * FROM certificates WHERE user_id = ? ORDER BY issued_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .instrument(self.span.clone())
        .await?;

        Ok(certificates)
    }

    async fn fetch_course(&self, course_id: i64) -> Result<Course, AppError> {
        sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = ?")
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Course not found".to_string()))
    }

    async fn find(&self, user_id: i64, course_id: i64) -> Result<Option<Certificate>, AppError> {
        let certificate = sqlx::query_as::<_, Certificate>(
            "SELECT * FROM certificates WHERE user_id = ? AND course_id = ?",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(certificate)
    }

    /// Inserts the certificate with a metadata snapshot.
    ///
    /// A concurrent issuance for the same (user, course) wins silently and its
    /// certificate is returned; a code collision retries with a fresh code.
    async fn issue(&self, user_id: i64, course: &Course, prefix: &str) -> Result<Certificate, AppError> {
        let recipient_name: String = sqlx::query_scalar("SELECT name FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        for _ in 0..CODE_ISSUE_RETRIES {
            let issued_at = Utc::now();
            let code = generate_code(prefix);
            let metadata = CertificateMetadata {
                course_title: course.title.clone(),
                recipient_name: recipient_name.clone(),
                issued_at,
            };

            let inserted = sqlx::query_as::<_, Certificate>(
                r#"
                INSERT INTO certificates (user_id, course_id, code, issued_at, metadata)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT (user_id, course_id) DO NOTHING
                RETURNING *
                "#,
            )
            .bind(user_id)
            .bind(course.id)
            .bind(&code)
            .bind(issued_at)
            .bind(Json(metadata))
            .fetch_optional(&self.pool)
            .await;

            match inserted {
                Ok(Some(certificate)) => {
                    tracing::info!(user_id, course_id = course.id, code = %certificate.code, "certificate issued");
                    return Ok(certificate);
                }
                Ok(None) => {
                    return self.find(user_id, course.id).await?.ok_or_else(|| {
                        AppError::InternalServerError("Certificate conflict without a row".to_string())
                    });
                }
                Err(err) if is_unique_violation(&err) => {
                    tracing::warn!(code = %code, "verification code collision, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(AppError::InternalServerError(
            "Could not generate a unique verification code".to_string(),
        ))
    }

    /// Achievement evaluation never fails the caller; errors are logged.
    async fn run_achievements(&self, user_id: i64, trigger: AchievementTrigger) {
        if let Err(e) = self.achievements.check_achievements(user_id, trigger).await {
            tracing::warn!(user_id, ?trigger, "achievement evaluation failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_code_shape() {
        for _ in 0..100 {
            let code = generate_code(CERTIFICATE_CODE_PREFIX);
            assert!(is_well_formed_code(&code), "bad code {}", code);
            assert!(code.starts_with("LUMINA-"));
            assert_eq!(code.len(), "LUMINA-XXXX-XXXX".len());
        }
    }

    #[test]
    fn test_manual_prefix() {
        let code = generate_code(MANUAL_CERTIFICATE_CODE_PREFIX);
        assert!(code.starts_with("MANUAL-"));
        assert!(is_well_formed_code(&code));
    }

    #[test]
    fn test_rejects_malformed_codes() {
        assert!(!is_well_formed_code("LUMINA-abcd-1234"));
        assert!(!is_well_formed_code("LUMINA-ABCD1234"));
        assert!(!is_well_formed_code("OTHER-ABCD-1234"));
        assert!(!is_well_formed_code("' OR 1=1 --"));
    }
}

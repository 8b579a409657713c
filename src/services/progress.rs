// src/services/progress.rs

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{Instrument, Span};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        course::{
            Course, CreateCourseRequest, CreateLessonRequest, CreateTopicRequest, Lesson, Topic,
            TopicCompletion,
        },
        user::Session,
    },
    services::certificates::CertificateService,
    utils::html::clean_html,
};

/// Course structure authoring and per-topic learner progress.
#[derive(Clone)]
pub struct ProgressService {
    pool: SqlitePool,
    span: Span,
    certificates: CertificateService,
}

impl ProgressService {
    pub fn new(pool: SqlitePool, certificates: CertificateService) -> Self {
        Self::with_span(pool, certificates, tracing::info_span!("progress"))
    }

    pub fn with_span(pool: SqlitePool, certificates: CertificateService, span: Span) -> Self {
        Self {
            pool,
            span,
            certificates,
        }
    }

    pub async fn create_course(
        &self,
        session: &Session,
        req: CreateCourseRequest,
    ) -> Result<Course, AppError> {
        session.require_instructor()?;
        req.validate()?;

        let course = sqlx::query_as::<_, Course>(
            r#"
            INSERT INTO courses (title, description, created_by, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(clean_html(&req.title))
        .bind(req.description.as_deref().map(clean_html))
        .bind(session.user_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .instrument(self.span.clone())
        .await?;

        self.span
            .in_scope(|| tracing::info!(course_id = course.id, "course created"));
        Ok(course)
    }

    pub async fn add_lesson(
        &self,
        session: &Session,
        course_id: i64,
        req: CreateLessonRequest,
    ) -> Result<Lesson, AppError> {
        session.require_instructor()?;
        req.validate()?;

        let lesson = sqlx::query_as::<_, Lesson>(
            r#"
            INSERT INTO lessons (course_id, title, position)
            SELECT id, ?, ? FROM courses WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(clean_html(&req.title))
        .bind(req.position)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .instrument(self.span.clone())
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

        Ok(lesson)
    }

    pub async fn add_topic(
        &self,
        session: &Session,
        lesson_id: i64,
        req: CreateTopicRequest,
    ) -> Result<Topic, AppError> {
        session.require_instructor()?;
        req.validate()?;

        let topic = sqlx::query_as::<_, Topic>(
            r#"
            INSERT INTO topics (lesson_id, title, position, is_published)
            SELECT id, ?, ?, ? FROM lessons WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(clean_html(&req.title))
        .bind(req.position)
        .bind(req.is_published)
        .bind(lesson_id)
        .fetch_optional(&self.pool)
        .instrument(self.span.clone())
        .await?
        .ok_or_else(|| AppError::NotFound("Lesson not found".to_string()))?;

        Ok(topic)
    }

    /// Marks a topic complete for the user, then checks the course for a
    /// certificate. The progress write stands even if the check fails.
    pub async fn complete_topic(
        &self,
        user_id: i64,
        topic_id: i64,
    ) -> Result<TopicCompletion, AppError> {
        self.record_completion(user_id, topic_id)
            .instrument(self.span.clone())
            .await
    }

    async fn record_completion(
        &self,
        user_id: i64,
        topic_id: i64,
    ) -> Result<TopicCompletion, AppError> {
        let course_id: i64 = sqlx::query_scalar(
            r#"
            SELECT l.course_id
            FROM topics t
            JOIN lessons l ON t.lesson_id = l.id
            WHERE t.id = ?
            "#,
        )
        .bind(topic_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Topic not found".to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO user_progress (user_id, topic_id, is_completed, completed_at)
            VALUES (?, ?, TRUE, ?)
            ON CONFLICT (user_id, topic_id) DO UPDATE SET
                is_completed = TRUE,
                completed_at = COALESCE(user_progress.completed_at, excluded.completed_at)
            "#,
        )
        .bind(user_id)
        .bind(topic_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        tracing::debug!(user_id, topic_id, course_id, "topic completed");

        let certificate = match self
            .certificates
            .check_and_issue_certificate(user_id, course_id)
            .await
        {
            Ok(certificate) => certificate,
            Err(e) => {
                tracing::warn!(user_id, course_id, "certificate check failed: {}", e);
                None
            }
        };

        Ok(TopicCompletion {
            topic_id,
            course_id,
            certificate,
        })
    }
}

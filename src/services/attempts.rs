// src/services/attempts.rs

use std::collections::HashMap;

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tracing::{Instrument, Span};
use validator::Validate;

use crate::{
    db,
    error::AppError,
    models::{
        attempt::{Attempt, AttemptStatus, StartedAttempt, SubmissionResult, SubmitAttemptRequest},
        quiz::Quiz,
        user::Session,
    },
    services::{answers, grading, quizzes::fetch_detail},
};

/// Start, submit and review of quiz attempts.
#[derive(Clone)]
pub struct AttemptService {
    pool: SqlitePool,
    span: Span,
}

impl AttemptService {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_span(pool, tracing::info_span!("attempts"))
    }

    pub fn with_span(pool: SqlitePool, span: Span) -> Self {
        Self { pool, span }
    }

    /// Opens a new attempt for `user_id` on `quiz_id`.
    ///
    /// The ceiling check and the insert are one statement, so two concurrent
    /// starts cannot both slip under `max_attempts`.
    pub async fn start(&self, user_id: i64, quiz_id: i64) -> Result<StartedAttempt, AppError> {
        self.open(user_id, quiz_id)
            .instrument(self.span.clone())
            .await
    }

    async fn open(&self, user_id: i64, quiz_id: i64) -> Result<StartedAttempt, AppError> {
        let quiz = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = ?")
            .bind(quiz_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

        let attempt = sqlx::query_as::<_, Attempt>(
            r#"
            INSERT INTO quiz_attempts (user_id, quiz_id, status, started_at)
            SELECT ?, q.id, ?, ?
            FROM quizzes q
            WHERE q.id = ?
              AND (
                q.max_attempts IS NULL
                OR (SELECT COUNT(*) FROM quiz_attempts WHERE user_id = ? AND quiz_id = q.id) < q.max_attempts
              )
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(AttemptStatus::InProgress)
        .bind(Utc::now())
        .bind(quiz_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(attempt) = attempt else {
            let max_attempts = quiz.max_attempts.unwrap_or_default();
            tracing::warn!(user_id, quiz_id, max_attempts, "attempt limit reached");
            return Err(AppError::AttemptLimitExceeded { max_attempts });
        };

        tracing::info!(user_id, quiz_id, attempt_id = attempt.id, "attempt started");

        let deadline = quiz
            .time_limit_minutes
            .map(|minutes| attempt.started_at + Duration::minutes(minutes));

        Ok(StartedAttempt { attempt, deadline })
    }

    /// Records the submitted answers, grades the attempt and finalizes it.
    ///
    /// Answers saved earlier are kept unless the submission overrides them.
    /// Responses and the status transition commit together; the transition is
    /// conditional on the attempt still being `IN_PROGRESS`, so an attempt is
    /// scored at most once.
    pub async fn submit(
        &self,
        user_id: i64,
        attempt_id: i64,
        req: SubmitAttemptRequest,
    ) -> Result<SubmissionResult, AppError> {
        req.validate()?;
        self.finalize(user_id, attempt_id, req)
            .instrument(self.span.clone())
            .await
    }

    async fn finalize(
        &self,
        user_id: i64,
        attempt_id: i64,
        req: SubmitAttemptRequest,
    ) -> Result<SubmissionResult, AppError> {
        let mut tx = db::begin_immediate(&self.pool).await?;

        let attempt = answers::fetch_owned_attempt(&mut tx, attempt_id, user_id).await?;
        if !attempt.status.is_open() {
            return Err(AppError::AttemptClosed("Attempt already submitted".to_string()));
        }

        let detail = fetch_detail(&mut tx, attempt.quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

        for answer in &req.answers {
            answers::check_answer(&mut tx, attempt.quiz_id, answer).await?;
        }

        // Stored answers first, then the submission on top; for repeated
        // question ids the last one wins.
        let mut selected: HashMap<i64, i64> = HashMap::new();
        for response in answers::fetch_responses(&mut tx, attempt_id).await? {
            if let Some(option_id) = response.selected_option_id {
                selected.insert(response.question_id, option_id);
            }
        }
        for answer in &req.answers {
            match answer.selected_option_id {
                Some(option_id) => selected.insert(answer.question_id, option_id),
                None => selected.remove(&answer.question_id),
            };
        }

        let now = Utc::now();
        for answer in &req.answers {
            answers::write_response(&mut tx, attempt_id, answer, now)
                .await?
                .ok_or_else(|| AppError::AttemptClosed("Attempt already submitted".to_string()))?;
        }

        let report = grading::grade(&detail.questions, &selected, detail.quiz.passing_score);
        let status = if report.needs_review {
            AttemptStatus::Pending
        } else {
            AttemptStatus::Completed
        };

        let attempt = sqlx::query_as::<_, Attempt>(
            r#"
            UPDATE quiz_attempts
            SET status = ?, score = ?, completed_at = ?
            WHERE id = ? AND status = ?
            RETURNING *
            "#,
        )
        .bind(status)
        .bind(report.score)
        .bind(now)
        .bind(attempt_id)
        .bind(AttemptStatus::InProgress)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::AttemptClosed("Attempt already submitted".to_string()))?;

        tx.commit().await?;

        tracing::info!(
            attempt_id,
            user_id,
            score = report.score,
            passed = report.passed,
            status = ?attempt.status,
            "attempt submitted"
        );

        Ok(SubmissionResult {
            attempt,
            correct_count: report.correct_count,
            total_questions: report.total_questions,
            passed: report.passed,
        })
    }

    /// Sets the final score of an attempt waiting for manual review.
    /// Instructor or admin only.
    pub async fn review(
        &self,
        session: &Session,
        attempt_id: i64,
        score: i64,
    ) -> Result<Attempt, AppError> {
        session.require_instructor()?;
        if !(0..=100).contains(&score) {
            return Err(AppError::BadRequest(
                "Score must be between 0 and 100".to_string(),
            ));
        }
        self.grade_pending(attempt_id, score)
            .instrument(self.span.clone())
            .await
    }

    async fn grade_pending(&self, attempt_id: i64, score: i64) -> Result<Attempt, AppError> {
        let graded = sqlx::query_as::<_, Attempt>(
            r#"
            UPDATE quiz_attempts
            SET status = ?, score = ?
            WHERE id = ? AND status = ?
            RETURNING *
            "#,
        )
        .bind(AttemptStatus::Graded)
        .bind(score)
        .bind(attempt_id)
        .bind(AttemptStatus::Pending)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(attempt) = graded {
            tracing::info!(attempt_id, score, "attempt graded");
            return Ok(attempt);
        }

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM quiz_attempts WHERE id = ?")
            .bind(attempt_id)
            .fetch_optional(&self.pool)
            .await?;

        match exists {
            Some(_) => Err(AppError::AttemptClosed(
                "Attempt is not awaiting review".to_string(),
            )),
            None => Err(AppError::NotFound("Attempt not found".to_string())),
        }
    }

    /// The user's attempts on a quiz, most recent first.
    pub async fn list_attempts(&self, user_id: i64, quiz_id: i64) -> Result<Vec<Attempt>, AppError> {
        let attempts = sqlx::query_as::<_, Attempt>(
            r#"
            SELECT * FROM quiz_attempts
            WHERE user_id = ? AND quiz_id = ?
            ORDER BY started_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .instrument(self.span.clone())
        .await?;

        Ok(attempts)
    }

    /// One attempt owned by `user_id`.
    pub async fn get_attempt(&self, user_id: i64, attempt_id: i64) -> Result<Attempt, AppError> {
        self.load_owned(user_id, attempt_id)
            .instrument(self.span.clone())
            .await
    }

    async fn load_owned(&self, user_id: i64, attempt_id: i64) -> Result<Attempt, AppError> {
        let mut conn = self.pool.acquire().await?;
        answers::fetch_owned_attempt(&mut conn, attempt_id, user_id).await
    }
}

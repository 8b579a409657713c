// src/services/answers.rs

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{Instrument, Span};
use validator::Validate;

use crate::{
    db,
    error::AppError,
    models::{
        attempt::{AnswerInput, Attempt, QuizResponse},
        quiz::QuestionType,
    },
    utils::html::clean_html,
};

/// Loads an attempt owned by `user_id`. Someone else's attempt reads as missing.
pub(crate) async fn fetch_owned_attempt(
    conn: &mut SqliteConnection,
    attempt_id: i64,
    user_id: i64,
) -> Result<Attempt, AppError> {
    sqlx::query_as::<_, Attempt>("SELECT * FROM quiz_attempts WHERE id = ? AND user_id = ?")
        .bind(attempt_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))
}

/// Checks that the answer refers to a question of `quiz_id` and, when an
/// option is selected, to an option of that question.
pub(crate) async fn check_answer(
    conn: &mut SqliteConnection,
    quiz_id: i64,
    answer: &AnswerInput,
) -> Result<(), AppError> {
    let question_type: QuestionType = sqlx::query_scalar(
        "SELECT question_type FROM questions WHERE id = ? AND quiz_id = ?",
    )
    .bind(answer.question_id)
    .bind(quiz_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| {
        AppError::BadRequest(format!(
            "Question {} does not belong to this quiz",
            answer.question_id
        ))
    })?;

    if let Some(option_id) = answer.selected_option_id {
        if question_type == QuestionType::Essay {
            return Err(AppError::BadRequest(
                "Essay questions take a text answer".to_string(),
            ));
        }

        let matches: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM question_options WHERE id = ? AND question_id = ?",
        )
        .bind(option_id)
        .bind(answer.question_id)
        .fetch_one(&mut *conn)
        .await?;

        if matches == 0 {
            return Err(AppError::BadRequest(format!(
                "Option {} does not belong to question {}",
                option_id, answer.question_id
            )));
        }
    }

    Ok(())
}

/// Upserts the response for (attempt, question) while the attempt is still in
/// progress. Returns `None` when the attempt is no longer open.
pub(crate) async fn write_response(
    conn: &mut SqliteConnection,
    attempt_id: i64,
    answer: &AnswerInput,
    now: DateTime<Utc>,
) -> Result<Option<QuizResponse>, sqlx::Error> {
    let text_answer = answer.text_answer.as_deref().map(clean_html);

    sqlx::query_as::<_, QuizResponse>(
        r#"
        INSERT INTO quiz_responses (attempt_id, question_id, selected_option_id, text_answer, answered_at)
        SELECT ?, ?, ?, ?, ?
        WHERE EXISTS (
            SELECT 1 FROM quiz_attempts WHERE id = ? AND status = 'IN_PROGRESS'
        )
        ON CONFLICT (attempt_id, question_id) DO UPDATE SET
            selected_option_id = excluded.selected_option_id,
            text_answer = excluded.text_answer,
            answered_at = excluded.answered_at
        RETURNING *
        "#,
    )
    .bind(attempt_id)
    .bind(answer.question_id)
    .bind(answer.selected_option_id)
    .bind(text_answer)
    .bind(now)
    .bind(attempt_id)
    .fetch_optional(&mut *conn)
    .await
}

pub(crate) async fn fetch_responses(
    conn: &mut SqliteConnection,
    attempt_id: i64,
) -> Result<Vec<QuizResponse>, sqlx::Error> {
    sqlx::query_as::<_, QuizResponse>(
        "SELECT * FROM quiz_responses WHERE attempt_id = ? ORDER BY question_id",
    )
    .bind(attempt_id)
    .fetch_all(&mut *conn)
    .await
}

/// Persists a learner's answers, one per question per attempt.
#[derive(Clone)]
pub struct AnswerStore {
    pool: SqlitePool,
    span: Span,
}

impl AnswerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_span(pool, tracing::info_span!("answers"))
    }

    pub fn with_span(pool: SqlitePool, span: Span) -> Self {
        Self { pool, span }
    }

    /// Records one answer. A later answer to the same question replaces the earlier one.
    pub async fn save_answer(
        &self,
        user_id: i64,
        attempt_id: i64,
        answer: AnswerInput,
    ) -> Result<QuizResponse, AppError> {
        answer.validate()?;
        self.record(user_id, attempt_id, &answer)
            .instrument(self.span.clone())
            .await
    }

    async fn record(
        &self,
        user_id: i64,
        attempt_id: i64,
        answer: &AnswerInput,
    ) -> Result<QuizResponse, AppError> {
        let mut tx = db::begin_immediate(&self.pool).await?;

        let attempt = fetch_owned_attempt(&mut tx, attempt_id, user_id).await?;
        if !attempt.status.is_open() {
            return Err(AppError::AttemptClosed(
                "Attempt is no longer accepting answers".to_string(),
            ));
        }

        check_answer(&mut tx, attempt.quiz_id, answer).await?;

        let response = write_response(&mut tx, attempt_id, answer, Utc::now())
            .await?
            .ok_or_else(|| {
                AppError::AttemptClosed("Attempt is no longer accepting answers".to_string())
            })?;

        tx.commit().await?;

        tracing::debug!(attempt_id, question_id = answer.question_id, "answer saved");
        Ok(response)
    }

    /// Stored responses of an attempt owned by `user_id`, by question id.
    pub async fn responses_for(
        &self,
        user_id: i64,
        attempt_id: i64,
    ) -> Result<Vec<QuizResponse>, AppError> {
        self.load(user_id, attempt_id)
            .instrument(self.span.clone())
            .await
    }

    async fn load(&self, user_id: i64, attempt_id: i64) -> Result<Vec<QuizResponse>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_owned_attempt(&mut conn, attempt_id, user_id).await?;
        Ok(fetch_responses(&mut conn, attempt_id).await?)
    }
}

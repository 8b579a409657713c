// src/services/quizzes.rs

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{Instrument, Span};
use validator::Validate;

use crate::{
    db,
    error::AppError,
    models::{
        quiz::{
            CreateQuizRequest, Question, QuestionOption, QuestionWithOptions, Quiz, QuizDetail,
            QuizSettingsUpdate,
        },
        user::Session,
    },
    utils::html::clean_html,
};

/// Loads a quiz with its questions and options in stable (position, id) order.
pub(crate) async fn fetch_detail(
    conn: &mut SqliteConnection,
    quiz_id: i64,
) -> Result<Option<QuizDetail>, sqlx::Error> {
    let Some(quiz) = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = ?")
        .bind(quiz_id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let questions = sqlx::query_as::<_, Question>(
        "SELECT * FROM questions WHERE quiz_id = ? ORDER BY position, id",
    )
    .bind(quiz_id)
    .fetch_all(&mut *conn)
    .await?;

    let options = sqlx::query_as::<_, QuestionOption>(
        r#"
        SELECT o.*
        FROM question_options o
        JOIN questions q ON o.question_id = q.id
        WHERE q.quiz_id = ?
        ORDER BY o.position, o.id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(&mut *conn)
    .await?;

    let questions = questions
        .into_iter()
        .map(|question| {
            let options = options
                .iter()
                .filter(|o| o.question_id == question.id)
                .cloned()
                .collect();
            QuestionWithOptions { question, options }
        })
        .collect();

    Ok(Some(QuizDetail { quiz, questions }))
}

/// Quiz authoring: create, read, settings updates and deletion.
#[derive(Clone)]
pub struct QuizService {
    pool: SqlitePool,
    span: Span,
}

impl QuizService {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_span(pool, tracing::info_span!("quizzes"))
    }

    pub fn with_span(pool: SqlitePool, span: Span) -> Self {
        Self { pool, span }
    }

    /// Creates a quiz with all of its questions and options in one transaction.
    /// Instructor or admin only.
    pub async fn create_quiz(
        &self,
        session: &Session,
        req: CreateQuizRequest,
    ) -> Result<QuizDetail, AppError> {
        session.require_instructor()?;
        req.validate()?;
        self.insert_quiz(req).instrument(self.span.clone()).await
    }

    async fn insert_quiz(&self, req: CreateQuizRequest) -> Result<QuizDetail, AppError> {
        let mut tx = db::begin_immediate(&self.pool).await?;

        if let Some(course_id) = req.course_id {
            sqlx::query_scalar::<_, i64>("SELECT id FROM courses WHERE id = ?")
                .bind(course_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;
        }

        let quiz_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO quizzes (course_id, title, time_limit_minutes, passing_score, max_attempts, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(req.course_id)
        .bind(clean_html(&req.title))
        .bind(req.time_limit_minutes)
        .bind(req.passing_score)
        .bind(req.max_attempts)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        for (index, question) in req.questions.iter().enumerate() {
            let question_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO questions (quiz_id, text, question_type, points, position)
                VALUES (?, ?, ?, ?, ?)
                RETURNING id
                "#,
            )
            .bind(quiz_id)
            .bind(clean_html(&question.text))
            .bind(question.question_type)
            .bind(question.points)
            .bind(question.position.unwrap_or(index as i64))
            .fetch_one(&mut *tx)
            .await?;

            for (position, option) in question.options.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO question_options (question_id, text, is_correct, position)
                    VALUES (?, ?, ?, ?)
                    "#,
                )
                .bind(question_id)
                .bind(clean_html(&option.text))
                .bind(option.is_correct)
                .bind(position as i64)
                .execute(&mut *tx)
                .await?;
            }
        }

        let detail = fetch_detail(&mut tx, quiz_id)
            .await?
            .ok_or_else(|| AppError::InternalServerError("Quiz vanished after insert".to_string()))?;

        tx.commit().await?;

        tracing::info!(
            quiz_id,
            questions = detail.questions.len(),
            "quiz created"
        );
        Ok(detail)
    }

    /// The quiz with its answer key.
    pub async fn get_quiz(&self, quiz_id: i64) -> Result<QuizDetail, AppError> {
        self.load_detail(quiz_id).instrument(self.span.clone()).await
    }

    async fn load_detail(&self, quiz_id: i64) -> Result<QuizDetail, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_detail(&mut conn, quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))
    }

    /// Applies a partial settings update. Instructor or admin only.
    pub async fn update_quiz_settings(
        &self,
        session: &Session,
        quiz_id: i64,
        update: QuizSettingsUpdate,
    ) -> Result<Quiz, AppError> {
        session.require_instructor()?;
        update.validate()?;
        update.validate_limits()?;
        self.apply_settings(quiz_id, update)
            .instrument(self.span.clone())
            .await
    }

    async fn apply_settings(&self, quiz_id: i64, update: QuizSettingsUpdate) -> Result<Quiz, AppError> {
        if !update.is_empty() {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE quizzes SET ");
            let mut separated = builder.separated(", ");

            if let Some(title) = update.title {
                separated.push("title = ");
                separated.push_bind_unseparated(clean_html(&title));
            }

            if let Some(time_limit) = update.time_limit_minutes {
                separated.push("time_limit_minutes = ");
                separated.push_bind_unseparated(time_limit);
            }

            if let Some(passing_score) = update.passing_score {
                separated.push("passing_score = ");
                separated.push_bind_unseparated(passing_score);
            }

            if let Some(max_attempts) = update.max_attempts {
                separated.push("max_attempts = ");
                separated.push_bind_unseparated(max_attempts);
            }

            builder.push(" WHERE id = ");
            builder.push_bind(quiz_id);

            let result = builder.build().execute(&self.pool).await?;
            if result.rows_affected() == 0 {
                return Err(AppError::NotFound("Quiz not found".to_string()));
            }

            tracing::info!(quiz_id, "quiz settings updated");
        }

        sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = ?")
            .bind(quiz_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))
    }

    /// Deletes a quiz; questions, options, attempts and responses cascade.
    pub async fn delete_quiz(&self, session: &Session, quiz_id: i64) -> Result<(), AppError> {
        session.require_instructor()?;

        let result = sqlx::query("DELETE FROM quizzes WHERE id = ?")
            .bind(quiz_id)
            .execute(&self.pool)
            .instrument(self.span.clone())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }

        self.span.in_scope(|| tracing::info!(quiz_id, "quiz deleted"));
        Ok(())
    }
}

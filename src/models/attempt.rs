// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Lifecycle state of an attempt.
///
/// `IN_PROGRESS` is the only state that accepts answers. Auto-graded quizzes
/// finish in `COMPLETED`; quizzes with essay questions wait in `PENDING`
/// until an instructor moves them to `GRADED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    Pending,
    Graded,
}

impl AttemptStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, AttemptStatus::InProgress)
    }
}

/// Represents the 'quiz_attempts' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub user_id: i64,
    pub quiz_id: i64,
    pub status: AttemptStatus,

    /// Percentage (0-100); `None` until the attempt is submitted.
    pub score: Option<i64>,

    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'quiz_responses' table: one answer per (attempt, question).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizResponse {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub selected_option_id: Option<i64>,

    /// Free-text answer for essay questions (sanitized).
    pub text_answer: Option<String>,

    pub answered_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for one learner answer.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AnswerInput {
    pub question_id: i64,
    pub selected_option_id: Option<i64>,
    #[validate(length(max = 10000))]
    pub text_answer: Option<String>,
}

/// DTO for submitting an attempt.
/// Answers saved earlier through the answer store are kept unless overwritten here.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct SubmitAttemptRequest {
    #[serde(default)]
    #[validate(nested)]
    pub answers: Vec<AnswerInput>,
}

/// DTO for an instructor's manual grade.
#[derive(Debug, Deserialize, Validate)]
pub struct ReviewAttemptRequest {
    #[validate(range(min = 0, max = 100))]
    pub score: i64,
}

/// A freshly started attempt, with the wall-clock deadline for timed quizzes.
#[derive(Debug, Serialize)]
pub struct StartedAttempt {
    #[serde(flatten)]
    pub attempt: Attempt,
    pub deadline: Option<chrono::DateTime<chrono::Utc>>,
}

/// Outcome of a submission.
#[derive(Debug, Serialize)]
pub struct SubmissionResult {
    pub attempt: Attempt,
    pub correct_count: usize,
    pub total_questions: usize,
    pub passed: bool,
}

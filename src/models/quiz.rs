// src/models/quiz.rs

use serde::{Deserialize, Deserializer, Serialize};
use sqlx::prelude::FromRow;
use validator::{Validate, ValidationError};

/// How a question is answered.
/// Stored in the `questions.question_type` column as SCREAMING_SNAKE_CASE text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    MultipleChoice,
    SingleChoice,
    TrueFalse,
    Essay,
}

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,

    /// Owning course; standalone quizzes have none.
    pub course_id: Option<i64>,

    pub title: String,

    /// Enforced by the quiz-taking client only.
    pub time_limit_minutes: Option<i64>,

    /// Percentage (0-100) needed to pass.
    pub passing_score: i64,

    /// Ceiling on attempts per user; `None` means unlimited.
    pub max_attempts: Option<i64>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    pub text: String,
    pub question_type: QuestionType,

    /// Stored for display; the percentage score does not weight by it.
    pub points: i64,

    pub position: i64,
}

/// Represents the 'question_options' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    pub is_correct: bool,
    pub position: i64,
}

/// A question together with its ordered options (the answer key).
#[derive(Debug, Clone, Serialize)]
pub struct QuestionWithOptions {
    #[serde(flatten)]
    pub question: Question,
    pub options: Vec<QuestionOption>,
}

/// A quiz with its full answer key. Never sent to learners.
#[derive(Debug, Clone, Serialize)]
pub struct QuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<QuestionWithOptions>,
}

/// DTO for sending an option to a learner (excludes `is_correct`).
#[derive(Debug, Serialize)]
pub struct PublicOption {
    pub id: i64,
    pub text: String,
}

/// DTO for sending a question to a learner.
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub text: String,
    pub question_type: QuestionType,
    pub points: i64,
    pub options: Vec<PublicOption>,
}

/// DTO for sending a quiz to a learner.
#[derive(Debug, Serialize)]
pub struct PublicQuiz {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<PublicQuestion>,
}

impl From<QuizDetail> for PublicQuiz {
    fn from(detail: QuizDetail) -> Self {
        let questions = detail
            .questions
            .into_iter()
            .map(|q| PublicQuestion {
                id: q.question.id,
                text: q.question.text,
                question_type: q.question.question_type,
                points: q.question.points,
                options: q
                    .options
                    .into_iter()
                    .map(|o| PublicOption { id: o.id, text: o.text })
                    .collect(),
            })
            .collect();

        Self {
            quiz: detail.quiz,
            questions,
        }
    }
}

fn default_passing_score() -> i64 {
    70
}

fn default_points() -> i64 {
    1
}

/// DTO for creating a quiz together with its questions.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    pub course_id: Option<i64>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(range(min = 1))]
    pub time_limit_minutes: Option<i64>,
    #[serde(default = "default_passing_score")]
    #[validate(range(min = 0, max = 100))]
    pub passing_score: i64,
    #[validate(range(min = 1))]
    pub max_attempts: Option<i64>,
    #[serde(default)]
    #[validate(nested)]
    pub questions: Vec<CreateQuestionRequest>,
}

/// DTO for one question of a new quiz.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_answer_key"))]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
    pub question_type: QuestionType,
    #[serde(default = "default_points")]
    #[validate(range(min = 0))]
    pub points: i64,
    /// Defaults to the question's index in the request.
    #[serde(default)]
    #[validate(range(min = 0))]
    pub position: Option<i64>,
    #[serde(default)]
    #[validate(nested)]
    pub options: Vec<CreateOptionRequest>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOptionRequest {
    #[validate(length(min = 1, max = 500))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// Write-time answer-key rules per question type.
///
/// Single-answer types must carry exactly one correct option so grading never
/// has to pick between several.
pub fn validate_answer_key(question: &CreateQuestionRequest) -> Result<(), ValidationError> {
    let option_count = question.options.len();
    let correct_count = question.options.iter().filter(|o| o.is_correct).count();

    let problem = match question.question_type {
        QuestionType::Essay if option_count > 0 => Some("Essay questions cannot have options."),
        QuestionType::Essay => None,
        QuestionType::TrueFalse if option_count != 2 => {
            Some("True/false questions need exactly two options.")
        }
        QuestionType::SingleChoice if option_count < 2 => {
            Some("Single-choice questions need at least two options.")
        }
        QuestionType::TrueFalse | QuestionType::SingleChoice if correct_count != 1 => {
            Some("Exactly one option must be marked correct.")
        }
        QuestionType::MultipleChoice if option_count < 2 => {
            Some("Multiple-choice questions need at least two options.")
        }
        QuestionType::MultipleChoice if correct_count == 0 => {
            Some("At least one option must be marked correct.")
        }
        _ => None,
    };

    match problem {
        Some(message) => {
            let mut err = ValidationError::new("invalid_answer_key");
            err.message = Some(message.into());
            Err(err)
        }
        None => Ok(()),
    }
}

/// Lets a field tell "absent" (`None`) apart from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial update of quiz settings. Absent fields are left untouched;
/// `null` clears the nullable ones.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct QuizSettingsUpdate {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub time_limit_minutes: Option<Option<i64>>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub max_attempts: Option<Option<i64>>,
}

impl QuizSettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.time_limit_minutes.is_none()
            && self.passing_score.is_none()
            && self.max_attempts.is_none()
    }

    /// Bounds on the clearable fields, which `validator` cannot reach through two options.
    pub fn validate_limits(&self) -> Result<(), ValidationError> {
        if let Some(Some(minutes)) = self.time_limit_minutes {
            if minutes < 1 {
                let mut err = ValidationError::new("range");
                err.message = Some("time_limit_minutes must be at least 1.".into());
                return Err(err);
            }
        }
        if let Some(Some(max)) = self.max_attempts {
            if max < 1 {
                let mut err = ValidationError::new("range");
                err.message = Some("max_attempts must be at least 1.".into());
                return Err(err);
            }
        }
        Ok(())
    }
}

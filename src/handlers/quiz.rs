// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    models::{
        quiz::{CreateQuizRequest, PublicQuiz, QuizSettingsUpdate},
        user::Session,
    },
    services::quizzes::QuizService,
    utils::jwt::Claims,
};

/// Creates a quiz with its questions and options.
/// Instructor only.
pub async fn create_quiz(
    State(quizzes): State<QuizService>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = Session::from_claims(&claims)?;
    let detail = quizzes.create_quiz(&session, payload).await?;

    Ok((StatusCode::CREATED, Json(detail)))
}

/// Returns a quiz for taking.
///
/// Instructors get the answer key; everyone else gets the public view
/// without `is_correct`.
pub async fn get_quiz(
    State(quizzes): State<QuizService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let session = Session::from_claims(&claims)?;
    let detail = quizzes.get_quiz(id).await?;

    if session.require_instructor().is_ok() {
        return Ok(Json(detail).into_response());
    }

    Ok(Json(PublicQuiz::from(detail)).into_response())
}

/// Partially updates quiz settings.
/// Instructor only.
pub async fn update_quiz_settings(
    State(quizzes): State<QuizService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<QuizSettingsUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let session = Session::from_claims(&claims)?;
    let quiz = quizzes.update_quiz_settings(&session, id, payload).await?;

    Ok(Json(quiz))
}

/// Deletes a quiz and everything under it.
/// Instructor only.
pub async fn delete_quiz(
    State(quizzes): State<QuizService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = Session::from_claims(&claims)?;
    quizzes.delete_quiz(&session, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

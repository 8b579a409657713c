// src/handlers/attempt.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        attempt::{AnswerInput, ReviewAttemptRequest, SubmitAttemptRequest},
        user::Session,
    },
    services::{answers::AnswerStore, attempts::AttemptService},
    utils::jwt::Claims,
};

/// Starts a new attempt on a quiz for the caller.
pub async fn start_attempt(
    State(attempts): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = Session::from_claims(&claims)?;
    let started = attempts.start(session.user_id, quiz_id).await?;

    Ok((StatusCode::CREATED, Json(started)))
}

/// Lists the caller's attempts on a quiz.
pub async fn list_attempts(
    State(attempts): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = Session::from_claims(&claims)?;
    let list = attempts.list_attempts(session.user_id, quiz_id).await?;

    Ok(Json(list))
}

/// Returns one of the caller's attempts with its stored responses.
pub async fn get_attempt(
    State(attempts): State<AttemptService>,
    State(answers): State<AnswerStore>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = Session::from_claims(&claims)?;
    let attempt = attempts.get_attempt(session.user_id, attempt_id).await?;
    let responses = answers.responses_for(session.user_id, attempt_id).await?;

    Ok(Json(serde_json::json!({
        "attempt": attempt,
        "responses": responses,
    })))
}

/// Records one answer while the attempt is in progress.
pub async fn save_answer(
    State(answers): State<AnswerStore>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
    Json(payload): Json<AnswerInput>,
) -> Result<impl IntoResponse, AppError> {
    let session = Session::from_claims(&claims)?;
    let response = answers
        .save_answer(session.user_id, attempt_id, payload)
        .await?;

    Ok(Json(response))
}

/// Submits an attempt and returns the graded result.
pub async fn submit_attempt(
    State(attempts): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = Session::from_claims(&claims)?;
    let result = attempts.submit(session.user_id, attempt_id, payload).await?;

    Ok(Json(result))
}

/// Sets the final score of an attempt awaiting manual review.
/// Instructor only.
pub async fn review_attempt(
    State(attempts): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
    Json(payload): Json<ReviewAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let session = Session::from_claims(&claims)?;
    let attempt = attempts.review(&session, attempt_id, payload.score).await?;

    Ok(Json(attempt))
}

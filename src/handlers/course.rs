// src/handlers/course.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{
        course::{CreateCourseRequest, CreateLessonRequest, CreateTopicRequest},
        user::Session,
    },
    services::progress::ProgressService,
    utils::jwt::Claims,
};

/// Creates a course.
/// Instructor only.
pub async fn create_course(
    State(progress): State<ProgressService>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = Session::from_claims(&claims)?;
    let course = progress.create_course(&session, payload).await?;

    Ok((StatusCode::CREATED, Json(course)))
}

/// Adds a lesson to a course.
/// Instructor only.
pub async fn add_lesson(
    State(progress): State<ProgressService>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
    Json(payload): Json<CreateLessonRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = Session::from_claims(&claims)?;
    let lesson = progress.add_lesson(&session, course_id, payload).await?;

    Ok((StatusCode::CREATED, Json(lesson)))
}

/// Adds a topic to a lesson.
/// Instructor only.
pub async fn add_topic(
    State(progress): State<ProgressService>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i64>,
    Json(payload): Json<CreateTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = Session::from_claims(&claims)?;
    let topic = progress.add_topic(&session, lesson_id, payload).await?;

    Ok((StatusCode::CREATED, Json(topic)))
}

/// Marks a topic complete for the caller.
/// The response carries the course certificate once the course is done.
pub async fn complete_topic(
    State(progress): State<ProgressService>,
    Extension(claims): Extension<Claims>,
    Path(topic_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = Session::from_claims(&claims)?;
    let completion = progress.complete_topic(session.user_id, topic_id).await?;

    Ok(Json(completion))
}

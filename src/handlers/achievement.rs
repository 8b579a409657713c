// src/handlers/achievement.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};

use crate::{
    error::AppError, models::user::Session, services::achievements::AchievementService,
    utils::jwt::Claims,
};

/// Lists the caller's unlocked achievements.
pub async fn list_my_achievements(
    State(achievements): State<AchievementService>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let session = Session::from_claims(&claims)?;
    let list = achievements.list_achievements(session.user_id).await?;

    Ok(Json(list))
}

// src/models/achievement.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'achievements' table: a reusable badge definition.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Achievement {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub xp: i64,
    pub icon: String,
}

/// A grant joined with its definition, for listing.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UnlockedAchievement {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub xp: i64,
    pub icon: String,
    pub unlocked_at: chrono::DateTime<chrono::Utc>,
}

/// Definition data used when a badge is created lazily on first unlock.
#[derive(Debug, Clone, Copy)]
pub struct AchievementDefinition {
    pub slug: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub xp: i64,
    pub icon: &'static str,
}

/// What caused an achievement evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AchievementTrigger {
    CourseCompletion { course_id: i64 },
    ManualIssue { course_id: i64 },
}

// src/services/achievements.rs

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{Instrument, Span};

use crate::{
    error::AppError,
    models::achievement::{Achievement, AchievementDefinition, AchievementTrigger, UnlockedAchievement},
};

/// An achievement granted once the user holds at least `min_certificates`.
#[derive(Debug, Clone, Copy)]
pub struct AchievementRule {
    pub min_certificates: i64,
    pub definition: AchievementDefinition,
}

pub const FIRST_STEP: AchievementDefinition = AchievementDefinition {
    slug: "first_step",
    title: "First Step",
    description: "Earned your first course certificate.",
    xp: 10,
    icon: "footprints",
};

pub const DEDICATED_LEARNER: AchievementDefinition = AchievementDefinition {
    slug: "dedicated_learner",
    title: "Dedicated Learner",
    description: "Earned five course certificates.",
    xp: 50,
    icon: "medal",
};

pub const RULES: &[AchievementRule] = &[
    AchievementRule {
        min_certificates: 1,
        definition: FIRST_STEP,
    },
    AchievementRule {
        min_certificates: 5,
        definition: DEDICATED_LEARNER,
    },
];

/// Evaluates the rule set and grants badges idempotently.
#[derive(Clone)]
pub struct AchievementService {
    pool: SqlitePool,
    span: Span,
}

impl AchievementService {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_span(pool, tracing::info_span!("achievements"))
    }

    pub fn with_span(pool: SqlitePool, span: Span) -> Self {
        Self { pool, span }
    }

    /// Re-evaluates every rule against the user's current stats and returns
    /// the slugs unlocked by this call. Safe to call on every trigger.
    pub async fn check_achievements(
        &self,
        user_id: i64,
        trigger: AchievementTrigger,
    ) -> Result<Vec<&'static str>, AppError> {
        self.evaluate(user_id, trigger)
            .instrument(self.span.clone())
            .await
    }

    async fn evaluate(
        &self,
        user_id: i64,
        trigger: AchievementTrigger,
    ) -> Result<Vec<&'static str>, AppError> {
        let certificate_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM certificates WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        let mut unlocked = Vec::new();
        for rule in RULES.iter().filter(|r| certificate_count >= r.min_certificates) {
            if self.grant(user_id, &rule.definition).await? {
                unlocked.push(rule.definition.slug);
            }
        }

        tracing::debug!(user_id, ?trigger, certificate_count, ?unlocked, "achievements evaluated");
        Ok(unlocked)
    }

    /// Creates the definition if its slug is new, then grants it to the user.
    /// Returns `false` when the user already had it.
    pub async fn unlock_achievement(
        &self,
        user_id: i64,
        definition: &AchievementDefinition,
    ) -> Result<bool, AppError> {
        self.grant(user_id, definition)
            .instrument(self.span.clone())
            .await
    }

    async fn grant(&self, user_id: i64, definition: &AchievementDefinition) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO achievements (slug, title, description, xp, icon)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(definition.slug)
        .bind(definition.title)
        .bind(definition.description)
        .bind(definition.xp)
        .bind(definition.icon)
        .execute(&mut *tx)
        .await?;

        // An existing row keeps its stored title and xp.
        let achievement = sqlx::query_as::<_, Achievement>("SELECT * FROM achievements WHERE slug = ?")
            .bind(definition.slug)
            .fetch_one(&mut *tx)
            .await?;

        let result = sqlx::query(
            r#"
            INSERT INTO user_achievements (user_id, achievement_id, unlocked_at)
            VALUES (?, ?, ?)
            ON CONFLICT (user_id, achievement_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(achievement.id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let granted = result.rows_affected() == 1;
        if granted {
            tracing::info!(user_id, slug = %achievement.slug, xp = achievement.xp, "achievement unlocked");
        }
        Ok(granted)
    }

    /// The user's grants with their definitions, oldest first.
    pub async fn list_achievements(&self, user_id: i64) -> Result<Vec<UnlockedAchievement>, AppError> {
        let achievements = sqlx::query_as::<_, UnlockedAchievement>(
            r#"
            SELECT a.slug, a.title, a.description, a.xp, a.icon, ua.unlocked_at
            FROM user_achievements ua
            JOIN achievements a ON ua.achievement_id = a.id
            WHERE ua.user_id = ?
            ORDER BY ua.unlocked_at, a.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .instrument(self.span.clone())
        .await?;

        Ok(achievements)
    }
}

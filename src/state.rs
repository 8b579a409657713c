use crate::config::Config;
use crate::services::{
    achievements::AchievementService, answers::AnswerStore, attempts::AttemptService,
    certificates::CertificateService, progress::ProgressService, quizzes::QuizService,
};
use axum::extract::FromRef;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub quizzes: QuizService,
    pub attempts: AttemptService,
    pub answers: AnswerStore,
    pub certificates: CertificateService,
    pub achievements: AchievementService,
    pub progress: ProgressService,
}

impl AppState {
    /// Wires every service onto the same pool, each with its own log span.
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        let achievements = AchievementService::new(pool.clone());
        let certificates = CertificateService::new(pool.clone(), achievements.clone());
        let progress = ProgressService::new(pool.clone(), certificates.clone());

        Self {
            quizzes: QuizService::new(pool.clone()),
            attempts: AttemptService::new(pool.clone()),
            answers: AnswerStore::new(pool.clone()),
            certificates,
            achievements,
            progress,
            pool,
            config,
        }
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for QuizService {
    fn from_ref(state: &AppState) -> Self {
        state.quizzes.clone()
    }
}

impl FromRef<AppState> for AttemptService {
    fn from_ref(state: &AppState) -> Self {
        state.attempts.clone()
    }
}

impl FromRef<AppState> for AnswerStore {
    fn from_ref(state: &AppState) -> Self {
        state.answers.clone()
    }
}

impl FromRef<AppState> for CertificateService {
    fn from_ref(state: &AppState) -> Self {
        state.certificates.clone()
    }
}

impl FromRef<AppState> for AchievementService {
    fn from_ref(state: &AppState) -> Self {
        state.achievements.clone()
    }
}

impl FromRef<AppState> for ProgressService {
    fn from_ref(state: &AppState) -> Self {
        state.progress.clone()
    }
}

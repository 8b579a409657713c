// tests/common/mod.rs

#![allow(dead_code)]

use std::path::PathBuf;

use chrono::Utc;
use lumina::{
    config::Config,
    db,
    models::{
        course::{Course, CreateCourseRequest, CreateLessonRequest, CreateTopicRequest, Topic},
        quiz::{CreateOptionRequest, CreateQuestionRequest, CreateQuizRequest, QuestionType, QuizDetail},
        user::{Role, Session},
    },
    state::AppState,
};
use sqlx::SqlitePool;

/// A migrated in-memory database, fresh for each test.
pub async fn setup() -> SqlitePool {
    db::connect_in_memory()
        .await
        .expect("Failed to open in-memory database")
}

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        log_dir: "logs".to_string(),
        admin_name: None,
        admin_email: None,
    }
}

pub async fn setup_state() -> AppState {
    AppState::new(setup().await, test_config())
}

/// State over a migrated database file in the temp dir, with a real
/// multi-connection pool. Pass the path to `remove_database` when done.
pub async fn setup_file_state() -> (AppState, PathBuf) {
    let path = std::env::temp_dir().join(format!("lumina_{}.db", uuid::Uuid::new_v4()));
    let pool = db::connect(&format!("sqlite://{}", path.display()))
        .await
        .expect("Failed to open database file");

    db::MIGRATOR
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    (AppState::new(pool, test_config()), path)
}

pub async fn remove_database(state: AppState, path: PathBuf) {
    state.pool.close().await;
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
    }
}

/// Inserts a user and returns a session for it.
pub async fn create_user(pool: &SqlitePool, name: &str, role: Role) -> Session {
    let email = format!("{}_{}@example.com", name, &uuid::Uuid::new_v4().to_string()[..8]);
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (name, email, role, created_at) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(name)
    .bind(email)
    .bind(role)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .expect("Failed to insert user");

    Session::new(id, role)
}

/// `count` single-choice questions with four options each; option 0 is correct.
pub fn single_choice_quiz(
    count: usize,
    passing_score: i64,
    max_attempts: Option<i64>,
) -> CreateQuizRequest {
    CreateQuizRequest {
        course_id: None,
        title: "Timber Frames".to_string(),
        time_limit_minutes: None,
        passing_score,
        max_attempts,
        questions: (0..count)
            .map(|i| CreateQuestionRequest {
                text: format!("Question {}", i),
                question_type: QuestionType::SingleChoice,
                points: 1,
                position: None,
                options: (0..4)
                    .map(|j| CreateOptionRequest {
                        text: format!("Option {}", j),
                        is_correct: j == 0,
                    })
                    .collect(),
            })
            .collect(),
    }
}

/// Id of the first correct option of question `index`.
pub fn correct_option(detail: &QuizDetail, index: usize) -> i64 {
    detail.questions[index]
        .options
        .iter()
        .find(|o| o.is_correct)
        .map(|o| o.id)
        .expect("question has a correct option")
}

/// Id of some incorrect option of question `index`.
pub fn wrong_option(detail: &QuizDetail, index: usize) -> i64 {
    detail.questions[index]
        .options
        .iter()
        .find(|o| !o.is_correct)
        .map(|o| o.id)
        .expect("question has an incorrect option")
}

/// A course with one lesson holding `published` published topics followed by
/// `unpublished` drafts.
pub async fn course_with_topics(
    state: &AppState,
    instructor: &Session,
    title: &str,
    published: usize,
    unpublished: usize,
) -> (Course, Vec<Topic>) {
    let course = state
        .progress
        .create_course(
            instructor,
            CreateCourseRequest {
                title: title.to_string(),
                description: None,
            },
        )
        .await
        .expect("Failed to create course");

    let lesson = state
        .progress
        .add_lesson(
            instructor,
            course.id,
            CreateLessonRequest {
                title: "Lesson 1".to_string(),
                position: 0,
            },
        )
        .await
        .expect("Failed to create lesson");

    let mut topics = Vec::new();
    for i in 0..published + unpublished {
        let topic = state
            .progress
            .add_topic(
                instructor,
                lesson.id,
                CreateTopicRequest {
                    title: format!("Topic {}", i),
                    position: i as i64,
                    is_published: i < published,
                },
            )
            .await
            .expect("Failed to create topic");
        topics.push(topic);
    }

    (course, topics)
}

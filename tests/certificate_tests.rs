// tests/certificate_tests.rs

mod common;

use std::collections::HashSet;

use common::{course_with_topics, create_user, setup_state};
use lumina::{
    error::{AppError, ErrorKind},
    models::{
        achievement::{Achievement, AchievementTrigger},
        user::Role,
    },
    services::{
        achievements::{DEDICATED_LEARNER, FIRST_STEP},
        certificates::is_well_formed_code,
    },
};
use regex::Regex;
use sqlx::SqlitePool;

async fn grant_count(pool: &SqlitePool, user_id: i64, slug: &str) -> i64 {
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM user_achievements ua
        JOIN achievements a ON ua.achievement_id = a.id
        WHERE ua.user_id = ? AND a.slug = ?
        "#,
    )
    .bind(user_id)
    .bind(slug)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn partial_progress_issues_nothing() {
    let state = setup_state().await;
    let instructor = create_user(&state.pool, "instructor", Role::Instructor).await;
    let student = create_user(&state.pool, "learner", Role::Student).await;
    let (course, topics) = course_with_topics(&state, &instructor, "Roof Carpentry", 3, 0).await;

    for topic in &topics[..2] {
        let completion = state.progress.complete_topic(student.user_id, topic.id).await.unwrap();
        assert!(completion.certificate.is_none());
    }

    let certificate = state
        .certificates
        .check_and_issue_certificate(student.user_id, course.id)
        .await
        .unwrap();
    assert!(certificate.is_none());
    assert!(state.certificates.list_certificates(student.user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn completing_last_topic_issues_one_certificate() {
    let state = setup_state().await;
    let instructor = create_user(&state.pool, "instructor", Role::Instructor).await;
    let student = create_user(&state.pool, "learner", Role::Student).await;
    let (course, topics) = course_with_topics(&state, &instructor, "Roof Carpentry", 3, 0).await;

    for topic in &topics[..2] {
        state.progress.complete_topic(student.user_id, topic.id).await.unwrap();
    }
    let completion = state
        .progress
        .complete_topic(student.user_id, topics[2].id)
        .await
        .unwrap();
    assert_eq!(completion.course_id, course.id);

    let first = completion.certificate.expect("certificate after last topic");
    let pattern = Regex::new(r"^LUMINA-[0-9A-Z]{4}-[0-9A-Z]{4}$").unwrap();
    assert!(pattern.is_match(&first.code), "unexpected code {}", first.code);
    assert_eq!(first.metadata.course_title, "Roof Carpentry");
    assert_eq!(first.metadata.recipient_name, "learner");

    let second = state
        .certificates
        .check_and_issue_certificate(student.user_id, course.id)
        .await
        .unwrap()
        .expect("certificate on repeat");
    assert_eq!(second.id, first.id);
    assert_eq!(second.code, first.code);

    assert_eq!(state.certificates.list_certificates(student.user_id).await.unwrap().len(), 1);
    assert_eq!(grant_count(&state.pool, student.user_id, "first_step").await, 1);
}

#[tokio::test]
async fn drafts_do_not_count_toward_completion() {
    let state = setup_state().await;
    let instructor = create_user(&state.pool, "instructor", Role::Instructor).await;
    let student = create_user(&state.pool, "learner", Role::Student).await;
    let (course, topics) = course_with_topics(&state, &instructor, "Joinery", 2, 1).await;

    state.progress.complete_topic(student.user_id, topics[0].id).await.unwrap();
    let completion = state.progress.complete_topic(student.user_id, topics[1].id).await.unwrap();

    let certificate = completion.certificate.expect("published topics are all done");
    assert_eq!(certificate.course_id, course.id);
}

#[tokio::test]
async fn course_without_published_topics_is_never_complete() {
    let state = setup_state().await;
    let instructor = create_user(&state.pool, "instructor", Role::Instructor).await;
    let student = create_user(&state.pool, "learner", Role::Student).await;
    let (course, topics) = course_with_topics(&state, &instructor, "Drafts Only", 0, 2).await;

    for topic in &topics {
        state.progress.complete_topic(student.user_id, topic.id).await.unwrap();
    }

    let certificate = state
        .certificates
        .check_and_issue_certificate(student.user_id, course.id)
        .await
        .unwrap();
    assert!(certificate.is_none());
}

#[tokio::test]
async fn unknown_course_and_topic_are_not_found() {
    let state = setup_state().await;
    let student = create_user(&state.pool, "learner", Role::Student).await;

    let err = state
        .certificates
        .check_and_issue_certificate(student.user_id, 4242)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = state.progress.complete_topic(student.user_id, 4242).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn fifth_certificate_unlocks_dedicated_learner() {
    let state = setup_state().await;
    let instructor = create_user(&state.pool, "instructor", Role::Instructor).await;
    let student = create_user(&state.pool, "learner", Role::Student).await;

    for i in 0..5 {
        let (_, topics) =
            course_with_topics(&state, &instructor, &format!("Course {}", i), 1, 0).await;
        let completion = state.progress.complete_topic(student.user_id, topics[0].id).await.unwrap();
        assert!(completion.certificate.is_some());

        let expected = if i < 4 { 0 } else { 1 };
        assert_eq!(grant_count(&state.pool, student.user_id, "dedicated_learner").await, expected);
    }

    assert_eq!(grant_count(&state.pool, student.user_id, "first_step").await, 1);

    let slugs: Vec<_> = state
        .achievements
        .list_achievements(student.user_id)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.slug)
        .collect();
    assert_eq!(slugs, ["first_step", "dedicated_learner"]);
}

#[tokio::test]
async fn unlock_is_idempotent() {
    let state = setup_state().await;
    let student = create_user(&state.pool, "learner", Role::Student).await;

    assert!(state.achievements.unlock_achievement(student.user_id, &FIRST_STEP).await.unwrap());
    assert!(!state.achievements.unlock_achievement(student.user_id, &FIRST_STEP).await.unwrap());
    assert_eq!(grant_count(&state.pool, student.user_id, "first_step").await, 1);

    let definitions: Vec<Achievement> = sqlx::query_as("SELECT * FROM achievements WHERE slug = ?")
        .bind(FIRST_STEP.slug)
        .fetch_all(&state.pool)
        .await
        .unwrap();
    assert_eq!(definitions.len(), 1);
    assert_eq!(definitions[0].title, "First Step");
    assert_eq!(definitions[0].xp, 10);
    assert_eq!(definitions[0].icon, "footprints");
}

#[tokio::test]
async fn check_achievements_reports_only_new_unlocks() {
    let state = setup_state().await;
    let admin = create_user(&state.pool, "admin", Role::Admin).await;
    let instructor = create_user(&state.pool, "instructor", Role::Instructor).await;
    let student = create_user(&state.pool, "learner", Role::Student).await;
    let (course, _) = course_with_topics(&state, &instructor, "Masonry", 1, 0).await;

    let trigger = AchievementTrigger::CourseCompletion { course_id: course.id };
    let none = state.achievements.check_achievements(student.user_id, trigger).await.unwrap();
    assert!(none.is_empty());

    // Manual issuance already evaluates the rules.
    state
        .certificates
        .issue_manual_certificate(&admin, student.user_id, course.id)
        .await
        .unwrap();
    let again = state.achievements.check_achievements(student.user_id, trigger).await.unwrap();
    assert!(again.is_empty());
    assert_eq!(grant_count(&state.pool, student.user_id, FIRST_STEP.slug).await, 1);
    assert_eq!(grant_count(&state.pool, student.user_id, DEDICATED_LEARNER.slug).await, 0);
}

#[tokio::test]
async fn achievement_failure_does_not_block_issuance() {
    let state = setup_state().await;
    let instructor = create_user(&state.pool, "instructor", Role::Instructor).await;
    let student = create_user(&state.pool, "learner", Role::Student).await;
    let (course, topics) = course_with_topics(&state, &instructor, "Stonework", 1, 0).await;

    sqlx::query("DROP TABLE user_achievements")
        .execute(&state.pool)
        .await
        .unwrap();

    let completion = state.progress.complete_topic(student.user_id, topics[0].id).await.unwrap();
    let certificate = completion.certificate.expect("issued despite achievement failure");
    assert_eq!(certificate.course_id, course.id);
}

#[tokio::test]
async fn certificate_failure_does_not_block_progress() {
    let state = setup_state().await;
    let instructor = create_user(&state.pool, "instructor", Role::Instructor).await;
    let student = create_user(&state.pool, "learner", Role::Student).await;
    let (_, topics) = course_with_topics(&state, &instructor, "Stonework", 1, 0).await;

    sqlx::query("DROP TABLE certificates")
        .execute(&state.pool)
        .await
        .unwrap();

    let completion = state.progress.complete_topic(student.user_id, topics[0].id).await.unwrap();
    assert!(completion.certificate.is_none());

    let completed: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM user_progress WHERE user_id = ? AND is_completed = TRUE",
    )
    .bind(student.user_id)
    .fetch_one(&state.pool)
    .await
    .unwrap();
    assert_eq!(completed, 1);
}

#[tokio::test]
async fn verification_uses_snapshot_and_tolerates_misses() {
    let state = setup_state().await;
    let instructor = create_user(&state.pool, "instructor", Role::Instructor).await;
    let student = create_user(&state.pool, "learner", Role::Student).await;
    let (course, topics) = course_with_topics(&state, &instructor, "Bridges", 1, 0).await;

    let certificate = state
        .progress
        .complete_topic(student.user_id, topics[0].id)
        .await
        .unwrap()
        .certificate
        .unwrap();

    sqlx::query("UPDATE courses SET title = 'Bridges, Revised' WHERE id = ?")
        .bind(course.id)
        .execute(&state.pool)
        .await
        .unwrap();

    let verification = state
        .certificates
        .verify_certificate(&certificate.code)
        .await
        .unwrap()
        .expect("known code verifies");
    assert_eq!(verification.user_id, student.user_id);
    assert_eq!(verification.user_name, "learner");
    assert_eq!(verification.course_title, "Bridges, Revised");
    assert_eq!(verification.metadata.course_title, "Bridges");
    assert_eq!(verification.metadata.recipient_name, "learner");

    assert!(state.certificates.verify_certificate("LUMINA-0000-0000").await.unwrap().is_none());
    assert!(state.certificates.verify_certificate("not a code").await.unwrap().is_none());
}

#[tokio::test]
async fn manual_issue_is_admin_only_and_idempotent() {
    let state = setup_state().await;
    let admin = create_user(&state.pool, "admin", Role::Admin).await;
    let instructor = create_user(&state.pool, "instructor", Role::Instructor).await;
    let student = create_user(&state.pool, "learner", Role::Student).await;
    let (course, _) = course_with_topics(&state, &instructor, "Bridges", 3, 0).await;

    let err = state
        .certificates
        .issue_manual_certificate(&instructor, student.user_id, course.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let first = state
        .certificates
        .issue_manual_certificate(&admin, student.user_id, course.id)
        .await
        .unwrap();
    assert!(first.code.starts_with("MANUAL-"));
    assert!(is_well_formed_code(&first.code));

    let second = state
        .certificates
        .issue_manual_certificate(&admin, student.user_id, course.id)
        .await
        .unwrap();
    assert_eq!(second.id, first.id);

    let err = state
        .certificates
        .issue_manual_certificate(&admin, student.user_id, 999)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = state
        .certificates
        .issue_manual_certificate(&admin, 999, course.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn manual_issue_returns_earned_certificate() {
    let state = setup_state().await;
    let admin = create_user(&state.pool, "admin", Role::Admin).await;
    let instructor = create_user(&state.pool, "instructor", Role::Instructor).await;
    let student = create_user(&state.pool, "learner", Role::Student).await;
    let (course, topics) = course_with_topics(&state, &instructor, "Bridges", 1, 0).await;

    let earned = state
        .progress
        .complete_topic(student.user_id, topics[0].id)
        .await
        .unwrap()
        .certificate
        .unwrap();

    let manual = state
        .certificates
        .issue_manual_certificate(&admin, student.user_id, course.id)
        .await
        .unwrap();
    assert_eq!(manual.id, earned.id);
    assert!(manual.code.starts_with("LUMINA-"));
}

#[tokio::test]
async fn codes_are_unique_across_issuances() {
    let state = setup_state().await;
    let admin = create_user(&state.pool, "admin", Role::Admin).await;
    let instructor = create_user(&state.pool, "instructor", Role::Instructor).await;

    let mut codes = HashSet::new();
    for i in 0..4 {
        let student = create_user(&state.pool, &format!("learner{}", i), Role::Student).await;
        for j in 0..5 {
            let (course, _) =
                course_with_topics(&state, &instructor, &format!("Course {}-{}", i, j), 1, 0).await;
            let certificate = state
                .certificates
                .issue_manual_certificate(&admin, student.user_id, course.id)
                .await
                .unwrap();
            codes.insert(certificate.code);
        }
    }

    assert_eq!(codes.len(), 20);
}

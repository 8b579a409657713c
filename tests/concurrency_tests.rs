// tests/concurrency_tests.rs

mod common;

use common::{
    correct_option, create_user, remove_database, setup_file_state, single_choice_quiz,
};
use lumina::{
    error::ErrorKind,
    models::{
        attempt::{AnswerInput, AttemptStatus, SubmitAttemptRequest},
        quiz::QuizDetail,
        user::Role,
    },
};

fn all_correct(quiz: &QuizDetail) -> Vec<AnswerInput> {
    quiz.questions
        .iter()
        .enumerate()
        .map(|(i, q)| AnswerInput {
            question_id: q.question.id,
            selected_option_id: Some(correct_option(quiz, i)),
            text_answer: None,
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_submits_score_once_and_losers_see_closed_attempt() {
    let (state, path) = setup_file_state().await;
    let instructor = create_user(&state.pool, "instructor", Role::Instructor).await;
    let student = create_user(&state.pool, "learner", Role::Student).await;

    let quiz = state
        .quizzes
        .create_quiz(&instructor, single_choice_quiz(2, 50, None))
        .await
        .unwrap();
    let answers = all_correct(&quiz);

    for _ in 0..10 {
        let attempt_id = state
            .attempts
            .start(student.user_id, quiz.quiz.id)
            .await
            .unwrap()
            .attempt
            .id;

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let attempts = state.attempts.clone();
                let req = SubmitAttemptRequest {
                    answers: answers.clone(),
                };
                let user_id = student.user_id;
                tokio::spawn(async move { attempts.submit(user_id, attempt_id, req).await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(result) => {
                    winners += 1;
                    assert_eq!(result.attempt.score, Some(100));
                    assert_eq!(result.attempt.status, AttemptStatus::Completed);
                }
                Err(err) => {
                    assert_eq!(err.kind(), ErrorKind::InvalidState, "unexpected error: {}", err);
                }
            }
        }
        assert_eq!(winners, 1);

        let responses = state
            .answers
            .responses_for(student.user_id, attempt_id)
            .await
            .unwrap();
        assert_eq!(responses.len(), 2);
    }

    remove_database(state, path).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn answers_racing_a_submit_are_saved_or_refused() {
    let (state, path) = setup_file_state().await;
    let instructor = create_user(&state.pool, "instructor", Role::Instructor).await;
    let student = create_user(&state.pool, "learner", Role::Student).await;

    let quiz = state
        .quizzes
        .create_quiz(&instructor, single_choice_quiz(3, 50, None))
        .await
        .unwrap();
    let answers = all_correct(&quiz);

    let attempt_id = state
        .attempts
        .start(student.user_id, quiz.quiz.id)
        .await
        .unwrap()
        .attempt
        .id;
    let user_id = student.user_id;

    let saves: Vec<_> = answers
        .iter()
        .cloned()
        .map(|answer| {
            let store = state.answers.clone();
            tokio::spawn(async move { store.save_answer(user_id, attempt_id, answer).await })
        })
        .collect();

    let attempts = state.attempts.clone();
    let submit = tokio::spawn(async move {
        attempts
            .submit(user_id, attempt_id, SubmitAttemptRequest::default())
            .await
    });

    for handle in saves {
        if let Err(err) = handle.await.unwrap() {
            assert_eq!(err.kind(), ErrorKind::InvalidState, "unexpected error: {}", err);
        }
    }

    let result = submit.await.unwrap().unwrap();
    assert_eq!(result.attempt.status, AttemptStatus::Completed);

    // Whatever landed before the submit is what got scored.
    let saved = state
        .answers
        .responses_for(user_id, attempt_id)
        .await
        .unwrap()
        .len();
    assert_eq!(result.correct_count, saved);

    remove_database(state, path).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_starts_respect_the_ceiling() {
    let (state, path) = setup_file_state().await;
    let instructor = create_user(&state.pool, "instructor", Role::Instructor).await;
    let student = create_user(&state.pool, "learner", Role::Student).await;

    let quiz = state
        .quizzes
        .create_quiz(&instructor, single_choice_quiz(1, 50, Some(2)))
        .await
        .unwrap();
    let quiz_id = quiz.quiz.id;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let attempts = state.attempts.clone();
            let user_id = student.user_id;
            tokio::spawn(async move { attempts.start(user_id, quiz_id).await })
        })
        .collect();

    let mut started = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => started += 1,
            Err(err) => {
                assert_eq!(err.kind(), ErrorKind::InvalidState, "unexpected error: {}", err);
            }
        }
    }
    assert_eq!(started, 2);

    let rows = state
        .attempts
        .list_attempts(student.user_id, quiz_id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    remove_database(state, path).await;
}

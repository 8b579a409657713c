// src/services/grading.rs

use std::collections::HashMap;

use serde::Serialize;

use crate::models::quiz::{QuestionType, QuestionWithOptions};

/// Result of auto-grading one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GradeReport {
    pub correct_count: usize,
    pub total_questions: usize,

    /// Percentage, rounded half up.
    pub score: i64,

    pub passed: bool,

    /// The quiz contains essay questions that need a human reviewer.
    pub needs_review: bool,
}

/// Rounds `correct / total * 100` half up using integer arithmetic.
/// Zero questions score zero.
pub fn percentage(correct: usize, total: usize) -> i64 {
    if total == 0 {
        return 0;
    }
    ((correct * 200 + total) / (total * 2)) as i64
}

/// Grades a submission against the answer key.
///
/// `answers` maps question id to the selected option id. A question counts as
/// correct iff it has a correct option (the first one flagged, in position
/// order) and the selected option is that option. Unanswered questions and
/// essays count as incorrect. Every question weighs the same regardless of
/// its `points`.
pub fn grade(
    questions: &[QuestionWithOptions],
    answers: &HashMap<i64, i64>,
    passing_score: i64,
) -> GradeReport {
    let total_questions = questions.len();

    let correct_count = questions
        .iter()
        .filter(|q| {
            let selected = answers.get(&q.question.id);
            let correct = q.options.iter().find(|o| o.is_correct).map(|o| o.id);
            matches!((selected, correct), (Some(s), Some(c)) if *s == c)
        })
        .count();

    let needs_review = questions
        .iter()
        .any(|q| q.question.question_type == QuestionType::Essay);

    let score = percentage(correct_count, total_questions);

    GradeReport {
        correct_count,
        total_questions,
        score,
        passed: score >= passing_score,
        needs_review,
    }
}

// src/services/mod.rs

pub mod achievements;
pub mod answers;
pub mod attempts;
pub mod certificates;
pub mod grading;
pub mod progress;
pub mod quizzes;

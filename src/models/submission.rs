// src/models/submission.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'submissions' table.
/// The final, immutable graded record for one (assessment, student) pair.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Submission {
    pub id: i64,
    pub assessment_id: i64,
    pub student_id: i64,
    pub score: i64,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'answer_records' table.
/// One row per question of the assessment, answered or not.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnswerRecord {
    pub id: i64,
    pub submission_id: i64,
    pub question_id: i64,
    /// NULL means the question was left unanswered.
    pub choice_id: Option<i64>,
    pub is_correct: bool,
}

/// DTO for submitting answers. May be empty or a subset of the
/// assessment's questions.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitRequest {
    #[validate(nested)]
    pub answers: Vec<AnswerInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AnswerInput {
    #[validate(range(min = 1))]
    pub question_id: i64,
    pub choice_id: Option<i64>,
}

/// DTO returned after grading.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub submission_id: i64,
    pub score: i64,
    pub total_questions: i64,
    pub percentage: f64,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// Per-question breakdown for the post-submission review page.
#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub submission_id: i64,
    pub assessment_id: i64,
    pub title: String,
    pub score: i64,
    pub total_questions: i64,
    pub percentage: f64,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    pub questions: Vec<QuestionReview>,
}

#[derive(Debug, Serialize)]
pub struct QuestionReview {
    pub question_id: i64,
    pub text: String,
    pub selected_choice_id: Option<i64>,
    pub is_correct: bool,
    pub choices: Vec<ChoiceReview>,
}

/// Correctness is revealed here only because a submission already exists.
#[derive(Debug, Serialize)]
pub struct ChoiceReview {
    pub id: i64,
    pub text: String,
    pub is_correct: bool,
    pub selected: bool,
}

// src/handlers/submission.rs

use std::collections::{HashMap, HashSet};

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    catalog,
    error::{AppError, is_unique_violation},
    models::{
        assessment::AssessmentDefinition,
        submission::{
            AnswerInput, AnswerRecord, ChoiceReview, QuestionReview, ReviewResponse, SubmitRequest,
            SubmitResponse, Submission,
        },
    },
    utils::jwt::Claims,
};

/// One graded answer, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
struct GradedAnswer {
    question_id: i64,
    choice_id: Option<i64>,
    is_correct: bool,
}

/// Grades a submitted answer set against the definition's answer key.
///
/// Every question of the assessment yields a record, answered or not;
/// an unanswered question grades as incorrect with a NULL choice. The
/// caller's payload is rejected (`InvalidAnswer`) if it references a
/// question outside the assessment, a choice outside its question, or
/// the same question twice. Correctness comes only from the catalog,
/// never from the client.
fn grade_answers(
    definition: &AssessmentDefinition,
    submitted: &[AnswerInput],
) -> Result<(i64, Vec<GradedAnswer>), AppError> {
    let known: HashMap<i64, &crate::models::assessment::Question> =
        definition.questions().map(|q| (q.id, q)).collect();

    let mut seen: HashSet<i64> = HashSet::new();
    let mut chosen: HashMap<i64, i64> = HashMap::new();

    for answer in submitted {
        let Some(question) = known.get(&answer.question_id) else {
            return Err(AppError::InvalidAnswer(format!(
                "Question {} does not belong to this assessment",
                answer.question_id
            )));
        };

        if !seen.insert(answer.question_id) {
            return Err(AppError::InvalidAnswer(format!(
                "Duplicate answer for question {}",
                answer.question_id
            )));
        }

        if let Some(choice_id) = answer.choice_id {
            if !question.choices.iter().any(|c| c.id == choice_id) {
                return Err(AppError::InvalidAnswer(format!(
                    "Choice {} does not belong to question {}",
                    choice_id, answer.question_id
                )));
            }
            chosen.insert(answer.question_id, choice_id);
        }
    }

    let mut score = 0i64;
    let mut records = Vec::with_capacity(known.len());
    for question in definition.questions() {
        let choice_id = chosen.get(&question.id).copied();
        let is_correct = match (choice_id, question.correct_choice_id()) {
            (Some(chosen_id), Some(correct_id)) => chosen_id == correct_id,
            _ => false,
        };
        if is_correct {
            score += 1;
        }
        records.push(GradedAnswer {
            question_id: question.id,
            choice_id,
            is_correct,
        });
    }

    Ok((score, records))
}

/// Score as a percentage, rounded to two decimals.
fn percentage(score: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (score as f64 / total as f64 * 10_000.0).round() / 100.0
}

pub(crate) async fn fetch_submission(
    pool: &PgPool,
    assessment_id: i64,
    student_id: i64,
) -> Result<Option<Submission>, AppError> {
    Ok(sqlx::query_as::<_, Submission>(
        "SELECT id, assessment_id, student_id, score, submitted_at
         FROM submissions WHERE assessment_id = $1 AND student_id = $2",
    )
    .bind(assessment_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await?)
}

/// Submits answers for grading (POST /assessments/{id}/submit).
///
/// Grading happens in memory, then one transaction inserts the
/// submission row and one answer record per question. The unique
/// constraint on (assessment_id, student_id) is the only authority on
/// "already submitted"; a losing racer fails on the insert and gets
/// `AlreadySubmitted`, never a duplicate row. A late submission after
/// the timer ran out is still accepted and graded normally.
pub async fn submit(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<i64>,
    Json(payload): Json<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let student_id = claims.student_id()?;

    let definition = catalog::fetch_assessment(&pool, assessment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Assessment not found".to_string()))?;

    catalog::ensure_enrolled(&pool, definition.course_id, student_id).await?;

    let (score, records) = grade_answers(&definition, &payload.answers)?;
    let total_questions = records.len() as i64;

    let mut tx = pool.begin().await?;

    let submission = sqlx::query_as::<_, Submission>(
        "INSERT INTO submissions (assessment_id, student_id, score)
         VALUES ($1, $2, $3)
         RETURNING id, assessment_id, student_id, score, submitted_at",
    )
    .bind(assessment_id)
    .bind(student_id)
    .bind(score)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::AlreadySubmitted("You have already submitted this assessment".to_string())
        } else {
            tracing::error!("Failed to insert submission: {:?}", e);
            AppError::from(e)
        }
    })?;

    for record in &records {
        sqlx::query(
            "INSERT INTO answer_records (submission_id, question_id, choice_id, is_correct)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(submission.id)
        .bind(record.question_id)
        .bind(record.choice_id)
        .bind(record.is_correct)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            submission_id: submission.id,
            score,
            total_questions,
            percentage: percentage(score, total_questions),
            submitted_at: submission.submitted_at,
        }),
    ))
}

/// Fetches the graded review (GET /assessments/{id}/submission).
///
/// Pure projection over stored state: joins each persisted answer
/// record with the full choice set, in catalog order. Identical stored
/// state always yields identical output.
pub async fn get_review(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.student_id()?;

    let definition = catalog::fetch_assessment(&pool, assessment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Assessment not found".to_string()))?;

    catalog::ensure_enrolled(&pool, definition.course_id, student_id).await?;

    let submission = fetch_submission(&pool, assessment_id, student_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))?;

    let answer_rows = sqlx::query_as::<_, AnswerRecord>(
        "SELECT id, submission_id, question_id, choice_id, is_correct
         FROM answer_records WHERE submission_id = $1",
    )
    .bind(submission.id)
    .fetch_all(&pool)
    .await?;

    let by_question: HashMap<i64, &AnswerRecord> =
        answer_rows.iter().map(|r| (r.question_id, r)).collect();

    let questions: Vec<QuestionReview> = definition
        .questions()
        .map(|question| {
            let record = by_question.get(&question.id);
            let selected = record.and_then(|r| r.choice_id);
            QuestionReview {
                question_id: question.id,
                text: question.text.clone(),
                selected_choice_id: selected,
                is_correct: record.map(|r| r.is_correct).unwrap_or(false),
                choices: question
                    .choices
                    .iter()
                    .map(|c| ChoiceReview {
                        id: c.id,
                        text: c.text.clone(),
                        is_correct: c.is_correct,
                        selected: selected == Some(c.id),
                    })
                    .collect(),
            }
        })
        .collect();

    let total_questions = definition.question_count() as i64;

    Ok(Json(ReviewResponse {
        submission_id: submission.id,
        assessment_id,
        title: definition.title,
        score: submission.score,
        total_questions,
        percentage: percentage(submission.score, total_questions),
        submitted_at: submission.submitted_at,
        questions,
    }))
}

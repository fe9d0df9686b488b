// src/catalog.rs
//
// Read-only adapters over the catalog tables. Authoring happens in a
// separate service; this side only ever SELECTs.

use std::collections::HashMap;

use sqlx::PgPool;

use crate::{
    error::AppError,
    models::assessment::{AssessmentDefinition, AssessmentKind, Choice, Passage, Question},
};

#[derive(sqlx::FromRow)]
struct AssessmentRow {
    id: i64,
    course_id: i64,
    title: String,
    instructions: String,
    duration_minutes: Option<i64>,
}

#[derive(sqlx::FromRow)]
struct PassageRow {
    id: i64,
    title: String,
    content: String,
    image_url: Option<String>,
    position: i64,
}

#[derive(sqlx::FromRow)]
struct QuestionRow {
    id: i64,
    passage_id: i64,
    text: String,
    position: i64,
}

#[derive(sqlx::FromRow)]
struct ChoiceRow {
    id: i64,
    question_id: i64,
    text: String,
    is_correct: bool,
    position: i64,
}

/// Fetches a full assessment definition: ordered passages, their
/// questions and the four choices per question, correctness included.
/// Returns `Ok(None)` if the assessment does not exist.
pub async fn fetch_assessment(
    pool: &PgPool,
    assessment_id: i64,
) -> Result<Option<AssessmentDefinition>, AppError> {
    let Some(assessment) = sqlx::query_as::<_, AssessmentRow>(
        "SELECT id, course_id, title, instructions, duration_minutes
         FROM assessments WHERE id = $1",
    )
    .bind(assessment_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch assessment {}: {:?}", assessment_id, e);
        AppError::from(e)
    })?
    else {
        return Ok(None);
    };

    let passage_rows = sqlx::query_as::<_, PassageRow>(
        "SELECT id, title, content, image_url, position
         FROM passages WHERE assessment_id = $1
         ORDER BY position, id",
    )
    .bind(assessment_id)
    .fetch_all(pool)
    .await?;

    let question_rows = sqlx::query_as::<_, QuestionRow>(
        "SELECT q.id, q.passage_id, q.text, q.position
         FROM questions q
         JOIN passages p ON q.passage_id = p.id
         WHERE p.assessment_id = $1
         ORDER BY q.position, q.id",
    )
    .bind(assessment_id)
    .fetch_all(pool)
    .await?;

    let choice_rows = sqlx::query_as::<_, ChoiceRow>(
        "SELECT c.id, c.question_id, c.text, c.is_correct, c.position
         FROM choices c
         JOIN questions q ON c.question_id = q.id
         JOIN passages p ON q.passage_id = p.id
         WHERE p.assessment_id = $1
         ORDER BY c.position, c.id",
    )
    .bind(assessment_id)
    .fetch_all(pool)
    .await?;

    // Assemble the nested shape, preserving the ORDER BY of each query.
    let mut choices_by_question: HashMap<i64, Vec<Choice>> = HashMap::new();
    for row in choice_rows {
        choices_by_question
            .entry(row.question_id)
            .or_default()
            .push(Choice {
                id: row.id,
                text: row.text,
                is_correct: row.is_correct,
                position: row.position,
            });
    }

    let mut questions_by_passage: HashMap<i64, Vec<Question>> = HashMap::new();
    for row in question_rows {
        questions_by_passage
            .entry(row.passage_id)
            .or_default()
            .push(Question {
                id: row.id,
                text: row.text,
                position: row.position,
                choices: choices_by_question.remove(&row.id).unwrap_or_default(),
            });
    }

    let passages = passage_rows
        .into_iter()
        .map(|row| Passage {
            id: row.id,
            title: row.title,
            content: row.content,
            image_url: row.image_url,
            position: row.position,
            questions: questions_by_passage.remove(&row.id).unwrap_or_default(),
        })
        .collect();

    Ok(Some(AssessmentDefinition {
        id: assessment.id,
        course_id: assessment.course_id,
        title: assessment.title,
        instructions: assessment.instructions,
        kind: AssessmentKind::from_duration(assessment.duration_minutes),
        passages,
    }))
}

/// Enrollment collaborator check: the student must be enrolled in the
/// course owning the assessment.
pub async fn ensure_enrolled(
    pool: &PgPool,
    course_id: i64,
    student_id: i64,
) -> Result<(), AppError> {
    let enrolled = sqlx::query(
        "SELECT 1 FROM enrollments WHERE course_id = $1 AND student_id = $2",
    )
    .bind(course_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    if enrolled.is_none() {
        return Err(AppError::Forbidden(
            "You are not enrolled in this course".to_string(),
        ));
    }

    Ok(())
}

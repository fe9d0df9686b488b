// src/models/assessment.rs

use serde::Serialize;

/// Assessment kind, derived from the nullable `duration_minutes` column.
///
/// Timed tests and untimed homework share a single code path; the
/// variant only matters where attempt markers and remaining time are
/// involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssessmentKind {
    Timed { duration_minutes: i64 },
    Untimed,
}

impl AssessmentKind {
    pub fn from_duration(duration_minutes: Option<i64>) -> Self {
        match duration_minutes {
            Some(minutes) => AssessmentKind::Timed {
                duration_minutes: minutes,
            },
            None => AssessmentKind::Untimed,
        }
    }

    pub fn duration_minutes(&self) -> Option<i64> {
        match self {
            AssessmentKind::Timed { duration_minutes } => Some(*duration_minutes),
            AssessmentKind::Untimed => None,
        }
    }

    pub fn is_timed(&self) -> bool {
        matches!(self, AssessmentKind::Timed { .. })
    }
}

/// Full assessment definition as authored, including correctness data.
///
/// This shape never leaves the server before a submission exists;
/// clients get [`AssessmentView`] instead.
#[derive(Debug, Clone)]
pub struct AssessmentDefinition {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub instructions: String,
    pub kind: AssessmentKind,
    pub passages: Vec<Passage>,
}

#[derive(Debug, Clone)]
pub struct Passage {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub position: i64,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone)]
pub struct Question {
    pub id: i64,
    pub text: String,
    pub position: i64,
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone)]
pub struct Choice {
    pub id: i64,
    pub text: String,
    pub is_correct: bool,
    pub position: i64,
}

impl Question {
    /// The unique correct choice for this question. Authoring guarantees
    /// exactly one; a missing one would be a corrupt catalog row.
    pub fn correct_choice_id(&self) -> Option<i64> {
        self.choices.iter().find(|c| c.is_correct).map(|c| c.id)
    }
}

impl AssessmentDefinition {
    /// All questions in catalog order (passage position, then question
    /// position).
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.passages.iter().flat_map(|p| p.questions.iter())
    }

    pub fn question_count(&self) -> usize {
        self.passages.iter().map(|p| p.questions.len()).sum()
    }

    /// Client-facing copy with every `is_correct` flag stripped.
    pub fn sanitized(&self) -> AssessmentView {
        AssessmentView {
            id: self.id,
            title: self.title.clone(),
            instructions: self.instructions.clone(),
            kind: self.kind,
            passages: self
                .passages
                .iter()
                .map(|p| PassageView {
                    id: p.id,
                    title: p.title.clone(),
                    content: p.content.clone(),
                    image_url: p.image_url.clone(),
                    questions: p
                        .questions
                        .iter()
                        .map(|q| QuestionView {
                            id: q.id,
                            text: q.text.clone(),
                            choices: q
                                .choices
                                .iter()
                                .map(|c| ChoiceView {
                                    id: c.id,
                                    text: c.text.clone(),
                                })
                                .collect(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// DTO for sending an assessment to a student before submission.
/// Deliberately has no `is_correct` anywhere.
#[derive(Debug, Serialize)]
pub struct AssessmentView {
    pub id: i64,
    pub title: String,
    pub instructions: String,
    #[serde(flatten)]
    pub kind: AssessmentKind,
    pub passages: Vec<PassageView>,
}

#[derive(Debug, Serialize)]
pub struct PassageView {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub id: i64,
    pub text: String,
    pub choices: Vec<ChoiceView>,
}

#[derive(Debug, Serialize)]
pub struct ChoiceView {
    pub id: i64,
    pub text: String,
}

// src/models/attempt.rs

use serde::Serialize;
use sqlx::FromRow;

/// Represents the 'attempt_markers' table.
///
/// Created once when a student starts a timed assessment, never
/// updated. Its existence means "in progress" until a submission
/// supersedes it.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AttemptMarker {
    pub assessment_id: i64,
    pub student_id: i64,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// Derived status of one (assessment, student) pair.
///
/// Computed on every read from the catalog duration, the attempt
/// marker and the submission; nothing here is stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptStatus {
    NotStarted {
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_minutes: Option<i64>,
    },
    InProgress {
        remaining_ms: i64,
        time_expired: bool,
    },
    Submitted {
        submission_id: i64,
        score: i64,
        submitted_at: chrono::DateTime<chrono::Utc>,
    },
}

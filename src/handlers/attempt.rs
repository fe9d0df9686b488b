// src/handlers/attempt.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{
    catalog,
    error::{AppError, is_unique_violation},
    handlers::submission::fetch_submission,
    models::{
        assessment::AssessmentKind,
        attempt::{AttemptMarker, AttemptStatus},
        submission::Submission,
    },
    utils::jwt::Claims,
};

/// Derives the attempt status for one (assessment, student) pair.
///
/// Pure function: remaining time is recomputed from the persisted start
/// timestamp on every call, so the service holds no timers and survives
/// restarts mid-attempt. A submission is terminal and wins over any
/// marker. Expiry is an observation, not a transition: an expired
/// attempt stays `in_progress` until an explicit submit.
fn resolve_status(
    kind: AssessmentKind,
    marker: Option<&AttemptMarker>,
    submission: Option<&Submission>,
    now: DateTime<Utc>,
) -> AttemptStatus {
    if let Some(sub) = submission {
        return AttemptStatus::Submitted {
            submission_id: sub.id,
            score: sub.score,
            submitted_at: sub.submitted_at,
        };
    }

    match (kind, marker) {
        (AssessmentKind::Untimed, _) => AttemptStatus::NotStarted {
            duration_minutes: None,
        },
        (AssessmentKind::Timed { duration_minutes }, None) => AttemptStatus::NotStarted {
            duration_minutes: Some(duration_minutes),
        },
        (AssessmentKind::Timed { duration_minutes }, Some(marker)) => {
            let elapsed_ms = now.signed_duration_since(marker.started_at).num_milliseconds();
            let remaining_ms = duration_minutes * 60_000 - elapsed_ms;
            if remaining_ms <= 0 {
                AttemptStatus::InProgress {
                    remaining_ms: 0,
                    time_expired: true,
                }
            } else {
                AttemptStatus::InProgress {
                    remaining_ms,
                    time_expired: false,
                }
            }
        }
    }
}

async fn fetch_marker(
    pool: &PgPool,
    assessment_id: i64,
    student_id: i64,
) -> Result<Option<AttemptMarker>, AppError> {
    Ok(sqlx::query_as::<_, AttemptMarker>(
        "SELECT assessment_id, student_id, started_at
         FROM attempt_markers WHERE assessment_id = $1 AND student_id = $2",
    )
    .bind(assessment_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await?)
}

/// Starts an attempt (POST /assessments/{id}/attempt).
///
/// Untimed homework: no marker is created; the call idempotently
/// returns the sanitized definition unless a submission already exists.
/// Timed test: a single guarded INSERT creates the attempt marker; the
/// primary key on (assessment_id, student_id) decides who wins a race,
/// surfaced as `AlreadyStarted` for the losers. No check-then-act.
pub async fn start_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.student_id()?;

    let definition = catalog::fetch_assessment(&pool, assessment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Assessment not found".to_string()))?;

    catalog::ensure_enrolled(&pool, definition.course_id, student_id).await?;

    if fetch_submission(&pool, assessment_id, student_id)
        .await?
        .is_some()
    {
        return Err(AppError::AlreadySubmitted(
            "You have already submitted this assessment".to_string(),
        ));
    }

    let started_at = match definition.kind {
        AssessmentKind::Untimed => None,
        AssessmentKind::Timed { .. } => {
            let marker = sqlx::query_as::<_, AttemptMarker>(
                "INSERT INTO attempt_markers (assessment_id, student_id)
                 VALUES ($1, $2)
                 RETURNING assessment_id, student_id, started_at",
            )
            .bind(assessment_id)
            .bind(student_id)
            .fetch_one(&pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::AlreadyStarted(
                        "You have already started this assessment".to_string(),
                    )
                } else {
                    tracing::error!("Failed to create attempt marker: {:?}", e);
                    AppError::from(e)
                }
            })?;
            Some(marker.started_at)
        }
    };

    Ok(Json(serde_json::json!({
        "message": "Assessment started",
        "started_at": started_at,
        "assessment": definition.sanitized(),
    })))
}

/// Polls attempt status (GET /assessments/{id}/attempt).
///
/// Read-only and side-effect-free; safe to poll arbitrarily often and
/// to race against start/submit.
pub async fn get_status(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.student_id()?;

    let definition = catalog::fetch_assessment(&pool, assessment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Assessment not found".to_string()))?;

    catalog::ensure_enrolled(&pool, definition.course_id, student_id).await?;

    let marker = if definition.kind.is_timed() {
        fetch_marker(&pool, assessment_id, student_id).await?
    } else {
        None
    };
    let submission = fetch_submission(&pool, assessment_id, student_id).await?;

    let status = resolve_status(
        definition.kind,
        marker.as_ref(),
        submission.as_ref(),
        Utc::now(),
    );

    Ok(Json(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn marker_at(started_at: DateTime<Utc>) -> AttemptMarker {
        AttemptMarker {
            assessment_id: 1,
            student_id: 7,
            started_at,
        }
    }

    fn submission_at(submitted_at: DateTime<Utc>) -> Submission {
        Submission {
            id: 42,
            assessment_id: 1,
            student_id: 7,
            score: 3,
            submitted_at,
        }
    }

    #[test]
    fn untimed_without_submission_is_not_started() {
        let status = resolve_status(AssessmentKind::Untimed, None, None, Utc::now());
        assert_eq!(
            status,
            AttemptStatus::NotStarted {
                duration_minutes: None
            }
        );
    }

    #[test]
    fn timed_without_marker_reports_duration() {
        let status = resolve_status(
            AssessmentKind::Timed {
                duration_minutes: 30,
            },
            None,
            None,
            Utc::now(),
        );
        assert_eq!(
            status,
            AttemptStatus::NotStarted {
                duration_minutes: Some(30)
            }
        );
    }

    #[test]
    fn timed_with_marker_counts_down() {
        let now = Utc::now();
        let marker = marker_at(now - Duration::minutes(10));
        let status = resolve_status(
            AssessmentKind::Timed {
                duration_minutes: 30,
            },
            Some(&marker),
            None,
            now,
        );
        assert_eq!(
            status,
            AttemptStatus::InProgress {
                remaining_ms: 20 * 60_000,
                time_expired: false,
            }
        );
    }

    #[test]
    fn remaining_time_is_monotonic() {
        let start = Utc::now();
        let marker = marker_at(start);
        let kind = AssessmentKind::Timed {
            duration_minutes: 10,
        };

        let at = |minutes: i64| match resolve_status(
            kind,
            Some(&marker),
            None,
            start + Duration::minutes(minutes),
        ) {
            AttemptStatus::InProgress { remaining_ms, .. } => remaining_ms,
            other => panic!("unexpected status: {:?}", other),
        };

        assert!(at(2) > at(5));
        assert!(at(5) > at(9));
    }

    #[test]
    fn expiry_is_observed_not_terminal() {
        let now = Utc::now();
        let marker = marker_at(now - Duration::minutes(11));
        let status = resolve_status(
            AssessmentKind::Timed {
                duration_minutes: 10,
            },
            Some(&marker),
            None,
            now,
        );
        assert_eq!(
            status,
            AttemptStatus::InProgress {
                remaining_ms: 0,
                time_expired: true,
            }
        );
    }

    #[test]
    fn expiry_boundary_is_expired_at_exactly_zero() {
        let now = Utc::now();
        let marker = marker_at(now - Duration::minutes(10));
        let status = resolve_status(
            AssessmentKind::Timed {
                duration_minutes: 10,
            },
            Some(&marker),
            None,
            now,
        );
        assert_eq!(
            status,
            AttemptStatus::InProgress {
                remaining_ms: 0,
                time_expired: true,
            }
        );
    }

    #[test]
    fn submission_is_terminal_even_with_marker() {
        let now = Utc::now();
        let marker = marker_at(now - Duration::minutes(5));
        let submission = submission_at(now - Duration::minutes(1));
        let status = resolve_status(
            AssessmentKind::Timed {
                duration_minutes: 30,
            },
            Some(&marker),
            Some(&submission),
            now,
        );
        assert_eq!(
            status,
            AttemptStatus::Submitted {
                submission_id: 42,
                score: 3,
                submitted_at: submission.submitted_at,
            }
        );
    }
}

use crate::config::{GradingConfig, OutcomeGate};
use crate::error::GradeError;
use crate::grading::{GradeSubmission, GradeWeights, ScoreEntry, ScoreType};
use crate::outcomes;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EnrollmentRow {
    pub id: String,
    pub status: String,
    pub completed: bool,
}

/// Entities a submission was validated against.
#[derive(Debug, Clone)]
pub struct GradingContext {
    pub student_id: String,
    pub subject_id: String,
    pub subject_credit: i64,
    pub enrollment: EnrollmentRow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradeOutcome {
    pub enrollment_id: String,
    pub scored_types: Vec<ScoreType>,
    pub completed: bool,
    pub final_grade: Option<f64>,
    pub credit_awarded: i64,
    pub outcomes_updated: usize,
}

/// Validates, records and aggregates one submission inside a single
/// immediate transaction. Nothing is written unless every step succeeds.
pub fn grade_score(
    conn: &Connection,
    config: &GradingConfig,
    submission: &GradeSubmission,
) -> Result<GradeOutcome, GradeError> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let ctx = resolve_context(&tx, submission)?;
    let outcome =
        apply_grades(&tx, config, &ctx, submission).map_err(GradeError::grading_failed)?;

    tx.commit()
        .map_err(|e| GradeError::grading_failed(GradeError::Db(e)))?;
    Ok(outcome)
}

pub fn resolve_context(
    conn: &Connection,
    submission: &GradeSubmission,
) -> Result<GradingContext, GradeError> {
    let student_status: Option<String> = conn
        .query_row(
            "SELECT status FROM students WHERE id = ?",
            [&submission.student_id],
            |r| r.get(0),
        )
        .optional()?;
    if student_status.as_deref() != Some("active") {
        return Err(GradeError::NotFoundOrInactive(
            "student not found or inactive".to_string(),
        ));
    }

    let course: Option<(i64, Option<String>, String)> = conn
        .query_row(
            "SELECT active, teacher_id, subject_id FROM courses WHERE id = ?",
            [&submission.course_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    let Some((_, course_teacher, subject_id)) = course.filter(|c| c.0 != 0) else {
        return Err(GradeError::NotFoundOrInactive(
            "course not found or inactive".to_string(),
        ));
    };

    let teacher_status: Option<String> = conn
        .query_row(
            "SELECT status FROM teachers WHERE id = ?",
            [&submission.teacher_id],
            |r| r.get(0),
        )
        .optional()?;
    if teacher_status.as_deref() != Some("active") {
        return Err(GradeError::NotFoundOrInactive(
            "teacher not found or inactive".to_string(),
        ));
    }

    if course_teacher.as_deref() != Some(submission.teacher_id.as_str()) {
        return Err(GradeError::Unauthorized(
            "teacher is not assigned to this course".to_string(),
        ));
    }

    let subject: Option<(i64, i64)> = conn
        .query_row(
            "SELECT active, credit FROM subjects WHERE id = ?",
            [&subject_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    let Some((_, subject_credit)) = subject.filter(|s| s.0 != 0) else {
        return Err(GradeError::NotFoundOrInactive(
            "subject not found or inactive".to_string(),
        ));
    };

    let enrollment = conn
        .query_row(
            "SELECT id, status, completed FROM enrollments
             WHERE student_id = ? AND course_id = ? AND status = 'enrolled'",
            (&submission.student_id, &submission.course_id),
            |r| {
                Ok(EnrollmentRow {
                    id: r.get(0)?,
                    status: r.get(1)?,
                    completed: r.get::<_, i64>(2)? != 0,
                })
            },
        )
        .optional()?
        .ok_or_else(|| {
            GradeError::NotFoundOrInactive(
                "enrollment not found or student has completed the course".to_string(),
            )
        })?;

    Ok(GradingContext {
        student_id: submission.student_id.clone(),
        subject_id,
        subject_credit,
        enrollment,
    })
}

pub fn upsert_score(
    conn: &Connection,
    enrollment_id: &str,
    entry: &ScoreEntry,
    teacher_id: &str,
    updated_at: &str,
) -> Result<(), GradeError> {
    let score_id = Uuid::new_v4().to_string();
    // teacher_id records who first entered the component; updates keep it.
    conn.execute(
        "INSERT INTO scores(id, enrollment_id, score_type, score, teacher_id, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(enrollment_id, score_type) DO UPDATE SET
           score = excluded.score,
           updated_at = excluded.updated_at",
        (
            &score_id,
            enrollment_id,
            entry.score_type.as_str(),
            entry.value,
            teacher_id,
            updated_at,
        ),
    )?;
    Ok(())
}

pub fn load_weights(conn: &Connection) -> Result<GradeWeights, GradeError> {
    let mut stmt = conn.prepare(
        "SELECT key, value FROM modifications WHERE key IN ('progress', 'midterm', 'final')",
    )?;
    let rows = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, f64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    GradeWeights::from_factors(rows)
}

pub fn load_component_scores(
    conn: &Connection,
    enrollment_id: &str,
) -> Result<Vec<(ScoreType, f64)>, GradeError> {
    let mut stmt = conn.prepare(
        "SELECT score_type, score FROM scores
         WHERE enrollment_id = ? AND score_type IN ('progress', 'midterm', 'final')",
    )?;
    let rows = stmt
        .query_map([enrollment_id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, f64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    let mut out: Vec<(ScoreType, f64)> = rows
        .into_iter()
        .filter_map(|(t, v)| ScoreType::parse(&t).map(|t| (t, v)))
        .collect();
    out.sort_by_key(|(t, _)| *t);
    Ok(out)
}

fn apply_grades(
    conn: &Connection,
    config: &GradingConfig,
    ctx: &GradingContext,
    submission: &GradeSubmission,
) -> Result<GradeOutcome, GradeError> {
    let now = chrono::Utc::now().to_rfc3339();
    let enrollment_id = ctx.enrollment.id.as_str();

    for entry in &submission.entries {
        upsert_score(conn, enrollment_id, entry, &submission.teacher_id, &now)?;
    }

    let weights = load_weights(conn)?;
    let scores = load_component_scores(conn, enrollment_id)?;
    let scored_types: Vec<ScoreType> = scores.iter().map(|(t, _)| *t).collect();

    if scores.len() < ScoreType::ALL.len() {
        tracing::debug!(
            enrollment_id,
            scored = scores.len(),
            "partial grading recorded"
        );
        return Ok(GradeOutcome {
            enrollment_id: enrollment_id.to_string(),
            scored_types,
            completed: false,
            final_grade: None,
            credit_awarded: 0,
            outcomes_updated: 0,
        });
    }

    let final_grade = weights.final_grade(&scores);
    conn.execute(
        "UPDATE enrollments SET completed = 1, final_grade = ?, updated_at = ? WHERE id = ?",
        (final_grade, &now, enrollment_id),
    )?;

    let credit_awarded = if ctx.enrollment.completed {
        0
    } else {
        conn.execute(
            "UPDATE students SET credit = credit + ? WHERE id = ?",
            (ctx.subject_credit, &ctx.student_id),
        )?;
        ctx.subject_credit
    };

    let gate_open = match config.outcome_gate {
        OutcomeGate::StatusPass => ctx.enrollment.status == "pass",
        OutcomeGate::Completed => true,
    };
    let outcomes_updated = if gate_open {
        outcomes::track_outcomes(conn, &ctx.subject_id, &ctx.student_id)?
    } else {
        0
    };

    tracing::info!(
        enrollment_id,
        final_grade,
        credit_awarded,
        outcomes_updated,
        "enrollment completed"
    );

    Ok(GradeOutcome {
        enrollment_id: enrollment_id.to_string(),
        scored_types,
        completed: true,
        final_grade: Some(final_grade),
        credit_awarded,
        outcomes_updated,
    })
}

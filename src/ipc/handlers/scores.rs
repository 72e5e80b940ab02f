use crate::config::GradingConfig;
use crate::error::GradeError;
use crate::grading::{self, id_param};
use crate::ipc::error::{no_workspace, ok};
use crate::ipc::types::{AppState, Request};
use crate::{ledger, queries};
use rusqlite::Connection;
use serde_json::json;

const GRADED_MESSAGE: &str = "Grade student's score successfully";

fn required_student_id(params: &serde_json::Value) -> Result<String, GradeError> {
    id_param(params, "studentId")
        .ok_or_else(|| GradeError::InvalidInput("missing student ID".to_string()))
}

fn scores_grade(
    conn: &Connection,
    config: &GradingConfig,
    params: &serde_json::Value,
) -> Result<serde_json::Value, GradeError> {
    let submission = grading::parse_submission(params, config.reject_duplicate_score_types)?;
    let outcome = ledger::grade_score(conn, config, &submission)?;
    Ok(json!({
        "message": GRADED_MESSAGE,
        "enrollmentId": outcome.enrollment_id,
        "scoredTypes": outcome.scored_types,
        "completed": outcome.completed,
        "finalGrade": outcome.final_grade,
        "creditAwarded": outcome.credit_awarded,
        "outcomesUpdated": outcome.outcomes_updated,
    }))
}

fn handle_scores_grade(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    match scores_grade(conn, &state.config, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => {
            tracing::warn!(code = e.code(), "grading rejected: {e}");
            e.response(&req.id)
        }
    }
}

fn handle_scores_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let result = required_student_id(&req.params).and_then(|student_id| {
        let subject_id = id_param(&req.params, "subjectId");
        queries::get_score(conn, &student_id, subject_id.as_deref())
    });
    match result {
        Ok(enrollments) => ok(&req.id, json!({ "enrollments": enrollments })),
        Err(e) => e.response(&req.id),
    }
}

fn handle_scores_student_scores(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let result = required_student_id(&req.params).and_then(|student_id| {
        let course_id = id_param(&req.params, "courseId");
        queries::get_student_score(conn, &student_id, course_id.as_deref())
    });
    match result {
        Ok(rows) => ok(&req.id, json!({ "rows": rows })),
        Err(e) => e.response(&req.id),
    }
}

fn handle_scores_student_score_by_id(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let course_id = id_param(&req.params, "courseId");
    let result = required_student_id(&req.params).and_then(|student_id| {
        queries::get_student_score_by_id(conn, &student_id, course_id.as_deref())
    });
    match result {
        // With a course filter the caller wants one sheet, not a list.
        Ok(sheets) if course_id.is_some() => {
            ok(&req.id, json!({ "enrollment": sheets.into_iter().next() }))
        }
        Ok(sheets) => ok(&req.id, json!({ "enrollments": sheets })),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scores.grade" => Some(handle_scores_grade(state, req)),
        "scores.get" => Some(handle_scores_get(state, req)),
        "scores.studentScores" => Some(handle_scores_student_scores(state, req)),
        "scores.studentScoreById" => Some(handle_scores_student_score_by_id(state, req)),
        _ => None,
    }
}

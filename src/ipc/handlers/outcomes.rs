use crate::grading::id_param;
use crate::ipc::error::{err, no_workspace, ok};
use crate::ipc::types::{AppState, Request};
use crate::outcomes;
use serde_json::json;

fn handle_outcomes_levels(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let Some(student_id) = id_param(&req.params, "studentId") else {
        return err(&req.id, "invalid_input", "missing student ID", None);
    };
    match outcomes::outcome_levels(conn, &student_id) {
        Ok(levels) => ok(&req.id, json!({ "outcomes": levels })),
        Err(e) => e.response(&req.id),
    }
}

fn handle_outcomes_averages(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let Some(student_id) = id_param(&req.params, "studentId") else {
        return err(&req.id, "invalid_input", "missing student ID", None);
    };
    match outcomes::outcome_averages(conn, &student_id) {
        Ok(averages) => ok(&req.id, json!({ "averages": averages })),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "outcomes.levels" => Some(handle_outcomes_levels(state, req)),
        "outcomes.averages" => Some(handle_outcomes_averages(state, req)),
        _ => None,
    }
}

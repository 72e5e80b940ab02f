use crate::config::{GradingConfig, OutcomeGate};
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::{Path, PathBuf};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match db::open_db(&path) {
        Ok(conn) => {
            state.config = load_config(&path);
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            tracing::info!(workspace = %path.display(), "workspace opened");
            ok(
                &req.id,
                json!({
                    "workspacePath": path.to_string_lossy(),
                    "config": config_json(&state.config),
                }),
            )
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

/// A broken config file must not keep the workspace from opening.
fn load_config(workspace: &Path) -> GradingConfig {
    match GradingConfig::load(workspace) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("using default grading config: {e:#}");
            GradingConfig::default()
        }
    }
}

fn config_json(cfg: &GradingConfig) -> serde_json::Value {
    json!({
        "outcomeGate": match cfg.outcome_gate {
            OutcomeGate::StatusPass => "statusPass",
            OutcomeGate::Completed => "completed",
        },
        "rejectDuplicateScoreTypes": cfg.reject_duplicate_score_types,
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

pub const CONFIG_FILE: &str = "gradebookd.json";

/// When the outcome tracker runs after an enrollment completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeGate {
    /// Only when the enrollment row's status reads `pass`.
    #[default]
    StatusPass,
    /// Whenever the submission completes the enrollment.
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct GradingConfig {
    pub outcome_gate: OutcomeGate,
    pub reject_duplicate_score_types: bool,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            outcome_gate: OutcomeGate::StatusPass,
            reject_duplicate_score_types: true,
        }
    }
}

impl GradingConfig {
    /// Reads `gradebookd.json` from the workspace. A missing file means
    /// defaults.
    pub fn load(workspace: &Path) -> anyhow::Result<Self> {
        let path = workspace.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("invalid config {}", path.to_string_lossy()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg: GradingConfig = serde_json::from_str(r#"{ "outcomeGate": "completed" }"#).unwrap();
        assert_eq!(cfg.outcome_gate, OutcomeGate::Completed);
        assert!(cfg.reject_duplicate_score_types);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(serde_json::from_str::<GradingConfig>(r#"{ "outcomeGates": "completed" }"#).is_err());
    }

    #[test]
    fn missing_file_is_default() {
        let dir = std::env::temp_dir().join(format!("gradebookd-cfg-{}", uuid::Uuid::new_v4()));
        let cfg = GradingConfig::load(&dir).expect("load");
        assert_eq!(cfg, GradingConfig::default());
    }
}

//! Grade pipeline error taxonomy.
//!
//! Every variant maps onto a stable protocol code so callers can branch on
//! `error.code` without parsing messages.

use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GradeError {
    /// Missing or malformed request fields.
    #[error("{0}")]
    InvalidInput(String),

    /// A score outside the accepted bounds.
    #[error("{0}")]
    OutOfRange(String),

    /// An entity is missing, inactive, or not in the required state.
    #[error("{0}")]
    NotFoundOrInactive(String),

    /// The submitting teacher does not own the course.
    #[error("{0}")]
    Unauthorized(String),

    /// Required weight factors are absent or unusable.
    #[error("{0}")]
    ConfigMissing(String),

    /// A record the pipeline expects to exist is missing.
    #[error("{0}")]
    NotFound(String),

    /// Failure inside the ledger/aggregation/outcome block. The cause is kept.
    #[error("error grading score: {source}")]
    GradingFailed {
        #[source]
        source: Box<GradeError>,
    },

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

impl GradeError {
    pub fn grading_failed(source: GradeError) -> Self {
        match source {
            // Never double-wrap.
            e @ GradeError::GradingFailed { .. } => e,
            other => GradeError::GradingFailed {
                source: Box::new(other),
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GradeError::InvalidInput(_) => "invalid_input",
            GradeError::OutOfRange(_) => "out_of_range",
            GradeError::NotFoundOrInactive(_) => "not_found_or_inactive",
            GradeError::Unauthorized(_) => "unauthorized",
            GradeError::ConfigMissing(_) => "config_missing",
            GradeError::NotFound(_) => "not_found",
            GradeError::GradingFailed { .. } => "grading_failed",
            GradeError::Db(_) => "db_query_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            GradeError::GradingFailed { source } => Some(json!({
                "cause": {
                    "code": source.code(),
                    "message": source.to_string(),
                }
            })),
            _ => None,
        }
    }

    pub fn response(&self, id: &str) -> serde_json::Value {
        crate::ipc::error::err(id, self.code(), self.to_string(), self.details())
    }
}

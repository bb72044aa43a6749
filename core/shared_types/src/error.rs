use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The error taxonomy every component boundary converts into. Exceptions at
/// leaves are caught and mapped here; only the orchestrator turns this into
/// a user-visible message.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoreError {
    #[error("input invalid: {message}")]
    InputInvalid { message: String },

    #[error("intent unsupported: {message}")]
    IntentUnsupported { message: String },

    #[error("SQL invariant failed: {message}")]
    SqlInvariantFailed {
        message: String,
        suggested_fixes: Vec<String>,
    },

    #[error("SQL unsafe: {message}")]
    SqlUnsafe { message: String },

    #[error("SQL execution failed: {message}")]
    SqlExecutionFailed { message: String },

    #[error("modeling failed: {message}")]
    ModelingFailed { message: String },

    #[error("calculation overflow: {message}")]
    CalculationOverflow { message: String },

    #[error("upstream timeout after {elapsed_ms}ms: {message}")]
    UpstreamTimeout { message: String, elapsed_ms: u64 },

    #[error("internal error: {message}")]
    InternalError { message: String },
}

impl CoreError {
    pub fn stage_name(&self) -> &'static str {
        match self {
            CoreError::InputInvalid { .. } => "input_validation",
            CoreError::IntentUnsupported { .. } => "planner",
            CoreError::SqlInvariantFailed { .. } => "invariant_checker",
            CoreError::SqlUnsafe { .. } => "sanitizer",
            CoreError::SqlExecutionFailed { .. } => "sql_executor",
            CoreError::ModelingFailed { .. } => "modeling_engine",
            CoreError::CalculationOverflow { .. } => "modeling_engine",
            CoreError::UpstreamTimeout { .. } => "upstream",
            CoreError::InternalError { .. } => "internal",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            CoreError::InputInvalid { message }
            | CoreError::IntentUnsupported { message }
            | CoreError::SqlInvariantFailed { message, .. }
            | CoreError::SqlUnsafe { message }
            | CoreError::SqlExecutionFailed { message }
            | CoreError::ModelingFailed { message }
            | CoreError::CalculationOverflow { message }
            | CoreError::UpstreamTimeout { message, .. }
            | CoreError::InternalError { message } => message,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CoreError::InternalError {
            message: message.into(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_name_maps_invariant_failure_to_invariant_checker() {
        let err = CoreError::SqlInvariantFailed {
            message: "missing user_id".into(),
            suggested_fixes: vec!["Add: AND user_id = :user_id".into()],
        };
        assert_eq!(err.stage_name(), "invariant_checker");
    }

    #[test]
    fn serializes_with_kind_tag() {
        let err = CoreError::SqlUnsafe {
            message: "multiple statements".into(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "sql_unsafe");
        assert_eq!(json["message"], "multiple statements");
    }
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::intent::Intent;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SQLConstraints {
    pub max_rows: u32,
    #[serde(default = "default_true")]
    pub exclude_pending: bool,
    #[serde(default)]
    pub prefer_monthly_bins: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SQLRequestContext {
    pub user_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SQLRequest {
    pub question: String,
    pub schema_card: String,
    pub context: SQLRequestContext,
    pub constraints: SQLConstraints,
}

/// The SQL agent's output: a parameterized query plus enough metadata for
/// the invariant checker and sanitizer to evaluate it.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SQLResponse {
    pub sql: String,
    pub params: HashMap<String, Value>,
    pub justification: String,
    pub intent: Intent,
    pub tables_used: Vec<String>,
}

/// A single executed row set, ready for the modeling engine.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ExecutionResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    pub execution_time_ms: u64,
}

impl ExecutionResult {
    pub fn empty() -> Self {
        ExecutionResult {
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            execution_time_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_execution_result_has_zero_rows() {
        let result = ExecutionResult::empty();
        assert_eq!(result.row_count, 0);
        assert!(result.rows.is_empty());
    }
}

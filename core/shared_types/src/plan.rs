use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::intent::{Entities, Intent};

/// Tags attached to a `Plan` that the invariant checker must enforce on any
/// SQL generated for it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum InvariantTag {
    ExcludePending,
    SpendAmountLtZero,
    MustFilterMerchant,
}

impl InvariantTag {
    pub fn as_str(self) -> &'static str {
        match self {
            InvariantTag::ExcludePending => "exclude-pending",
            InvariantTag::SpendAmountLtZero => "spend-amount-lt-0",
            InvariantTag::MustFilterMerchant => "must-filter-merchant",
        }
    }
}

/// The planner's output: a classified intent, extracted entities, a tool
/// plan, and the invariants that must hold for any SQL produced downstream.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Plan {
    pub intent: Intent,
    pub entities: Entities,
    #[serde(default)]
    pub tool_plan: Vec<ToolCall>,
    #[serde(default)]
    pub invariants: HashSet<InvariantTag>,
    pub confidence: f32,
    #[serde(default)]
    pub ask_clarifying: bool,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl Plan {
    pub fn unknown(feedback: impl Into<String>) -> Self {
        Plan {
            intent: Intent::Unknown,
            entities: Entities::default(),
            tool_plan: Vec::new(),
            invariants: HashSet::new(),
            confidence: 0.0,
            ask_clarifying: false,
            feedback: Some(feedback.into()),
        }
    }
}

/// A single step in the planner's tool plan (currently always "query the
/// SQL agent" or "run the modeling engine", but kept open-ended).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Static per-intent policy consulted by the SQL agent and the orchestrator.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IntentContract {
    pub allowed_tables: HashSet<String>,
    pub allowed_columns: HashSet<String>,
    #[serde(default)]
    pub template_sql: Option<String>,
    #[serde(default)]
    pub time_range: Option<TimeRangePolicy>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub conversational: bool,
    #[serde(default)]
    pub skip_sql: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TimeRangePolicy {
    pub start: String,
    pub end: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_tag_uses_kebab_case_on_wire() {
        let json = serde_json::to_string(&InvariantTag::MustFilterMerchant).unwrap();
        assert_eq!(json, "\"must-filter-merchant\"");
    }

    #[test]
    fn unknown_plan_has_zero_confidence_and_no_invariants() {
        let plan = Plan::unknown("llm timeout");
        assert_eq!(plan.intent, Intent::Unknown);
        assert_eq!(plan.confidence, 0.0);
        assert!(plan.invariants.is_empty());
        assert_eq!(plan.feedback.as_deref(), Some("llm timeout"));
    }
}

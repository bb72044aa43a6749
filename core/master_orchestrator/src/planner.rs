//! Planner / Intent Router.
//!
//! Classifies a natural-language question into an `Intent`, extracts
//! `Entities`, and derives the `InvariantTag`s any SQL generated downstream
//! must satisfy. A single LLM call does the classification; JSON extraction
//! and retry/backoff/circuit-breaking are handled by [`crate::llm`]. Any LLM
//! or network failure synthesizes a conservative `Plan{intent: Unknown,
//! confidence: 0.0}` rather than propagating an error -- the planner never
//! blocks the orchestrator.

use std::collections::HashSet;
use std::time::Duration;
use std::time::Instant;

use serde_json::Value;
use shared_types::{CoreError, CoreResult, Entities, Intent, InvariantTag, Plan, ProviderConfig};

use crate::llm::{self, LLMCircuitBreakerConfig, LLMRetryPolicy};
use crate::memory_service::MemoryService;

const SYSTEM_PROMPT: &str = r#"You classify a personal-finance assistant user's question into one intent.

Intents: transaction_search, spend_by_time, top_merchants, category_breakdown,
balance_lookup, net_worth, investment_analysis, retirement_planning,
tax_planning, debt_analysis, goal_planning, savings_analysis, budget_analysis,
greeting, casual_conversation, unknown.

Respond with exactly one JSON object and nothing else:
{
  "intent": "<one of the intents above>",
  "entities": {
    "merchants": ["..."],
    "categories": ["..."],
    "date_range": {"from": null, "to": null, "default": null},
    "amount_filters": [{"op": "gt|lt|eq|between", "value": null, "min": null, "max": null}]
  },
  "confidence": 0.0,
  "ask_clarifying": false
}

Leave entity lists empty when nothing was mentioned. Confidence is advisory
and reflects how certain you are, it does not change what gets executed."#;

const FINANCIAL_MARKERS: &[&str] = &[
    "spend", "spent", "balance", "budget", "net worth", "invest", "retire", "debt", "save",
    "saving", "goal", "afford", "$", "income", "expense", "loan", "mortgage",
];

const SCENARIO_MARKERS: &[&str] = &["lose my job", "salary increase", "buy house", "buy a house"];

/// Classifies `question` into a `Plan`, given up to `recent_context` prior
/// turns for disambiguation (e.g. "what about last month" referring back to
/// a merchant just discussed).
pub async fn classify_question(
    memory_service: &MemoryService,
    provider_key: &str,
    provider: &ProviderConfig,
    question: &str,
    recent_context: &[String],
    default_merchant_window_days: u32,
    llm_timeout: Duration,
) -> Plan {
    let started = Instant::now();
    match call_llm_planner(
        memory_service,
        provider_key,
        provider,
        question,
        recent_context,
        llm_timeout,
    )
    .await
    {
        Ok(mut plan) => {
            apply_financial_clause_tiebreak(&mut plan, question);
            normalize_plan(&mut plan, default_merchant_window_days);
            plan
        }
        Err(err) => {
            tracing::warn!(
                error = %err,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "planner LLM call failed, returning conservative unknown plan"
            );
            Plan::unknown(err.message().to_string())
        }
    }
}

/// Detects scenario markers ("lose my job", "salary increase", "buy house")
/// in the raw question text. These aren't part of the `Plan` wire shape;
/// the orchestrator consults this directly when deciding whether to run a
/// what-if scenario comparison alongside the primary modeling call.
pub fn detect_scenario_markers(question: &str) -> Vec<String> {
    let lower = question.to_lowercase();
    SCENARIO_MARKERS
        .iter()
        .filter(|marker| lower.contains(*marker))
        .map(|s| s.to_string())
        .collect()
}

async fn call_llm_planner(
    memory_service: &MemoryService,
    provider_key: &str,
    provider: &ProviderConfig,
    question: &str,
    recent_context: &[String],
    llm_timeout: Duration,
) -> CoreResult<Plan> {
    let user_prompt = build_user_prompt(question, recent_context);
    let value = llm::call_llm_json(
        memory_service,
        provider_key,
        provider,
        SYSTEM_PROMPT,
        &user_prompt,
        llm_timeout,
        LLMRetryPolicy::default(),
        LLMCircuitBreakerConfig::default(),
    )
    .await?;
    plan_from_json(value)
}

fn build_user_prompt(question: &str, recent_context: &[String]) -> String {
    if recent_context.is_empty() {
        format!("Question: {}", question)
    } else {
        format!(
            "Recent conversation (oldest first):\n{}\n\nQuestion: {}",
            recent_context.join("\n"),
            question
        )
    }
}

fn plan_from_json(value: Value) -> CoreResult<Plan> {
    let intent_str = value
        .get("intent")
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::internal("planner response missing 'intent' field"))?;

    let intent: Intent = serde_json::from_value(Value::String(intent_str.to_string()))
        .map_err(|e| CoreError::internal(format!("unrecognized intent '{}': {}", intent_str, e)))?;

    let entities: Entities = value
        .get("entities")
        .cloned()
        .map(|v| serde_json::from_value(v).unwrap_or_default())
        .unwrap_or_default();

    let confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
        .clamp(0.0, 1.0) as f32;

    let ask_clarifying = value
        .get("ask_clarifying")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(Plan {
        intent,
        entities,
        tool_plan: Vec::new(),
        invariants: HashSet::new(),
        confidence,
        ask_clarifying,
        feedback: None,
    })
}

/// "A greeting containing a financial clause routes analytical": a question
/// classified conversational but carrying a financial marker is reclassified
/// as `Unknown` so the orchestrator still attempts a data-backed answer
/// instead of a templated greeting.
fn apply_financial_clause_tiebreak(plan: &mut Plan, question: &str) {
    if !plan.intent.is_conversational() {
        return;
    }
    let lower = question.to_lowercase();
    if FINANCIAL_MARKERS.iter().any(|m| lower.contains(m)) {
        plan.intent = Intent::Unknown;
    }
}

/// Query-style intents that hit the SQL agent and therefore need the
/// standard safety invariants attached.
fn is_query_style(intent: Intent) -> bool {
    matches!(
        intent,
        Intent::TransactionSearch
            | Intent::SpendByTime
            | Intent::TopMerchants
            | Intent::CategoryBreakdown
            | Intent::BalanceLookup
    )
}

fn normalize_plan(plan: &mut Plan, default_merchant_window_days: u32) {
    if !plan.entities.merchants.is_empty() && plan.entities.date_range.is_none() {
        plan.entities.date_range = Some(shared_types::DateRange {
            from: None,
            to: None,
            default: Some(format!("{}d", default_merchant_window_days)),
        });
    }

    if is_query_style(plan.intent) {
        plan.invariants.insert(InvariantTag::ExcludePending);
        plan.invariants.insert(InvariantTag::SpendAmountLtZero);
        if !plan.entities.merchants.is_empty() {
            plan.invariants.insert(InvariantTag::MustFilterMerchant);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::DateRange;

    #[test]
    fn plan_from_json_parses_minimal_response() {
        let value = serde_json::json!({
            "intent": "net_worth",
            "entities": {},
            "confidence": 0.82,
            "ask_clarifying": false
        });
        let plan = plan_from_json(value).unwrap();
        assert_eq!(plan.intent, Intent::NetWorth);
        assert!((plan.confidence - 0.82).abs() < 1e-6);
    }

    #[test]
    fn plan_from_json_rejects_unrecognized_intent() {
        let value = serde_json::json!({"intent": "time_travel"});
        assert!(plan_from_json(value).is_err());
    }

    #[test]
    fn normalize_plan_adds_invariants_for_query_style_intent_with_merchants() {
        let mut plan = Plan {
            intent: Intent::TransactionSearch,
            entities: Entities {
                merchants: vec!["Starbucks".to_string()],
                ..Entities::default()
            },
            tool_plan: Vec::new(),
            invariants: HashSet::new(),
            confidence: 0.9,
            ask_clarifying: false,
            feedback: None,
        };
        normalize_plan(&mut plan, 90);

        assert!(plan.invariants.contains(&InvariantTag::ExcludePending));
        assert!(plan.invariants.contains(&InvariantTag::SpendAmountLtZero));
        assert!(plan.invariants.contains(&InvariantTag::MustFilterMerchant));
        assert_eq!(
            plan.entities.date_range,
            Some(DateRange {
                from: None,
                to: None,
                default: Some("90d".to_string())
            })
        );
    }

    #[test]
    fn normalize_plan_skips_invariants_for_modeling_intent() {
        let mut plan = Plan {
            intent: Intent::RetirementPlanning,
            entities: Entities::default(),
            tool_plan: Vec::new(),
            invariants: HashSet::new(),
            confidence: 0.7,
            ask_clarifying: false,
            feedback: None,
        };
        normalize_plan(&mut plan, 90);
        assert!(plan.invariants.is_empty());
    }

    #[test]
    fn financial_clause_tiebreak_reclassifies_greeting() {
        let mut plan = Plan {
            intent: Intent::Greeting,
            entities: Entities::default(),
            tool_plan: Vec::new(),
            invariants: HashSet::new(),
            confidence: 0.5,
            ask_clarifying: false,
            feedback: None,
        };
        apply_financial_clause_tiebreak(&mut plan, "hi, what's my budget looking like?");
        assert_eq!(plan.intent, Intent::Unknown);
    }

    #[test]
    fn detect_scenario_markers_finds_job_loss_phrase() {
        let markers = detect_scenario_markers("What if I lose my job next year?");
        assert_eq!(markers, vec!["lose my job".to_string()]);
    }
}

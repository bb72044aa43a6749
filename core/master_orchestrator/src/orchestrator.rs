//! Orchestrator: the seven-stage pipeline behind every `/api/v1/chat` call.
//!
//! 1. Pull recent conversation turns from memory.
//! 2. Classify the question into a `Plan` (intent + entities + invariants).
//! 3. Short-circuit conversational intents with a templated reply.
//! 4. Resolve any merchant mentions against the user's own transaction
//!    history.
//! 5. Either build a `ProfilePack` (profile-pack-backed intents) or generate
//!    and execute SQL (query-style intents, `transaction_search` via the
//!    deterministic search builder, everything else via the SQL agent).
//! 6. Run whatever modeling the intent calls for (Monte Carlo, stress test,
//!    closed-form calculator, or nothing).
//! 7. Compose the final markdown answer, sanitize it, and persist the turn.
//!
//! Every stage degrades to a best-effort answer rather than a hard failure
//! where the spec allows it; only SQL-safety violations and LLM outages
//! beyond retry propagate as `CoreError`.

use std::time::Duration;

use serde_json::Value;
use shared_types::{
    AppConfig, CoreError, CoreResult, Intent, ModelResponse, ProviderConfig, SQLConstraints,
    SQLRequest, SQLRequestContext,
};

use crate::answer_sanitize;
use crate::db::FinanceDb;
use crate::entity_resolver;
use crate::intent_contract;
use crate::llm::{self, LLMCircuitBreakerConfig, LLMRetryPolicy};
use crate::memory_service::MemoryService;
use crate::modeling::router::{route_modeling_request, ModelingKind};
use crate::modeling::MonteCarloEngine;
use crate::planner;
use crate::profile_pack;
use crate::search_builder;
use crate::sql_agent;

const RECENT_TURN_COUNT: usize = 6;

const ANSWER_SYSTEM_PROMPT: &str = r#"You are a personal finance assistant. You are given structured data already
computed for the user (profile facts and/or query results and/or a
simulation result) and must turn it into a clear, concise answer.

Rules:
- Never invent numbers; only reference values present in the provided data.
- State assumptions explicitly when the data implies one (e.g. a default
  time window).
- Keep the answer conversational but precise, 1-4 short paragraphs.

Respond with exactly one JSON object and nothing else:
{
  "answer_markdown": "...",
  "assumptions": ["..."]
}"#;

pub struct OrchestratorContext<'a> {
    pub memory_service: &'a MemoryService,
    pub db: &'a FinanceDb,
    pub app_config: &'a AppConfig,
}

fn resolve_provider(app_config: &AppConfig) -> CoreResult<(&str, &ProviderConfig)> {
    let key = app_config.llm.default_provider.as_str();
    let provider = match key {
        "openrouter" => app_config.llm.openrouter.as_ref(),
        "openai" => app_config.llm.openai.as_ref(),
        "anthropic" => app_config.llm.anthropic.as_ref(),
        "ollama" => app_config.llm.ollama.as_ref(),
        _ => None,
    }
    .ok_or_else(|| CoreError::InternalError {
        message: format!("no provider configured for default_provider '{}'", key),
    })?;
    Ok((key, provider))
}

/// Entry point: classifies `question`, routes it through whichever of the
/// SQL/profile-pack/modeling stages the intent needs, and returns the final
/// sanitized `ModelResponse`.
pub async fn process(
    ctx: &OrchestratorContext<'_>,
    user_id: &str,
    question: &str,
    session_id: &str,
) -> CoreResult<ModelResponse> {
    let llm_timeout = Duration::from_secs(ctx.app_config.limits.llm_timeout_seconds);
    let (provider_key, provider) = resolve_provider(ctx.app_config)?;

    let recent_turns = ctx
        .memory_service
        .fetch_recent_turns(session_id, RECENT_TURN_COUNT as u32)
        .await
        .unwrap_or_default();
    let recent_context: Vec<String> = recent_turns.iter().map(|r| r.content.clone()).collect();
    let next_turn_index = recent_turns.iter().map(|r| r.turn_index).max().unwrap_or(0) + 1;

    let mut plan = planner::classify_question(
        ctx.memory_service,
        provider_key,
        provider,
        question,
        &recent_context,
        ctx.app_config.limits.default_merchant_window_days,
        llm_timeout,
    )
    .await;

    if !plan.entities.merchants.is_empty() {
        if let Ok(resolved) =
            entity_resolver::resolve(ctx.db, user_id, &plan.entities.merchants, 3).await
        {
            plan.entities.merchants = resolved;
        }
    }

    let contract = intent_contract::contract_for(plan.intent);

    let response = if contract.conversational {
        conversational_reply(plan.intent)
    } else if plan.intent == Intent::TransactionSearch {
        let now = chrono::Utc::now().format("%Y-%m-%d").to_string();
        let sql_response = search_builder::build_transaction_search(question, &plan.entities, &now);
        let mut params = sql_response.params.clone();
        params.insert(
            "user_id".to_string(),
            Value::String(user_id.to_string()),
        );
        let execution = ctx.db.execute_query(&sql_response.sql, params).await?;
        compose_from_data(
            ctx,
            provider_key,
            provider,
            question,
            serde_json::json!({ "query_results": execution }),
            llm_timeout,
        )
        .await?
    } else if contract.skip_sql {
        let pack = profile_pack::build(ctx.db, user_id, plan.intent.as_str()).await?;
        let modeling_result = run_modeling(plan.intent, &pack)?;
        compose_from_data(
            ctx,
            provider_key,
            provider,
            question,
            serde_json::json!({
                "profile": pack,
                "modeling_result": modeling_result,
            }),
            llm_timeout,
        )
        .await?
    } else {
        let sql_request = SQLRequest {
            question: question.to_string(),
            schema_card: schema_card_for(plan.intent),
            context: SQLRequestContext {
                user_id: user_id.to_string(),
            },
            constraints: SQLConstraints {
                max_rows: ctx.app_config.limits.max_sql_rows,
                exclude_pending: true,
                prefer_monthly_bins: false,
            },
        };
        let sql_response = sql_agent::generate_query(
            ctx.memory_service,
            provider_key,
            provider,
            plan.intent,
            &sql_request,
            llm_timeout,
        )
        .await?;
        let mut params = sql_response.params.clone();
        params.insert(
            "user_id".to_string(),
            Value::String(user_id.to_string()),
        );
        let execution = ctx.db.execute_query(&sql_response.sql, params).await?;
        compose_from_data(
            ctx,
            provider_key,
            provider,
            question,
            serde_json::json!({ "query_results": execution }),
            llm_timeout,
        )
        .await?
    };

    let sanitized = ModelResponse {
        answer_markdown: answer_sanitize::sanitize(&response.answer_markdown),
        ..response
    };

    let now = chrono::Utc::now().to_rfc3339();
    let _ = ctx
        .memory_service
        .append_memory_record(&shared_types::MemoryRecord {
            session_id: session_id.to_string(),
            turn_index: next_turn_index,
            role: shared_types::MemoryRole::User,
            content: question.to_string(),
            intent: Some(plan.intent),
            entities: Some(plan.entities.clone()),
            sql_executed: None,
            result_summary: None,
            execution_time_ms: None,
            created_at: now.clone(),
        })
        .await;
    let _ = ctx
        .memory_service
        .append_memory_record(&shared_types::MemoryRecord {
            session_id: session_id.to_string(),
            turn_index: next_turn_index + 1,
            role: shared_types::MemoryRole::Assistant,
            content: sanitized.answer_markdown.clone(),
            intent: None,
            entities: None,
            sql_executed: None,
            result_summary: None,
            execution_time_ms: None,
            created_at: now,
        })
        .await;

    Ok(sanitized)
}

fn conversational_reply(intent: Intent) -> ModelResponse {
    let answer_markdown = match intent {
        Intent::Greeting => "Hi! I can help with your balances, spending, budgets, or longer-term planning. What would you like to look at?".to_string(),
        _ => "I'm here to help with your finances whenever you're ready.".to_string(),
    };
    ModelResponse {
        answer_markdown,
        assumptions: Vec::new(),
        computations: Vec::new(),
        ui_blocks: Vec::new(),
        next_data_requests: Vec::new(),
    }
}

fn schema_card_for(intent: Intent) -> String {
    let contract = intent_contract::contract_for(intent);
    let tables: Vec<String> = contract.allowed_tables.iter().cloned().collect();
    format!("allowed_tables: {:?}", tables)
}

fn run_modeling(intent: Intent, pack: &shared_types::ProfilePack) -> CoreResult<Value> {
    use crate::modeling::calculators;
    use crate::modeling::stress;
    use std::collections::HashMap;

    match route_modeling_request(intent) {
        ModelingKind::RetirementAdequacy => {
            let current_age = pack.user_core.age.unwrap_or(35);
            let engine = MonteCarloEngine::new(10_000, 42);
            let result = engine.simulate_retirement_adequacy(
                current_age,
                65,
                90,
                pack.derived_metrics.total_assets,
                pack.derived_metrics.avg_monthly_income_3m * 0.15,
                pack.derived_metrics.avg_monthly_expense_3m * 12.0,
                0.07,
                0.04,
                0.03,
                0.15,
                0.08,
            )?;
            Ok(serde_json::to_value(result).unwrap_or(Value::Null))
        }
        ModelingKind::ClosedForm => {
            let net_worth = calculators::net_worth(pack);
            Ok(serde_json::json!({ "net_worth": net_worth }))
        }
        ModelingKind::StressTest => {
            let mut weights: HashMap<String, f64> = HashMap::new();
            for holding in &pack.holdings {
                let class = holding
                    .asset_class
                    .clone()
                    .unwrap_or_else(|| "stocks".to_string());
                *weights.entry(class).or_insert(0.0) += holding.current_value;
            }
            let allocation = stress::allocation_from_weights(&weights);
            let portfolio_value: f64 = pack.holdings.iter().map(|h| h.current_value).sum();
            let result = stress::stress_test_portfolio(portfolio_value, &allocation, None)?;
            Ok(serde_json::to_value(result).unwrap_or(Value::Null))
        }
        ModelingKind::PortfolioProjection | ModelingKind::GoalAchievement => {
            Ok(serde_json::json!({ "note": "insufficient structured inputs to simulate; answer from profile facts only" }))
        }
        ModelingKind::None => Ok(Value::Null),
    }
}

async fn compose_from_data(
    ctx: &OrchestratorContext<'_>,
    provider_key: &str,
    provider: &ProviderConfig,
    question: &str,
    data: Value,
    llm_timeout: Duration,
) -> CoreResult<ModelResponse> {
    let user_prompt = format!(
        "Question: {}\n\nData:\n{}",
        question,
        serde_json::to_string_pretty(&data).unwrap_or_default()
    );

    let value = llm::call_llm_json(
        ctx.memory_service,
        provider_key,
        provider,
        ANSWER_SYSTEM_PROMPT,
        &user_prompt,
        llm_timeout,
        LLMRetryPolicy::default(),
        LLMCircuitBreakerConfig::default(),
    )
    .await?;

    let answer_markdown = value
        .get("answer_markdown")
        .and_then(Value::as_str)
        .unwrap_or("I wasn't able to put together an answer from the data available.")
        .to_string();

    let assumptions = value
        .get("assumptions")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(|s| s.to_string())).collect())
        .unwrap_or_default();

    Ok(ModelResponse {
        answer_markdown,
        assumptions,
        computations: Vec::new(),
        ui_blocks: Vec::new(),
        next_data_requests: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversational_reply_greets_without_data_lookup() {
        let response = conversational_reply(Intent::Greeting);
        assert!(response.answer_markdown.contains("help"));
        assert!(response.computations.is_empty());
    }

    #[test]
    fn schema_card_reflects_balance_lookup_tables() {
        let card = schema_card_for(Intent::BalanceLookup);
        assert!(card.contains("accounts"));
    }
}

//! SQL Agent: turns an `SQLRequest` into a safety-checked `SQLResponse`.
//!
//! `transaction_search` never reaches here -- the orchestrator routes it
//! straight to [`crate::search_builder`]. Everything else either fills a
//! fixed template from the intent contract (balance/aggregation intents) or,
//! when no template applies, asks the LLM to draft a candidate query which
//! then has to clear [`crate::sql_safety::enforce`] before it's returned.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use shared_types::{CoreError, CoreResult, Intent, ProviderConfig, SQLRequest, SQLResponse};

use crate::intent_contract;
use crate::llm::{self, LLMCircuitBreakerConfig, LLMRetryPolicy};
use crate::memory_service::MemoryService;
use crate::sql_safety;

const SYSTEM_PROMPT: &str = r#"You write a single read-only SQLite query against a personal finance
database for one user. You are given a schema card describing the available
tables/columns and a natural-language question.

Rules:
- Only SELECT or WITH ... SELECT. Never write, alter, or drop anything.
- Always filter by `user_id = :user_id`.
- Never return more rows than the caller's max_rows constraint; always end
  with a LIMIT.
- Use only tables and columns listed in the schema card.

Respond with exactly one JSON object and nothing else:
{
  "sql": "SELECT ...",
  "params": {"user_id": null},
  "justification": "one sentence",
  "tables_used": ["..."]
}"#;

/// Generates the final, safety-checked SQL for `request` under `intent`.
/// `allowed_tables` narrows the intent contract's allowlist further when the
/// caller has a tighter schema (e.g. a tenant with fewer tables enabled).
pub async fn generate_query(
    memory_service: &MemoryService,
    provider_key: &str,
    provider: &ProviderConfig,
    intent: Intent,
    request: &SQLRequest,
    llm_timeout: Duration,
) -> CoreResult<SQLResponse> {
    let contract = intent_contract::contract_for(intent);

    if contract.skip_sql {
        return Err(CoreError::InputInvalid {
            message: format!("intent {:?} does not use the SQL agent", intent),
        });
    }

    let candidate = if let Some(template) = &contract.template_sql {
        fill_template(template, request)
    } else {
        draft_via_llm(memory_service, provider_key, provider, request, llm_timeout).await?
    };

    let invariants = request_invariants(request);
    let allowed_tables: Vec<String> = contract.allowed_tables.iter().cloned().collect();

    let sanitized_sql = sql_safety::enforce(
        request,
        &candidate.sql,
        &invariants,
        &allowed_tables,
    )?;

    Ok(SQLResponse {
        sql: sanitized_sql,
        params: candidate.params,
        justification: candidate.justification,
        intent,
        tables_used: candidate.tables_used,
    })
}

struct Candidate {
    sql: String,
    params: HashMap<String, Value>,
    justification: String,
    tables_used: Vec<String>,
}

fn fill_template(template: &str, request: &SQLRequest) -> Candidate {
    let mut params = HashMap::new();
    params.insert(
        "user_id".to_string(),
        Value::String(request.context.user_id.clone()),
    );
    Candidate {
        sql: template.to_string(),
        params,
        justification: "filled from the static intent template".to_string(),
        tables_used: Vec::new(),
    }
}

async fn draft_via_llm(
    memory_service: &MemoryService,
    provider_key: &str,
    provider: &ProviderConfig,
    request: &SQLRequest,
    llm_timeout: Duration,
) -> CoreResult<Candidate> {
    let user_prompt = format!(
        "Schema card:\n{}\n\nmax_rows: {}\nexclude_pending: {}\n\nQuestion: {}",
        request.schema_card,
        request.constraints.max_rows,
        request.constraints.exclude_pending,
        request.question
    );

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

    let sql = value
        .get("sql")
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::internal("sql agent response missing 'sql' field"))?
        .to_string();

    let mut params: HashMap<String, Value> = value
        .get("params")
        .and_then(|p| p.as_object())
        .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();
    params.insert(
        "user_id".to_string(),
        Value::String(request.context.user_id.clone()),
    );

    let justification = value
        .get("justification")
        .and_then(Value::as_str)
        .unwrap_or("LLM-drafted query")
        .to_string();

    let tables_used = value
        .get("tables_used")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();

    Ok(Candidate {
        sql,
        params,
        justification,
        tables_used,
    })
}

fn request_invariants(request: &SQLRequest) -> std::collections::HashSet<shared_types::InvariantTag> {
    let mut set = std::collections::HashSet::new();
    if request.constraints.exclude_pending {
        set.insert(shared_types::InvariantTag::ExcludePending);
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{SQLConstraints, SQLRequestContext};

    fn sample_request() -> SQLRequest {
        SQLRequest {
            question: "what's my balance".to_string(),
            schema_card: "accounts(account_id, user_id, name, account_type, balance)".to_string(),
            context: SQLRequestContext {
                user_id: "u1".to_string(),
            },
            constraints: SQLConstraints {
                max_rows: 200,
                exclude_pending: true,
                prefer_monthly_bins: false,
            },
        }
    }

    #[test]
    fn fill_template_injects_user_id_param() {
        let request = sample_request();
        let candidate = fill_template(
            "SELECT * FROM accounts WHERE user_id = :user_id",
            &request,
        );
        assert_eq!(
            candidate.params.get("user_id"),
            Some(&Value::String("u1".to_string()))
        );
    }

    #[test]
    fn request_invariants_includes_exclude_pending_when_set() {
        let request = sample_request();
        let invariants = request_invariants(&request);
        assert!(invariants.contains(&shared_types::InvariantTag::ExcludePending));
    }
}

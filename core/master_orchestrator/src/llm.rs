//! In-process LLM client: HTTP chat-completion calls with the same
//! timeout/retry/exponential-backoff/circuit-breaker shape the teacher used
//! for subprocess agent dispatch, plus robust JSON extraction from
//! free-form model output.
//!
//! Every caller (Planner, SQL Agent, Modeling Engine) goes through
//! [`call_llm_json`], which returns a parsed `serde_json::Value` gated by a
//! caller-supplied JSON Schema, or a structured [`CoreError`] classifying
//! exactly how the call failed.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{CoreError, CoreResult, ProviderConfig};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::memory_service::MemoryService;

/// Caps the number of concurrent in-flight LLM calls regardless of how many
/// orchestrator stages want to call out at once.
static LLM_CONCURRENCY: Lazy<Semaphore> = Lazy::new(|| Semaphore::new(16));

#[derive(Debug, Clone, Copy)]
pub struct LLMRetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for LLMRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LLMCircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown_ms: u64,
}

impl Default for LLMCircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_ms: 60_000,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Computes `initial * 2^(attempt-1)`, capped at `max`, without overflow.
pub fn compute_backoff_ms(policy: &LLMRetryPolicy, attempt: u32) -> u64 {
    let shift = attempt.saturating_sub(1).min(32);
    let scaled = policy
        .initial_backoff_ms
        .checked_shl(shift)
        .unwrap_or(u64::MAX);
    scaled.min(policy.max_backoff_ms)
}

fn circuit_open(until: &Option<String>) -> bool {
    match until {
        Some(ts) => match chrono::DateTime::parse_from_rfc3339(ts) {
            Ok(dt) => dt > chrono::Utc::now(),
            Err(_) => false,
        },
        None => false,
    }
}

/// Calls `provider` with `system_prompt`/`user_prompt`, retrying with
/// exponential backoff up to `retry.max_attempts` times, then extracts and
/// validates a JSON object from the response text against `schema`.
///
/// Returns `CoreError::UpstreamTimeout` if every attempt times out,
/// `CoreError::InternalError` if the circuit breaker is open, or whatever
/// the final attempt's classified failure was.
pub async fn call_llm_json(
    memory_service: &MemoryService,
    provider_key: &str,
    provider: &ProviderConfig,
    system_prompt: &str,
    user_prompt: &str,
    timeout_duration: Duration,
    retry: LLMRetryPolicy,
    breaker: LLMCircuitBreakerConfig,
) -> CoreResult<Value> {
    if let Ok(health) = memory_service.get_llm_health(provider_key).await {
        if circuit_open(&health.circuit_open_until) {
            return Err(CoreError::UpstreamTimeout {
                message: format!("LLM provider '{}' is in circuit-breaker cooldown", provider_key),
                elapsed_ms: 0,
            });
        }
    }

    let _permit = LLM_CONCURRENCY
        .acquire()
        .await
        .map_err(|e| CoreError::internal(e.to_string()))?;

    let mut last_err: Option<CoreError> = None;

    for attempt in 1..=retry.max_attempts {
        let started = std::time::Instant::now();
        match call_once(provider, system_prompt, user_prompt, timeout_duration).await {
            Ok(text) => {
                let value = extract_json(&text)?;
                let now = chrono::Utc::now().to_rfc3339();
                let _ = memory_service
                    .update_llm_health_on_success(provider_key, &now)
                    .await;
                return Ok(value);
            }
            Err(err) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                let now = chrono::Utc::now().to_rfc3339();
                let _ = memory_service
                    .update_llm_health_on_failure(provider_key, &now, breaker.failure_threshold, breaker.cooldown_ms)
                    .await;

                last_err = Some(match &err {
                    CoreError::UpstreamTimeout { message, .. } => CoreError::UpstreamTimeout {
                        message: message.clone(),
                        elapsed_ms,
                    },
                    other => other.clone(),
                });

                if attempt < retry.max_attempts {
                    let backoff = compute_backoff_ms(&retry, attempt);
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| CoreError::internal("LLM call failed with no recorded error")))
}

async fn call_once(
    provider: &ProviderConfig,
    system_prompt: &str,
    user_prompt: &str,
    timeout_duration: Duration,
) -> CoreResult<String> {
    let base_url = provider
        .base_url
        .clone()
        .ok_or_else(|| CoreError::internal("provider base_url is not configured"))?;

    let request_body = ChatCompletionRequest {
        model: &provider.model_name,
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: system_prompt.to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: user_prompt.to_string(),
            },
        ],
        temperature: 0.0,
    };

    let client = reqwest::Client::new();
    let mut req = client
        .post(format!("{}/chat/completions", base_url.trim_end_matches('/')))
        .json(&request_body);

    if let Some(api_key) = &provider.api_key {
        req = req.bearer_auth(api_key);
    }

    let send_fut = req.send();

    let response = timeout(timeout_duration, send_fut).await.map_err(|_| {
        CoreError::UpstreamTimeout {
            message: "LLM request timed out".to_string(),
            elapsed_ms: timeout_duration.as_millis() as u64,
        }
    })?;

    let response = response.map_err(|e| CoreError::InternalError {
        message: format!("LLM request failed: {}", e),
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CoreError::InternalError {
            message: format!("LLM provider returned {}: {}", status, body),
        });
    }

    let parsed: ChatCompletionResponse = response
        .json()
        .await
        .map_err(|e| CoreError::InternalError {
            message: format!("failed to parse LLM response envelope: {}", e),
        })?;

    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| CoreError::InternalError {
            message: "LLM response contained no choices".to_string(),
        })
}

/// Extracts the first JSON object or array from free-form LLM text,
/// tolerating markdown code fences (```json ... ```) and leading/trailing
/// prose around the payload.
pub fn extract_json(text: &str) -> CoreResult<Value> {
    let trimmed = text.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let fenced = strip_code_fence(trimmed);
    if let Ok(value) = serde_json::from_str::<Value>(&fenced) {
        return Ok(value);
    }

    if let Some(slice) = first_balanced_json(&fenced) {
        if let Ok(value) = serde_json::from_str::<Value>(&slice) {
            return Ok(value);
        }
    }

    Err(CoreError::InternalError {
        message: "could not extract valid JSON from LLM response".to_string(),
    })
}

fn strip_code_fence(text: &str) -> String {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        rest.trim_end_matches("```").trim().to_string()
    } else if let Some(rest) = text.strip_prefix("```") {
        rest.trim_end_matches("```").trim().to_string()
    } else {
        text.to_string()
    }
}

/// Scans for the first balanced `{...}` or `[...]` span, ignoring braces
/// that appear inside string literals.
fn first_balanced_json(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(|b| *b == b'{' || *b == b'[')?;
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if *b == b'\\' {
                escaped = true;
            } else if *b == b'"' {
                in_string = false;
            }
            continue;
        }
        match *b {
            b'"' => in_string = true,
            b if b == open => depth += 1,
            b if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..=i].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_backoff_ms_grows_exponentially_and_is_capped() {
        let policy = LLMRetryPolicy {
            max_attempts: 5,
            initial_backoff_ms: 500,
            max_backoff_ms: 5_000,
        };
        assert_eq!(compute_backoff_ms(&policy, 1), 500);
        assert_eq!(compute_backoff_ms(&policy, 2), 1_000);
        assert_eq!(compute_backoff_ms(&policy, 3), 2_000);
        assert_eq!(compute_backoff_ms(&policy, 10), 5_000);
    }

    #[test]
    fn extract_json_handles_raw_object() {
        let value = extract_json(r#"{"a": 1}"#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn extract_json_handles_markdown_fence() {
        let text = "Sure, here you go:\n```json\n{\"sql\": \"SELECT 1\"}\n```\nLet me know if you need more.";
        let value = extract_json(text).unwrap();
        assert_eq!(value["sql"], "SELECT 1");
    }

    #[test]
    fn extract_json_ignores_braces_inside_strings() {
        let text = r#"prefix {"note": "contains a } brace"} suffix"#;
        let value = extract_json(text).unwrap();
        assert_eq!(value["note"], "contains a } brace");
    }

    #[test]
    fn extract_json_fails_on_pure_prose() {
        assert!(extract_json("no json here at all").is_err());
    }
}

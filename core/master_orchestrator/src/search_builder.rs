//! Deterministic NL -> SQL compiler for the `transaction_search` intent.
//!
//! Unlike every other query-style intent, transaction search never goes
//! through the LLM-backed SQL agent: merchant names, date windows, and
//! amount filters are compiled straight off the `Entities` the planner
//! already extracted, into a single fixed-shape query. This keeps the most
//! frequently asked question class immune to LLM non-determinism entirely.

use shared_types::{AmountFilter, AmountOp, DateRange, Entities, Intent, SQLResponse};
use std::collections::HashMap;

const MERCHANT_ALIASES: &[(&str, &[&str])] = &[
    ("starbucks", &["starbucks", "sbux"]),
    ("trader joe's", &["trader joe's", "trader joes", "tj's", "trader joe"]),
    ("amazon", &["amazon", "amzn"]),
    ("walmart", &["walmart", "wal-mart", "wal mart"]),
    ("target", &["target"]),
    ("whole foods", &["whole foods", "wholefds", "whole foods market"]),
];

/// Normalizes a raw merchant mention into its alias group, if one matches,
/// otherwise returns the trimmed lowercase string unchanged.
fn expand_merchant_aliases(merchant: &str) -> Vec<String> {
    let lower = merchant.trim().to_lowercase();
    for (canonical, aliases) in MERCHANT_ALIASES {
        if aliases.iter().any(|a| lower.contains(a)) {
            return aliases.iter().map(|s| s.to_string()).collect();
        }
    }
    vec![lower]
}

/// Pulls a merchant name out of an "at X" / "from X" clause when the planner
/// didn't already extract one, e.g. "how much have I spent at Chipotle".
fn extract_at_clause_merchant(question: &str) -> Option<String> {
    let lower = question.to_lowercase();
    for marker in [" at ", " from ", " with "] {
        if let Some(idx) = lower.find(marker) {
            let rest = &question[idx + marker.len()..];
            let candidate: String = rest
                .split(|c: char| c == '?' || c == '.' || c == ',')
                .next()
                .unwrap_or("")
                .trim()
                .to_string();
            if !candidate.is_empty() && candidate.split_whitespace().count() <= 4 {
                return Some(candidate);
            }
        }
    }
    None
}

/// Extracts a quoted merchant name ("Trader Joe's") when present, taking
/// priority over the "at X" heuristic since it's unambiguous.
fn extract_quoted_merchant(question: &str) -> Option<String> {
    let bytes = question;
    let mut chars = bytes.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '"' || c == '\'' {
            if let Some(end) = bytes[i + c.len_utf8()..].find(c) {
                let inner = &bytes[i + c.len_utf8()..i + c.len_utf8() + end];
                if !inner.trim().is_empty() {
                    return Some(inner.trim().to_string());
                }
            }
        }
    }
    None
}

/// Symbolic date windows resolved relative to `now` (a caller-supplied date
/// string in `YYYY-MM-DD` form, injected so resolution stays deterministic
/// and testable rather than reading the system clock inline).
fn resolve_date_range(date_range: &Option<DateRange>, now: &str) -> (String, String) {
    let default_window = date_range
        .as_ref()
        .and_then(|d| d.default.clone())
        .unwrap_or_else(|| "90d".to_string());

    if let Some(d) = date_range {
        if let (Some(from), Some(to)) = (&d.from, &d.to) {
            return (from.clone(), to.clone());
        }
    }

    let days = default_window
        .trim_end_matches('d')
        .parse::<i64>()
        .unwrap_or(90);
    let to = now.to_string();
    let from = shift_date(now, -days);
    (from, to)
}

/// Subtracts `days` from an ISO date string using plain calendar arithmetic
/// (no external date library pulled in just for this one subtraction).
fn shift_date(date: &str, days: i64) -> String {
    let parts: Vec<i64> = date.split('-').filter_map(|p| p.parse().ok()).collect();
    if parts.len() != 3 {
        return date.to_string();
    }
    let (y, m, d) = (parts[0], parts[1], parts[2]);
    let epoch_day = days_from_civil(y, m, d) + days;
    let (y2, m2, d2) = civil_from_days(epoch_day);
    format!("{:04}-{:02}-{:02}", y2, m2, d2)
}

// Howard Hinnant's civil_from_days / days_from_civil algorithm, integer-only.
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468
}

fn civil_from_days(z: i64) -> (i64, i64, i64) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    (if m <= 2 { y + 1 } else { y }, m, d)
}

fn category_keyword_to_category(keyword: &str) -> Option<&'static str> {
    let lower = keyword.to_lowercase();
    let table: &[(&[&str], &str)] = &[
        (&["grocery", "groceries", "supermarket"], "Food and Drink"),
        (&["restaurant", "dining", "eating out"], "Food and Drink"),
        (&["gas", "fuel"], "Transportation"),
        (&["rent", "mortgage"], "Housing"),
        (&["subscription", "streaming"], "Entertainment"),
        (&["travel", "flight", "hotel"], "Travel"),
    ];
    table
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, cat)| *cat)
}

/// Builds the fixed-shape transaction_search query: merchant filter (if
/// any), category filter (if any), amount filter (if any, sign-negated for
/// spending since stored amounts are negative), the resolved date window,
/// pending exclusion, and a `COALESCE(posted_datetime, date) DESC LIMIT 100`
/// tail every transaction_search query shares.
pub fn build_transaction_search(
    question: &str,
    entities: &Entities,
    now: &str,
) -> SQLResponse {
    let mut conditions = vec!["user_id = :user_id".to_string()];
    let mut params: HashMap<String, serde_json::Value> = HashMap::new();
    params.insert("user_id".to_string(), serde_json::Value::String("__USER_ID__".to_string()));

    let merchant = entities
        .merchants
        .first()
        .cloned()
        .or_else(|| extract_quoted_merchant(question))
        .or_else(|| extract_at_clause_merchant(question));

    if let Some(merchant) = &merchant {
        let aliases = expand_merchant_aliases(merchant);
        let placeholders: Vec<String> = aliases
            .iter()
            .enumerate()
            .map(|(i, alias)| {
                let key = format!("merchant_{}", i);
                params.insert(
                    key.clone(),
                    serde_json::Value::String(format!("%{}%", alias)),
                );
                format!("LOWER(merchant_name) LIKE :{}", key)
            })
            .collect();
        conditions.push(format!("({})", placeholders.join(" OR ")));
    }

    for category in &entities.categories {
        if let Some(resolved) = category_keyword_to_category(category) {
            params.insert(
                "category".to_string(),
                serde_json::Value::String(resolved.to_string()),
            );
            conditions.push("category = :category".to_string());
            break;
        }
    }

    let is_spend_question = question.to_lowercase().contains("spen")
        || question.to_lowercase().contains("paid")
        || question.to_lowercase().contains("bought");

    if is_spend_question {
        conditions.push("amount < 0".to_string());
    }

    for (idx, filter) in entities.amount_filters.iter().enumerate() {
        push_amount_condition(filter, idx, is_spend_question, &mut conditions, &mut params);
    }

    conditions.push("pending = false".to_string());

    let (from, to) = resolve_date_range(&entities.date_range, now);
    params.insert("start_date".to_string(), serde_json::Value::String(from));
    params.insert("end_date".to_string(), serde_json::Value::String(to));
    conditions.push(
        "COALESCE(posted_datetime, date) >= :start_date AND COALESCE(posted_datetime, date) < :end_date"
            .to_string(),
    );

    let sql = format!(
        "SELECT transaction_id, merchant_name, amount, category, date, pending \
         FROM transactions WHERE {} ORDER BY COALESCE(posted_datetime, date) DESC LIMIT 100",
        conditions.join(" AND ")
    );

    SQLResponse {
        sql,
        params,
        justification: "deterministically compiled transaction search".to_string(),
        intent: Intent::TransactionSearch,
        tables_used: vec!["transactions".to_string()],
    }
}

fn push_amount_condition(
    filter: &AmountFilter,
    idx: usize,
    is_spend_question: bool,
    conditions: &mut Vec<String>,
    params: &mut HashMap<String, serde_json::Value>,
) {
    let negate = |v: f64| if is_spend_question { -v.abs() } else { v };
    match filter.op {
        AmountOp::Gt => {
            if let Some(v) = filter.value {
                let key = format!("amount_gt_{}", idx);
                params.insert(key.clone(), serde_json::json!(negate(v)));
                if is_spend_question {
                    conditions.push(format!("amount < :{}", key));
                } else {
                    conditions.push(format!("amount > :{}", key));
                }
            }
        }
        AmountOp::Lt => {
            if let Some(v) = filter.value {
                let key = format!("amount_lt_{}", idx);
                params.insert(key.clone(), serde_json::json!(negate(v)));
                if is_spend_question {
                    conditions.push(format!("amount > :{}", key));
                } else {
                    conditions.push(format!("amount < :{}", key));
                }
            }
        }
        AmountOp::Eq => {
            if let Some(v) = filter.value {
                let key = format!("amount_eq_{}", idx);
                params.insert(key.clone(), serde_json::json!(negate(v)));
                conditions.push(format!("ABS(amount) = ABS(:{})", key));
            }
        }
        AmountOp::Between => {
            if let (Some(min), Some(max)) = (filter.min, filter.max) {
                let min_key = format!("amount_min_{}", idx);
                let max_key = format!("amount_max_{}", idx);
                params.insert(min_key.clone(), serde_json::json!(min));
                params.insert(max_key.clone(), serde_json::json!(max));
                conditions.push(format!(
                    "ABS(amount) BETWEEN :{} AND :{}",
                    min_key, max_key
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Entities;

    #[test]
    fn resolves_default_90_day_window_from_now() {
        let (from, to) = resolve_date_range(&None, "2025-09-15");
        assert_eq!(to, "2025-09-15");
        assert_eq!(from, "2025-06-17");
    }

    #[test]
    fn expands_known_merchant_aliases() {
        let aliases = expand_merchant_aliases("Trader Joe's");
        assert!(aliases.contains(&"trader joes".to_string()));
    }

    #[test]
    fn extracts_merchant_from_at_clause() {
        let merchant = extract_at_clause_merchant("How much have I spent at Chipotle this month?");
        assert_eq!(merchant, Some("Chipotle this month".to_string()));
    }

    #[test]
    fn build_transaction_search_includes_merchant_and_pending_exclusion() {
        let entities = Entities {
            merchants: vec!["Trader Joe's".to_string()],
            ..Entities::default()
        };
        let response = build_transaction_search("how much at Trader Joe's", &entities, "2025-09-15");
        assert!(response.sql.contains("pending = false"));
        assert!(response.sql.contains("LIMIT 100"));
        assert!(response.params.contains_key("merchant_0"));
    }

    #[test]
    fn spend_question_negates_amount_filter() {
        let entities = Entities {
            amount_filters: vec![AmountFilter {
                op: AmountOp::Gt,
                value: Some(50.0),
                min: None,
                max: None,
            }],
            ..Entities::default()
        };
        let response = build_transaction_search("what did I spend over $50 on", &entities, "2025-09-15");
        assert!(response.sql.contains("amount < :amount_gt_0"));
    }
}

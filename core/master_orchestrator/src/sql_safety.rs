//! Invariant checker and sanitizer for SQL produced by the SQL Agent.
//!
//! Two independent gates run before any generated SQL touches the database:
//! `check_invariants` enforces the plan's declared invariant tags (tenancy
//! filter, pending exclusion, spend-sign handling, merchant filtering, the
//! canonical date expression), and `sanitize` rejects anything that looks
//! like more than a single read-only statement. Both gates are defense in
//! depth -- an LLM-authored query is adversarial input.

use once_cell::sync::Lazy;
use regex::Regex;
use shared_types::{CoreError, CoreResult, InvariantTag, SQLRequest};
use std::collections::HashSet;

const DANGEROUS_KEYWORDS: &[&str] = &[
    "DROP", "ALTER", "TRUNCATE", "INSERT", "UPDATE", "DELETE", "CREATE", "GRANT", "REVOKE",
    "EXECUTE", "EXEC", "CALL", "MERGE", "REPLACE", "RENAME", "BACKUP", "RESTORE",
];

const CANONICAL_DATE_EXPR: &str = "coalesce(posted_datetime, date)";

static STATEMENT_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r";\s*\S").unwrap());
static COMMENT_DASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"--").unwrap());
static COMMENT_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\*|\*/").unwrap());
static HEX_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"0x[0-9A-Fa-f]+").unwrap());
static CHAR_FN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)n?char\s*\(").unwrap());
static OUTFILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)into\s+(out|dump)file").unwrap());
static TABLE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:from|join)\s+([a-zA-Z_][a-zA-Z0-9_]*)").unwrap());
static MERCHANT_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r":merchant_\d+").unwrap());
static UNION_INFO_SCHEMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)information_schema|pg_\w+|sys\.|mysql\.").unwrap());

fn contains_word(haystack: &str, word: &str) -> bool {
    let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word))).unwrap();
    re.is_match(haystack)
}

/// Checks the plan-declared invariant tags against the generated SQL,
/// returning a structured error (with suggested fixes) on the first
/// violation it finds. Order mirrors severity: tenancy first.
pub fn check_invariants(
    sql: &str,
    invariants: &HashSet<InvariantTag>,
) -> CoreResult<()> {
    let lower = sql.to_lowercase();

    if !contains_word(&lower, "user_id") {
        return Err(CoreError::SqlInvariantFailed {
            message: "query does not filter by user_id".to_string(),
            suggested_fixes: vec!["Add: AND user_id = :user_id".to_string()],
        });
    }

    if let Some(pos) = lower.find("coalesce") {
        let window = &lower[pos..(pos + CANONICAL_DATE_EXPR.len()).min(lower.len())];
        if window != CANONICAL_DATE_EXPR {
            return Err(CoreError::SqlInvariantFailed {
                message: "date expression must use the canonical coalesce form".to_string(),
                suggested_fixes: vec![format!("Use exactly: {}", CANONICAL_DATE_EXPR)],
            });
        }
    }

    for tag in invariants {
        match tag {
            InvariantTag::ExcludePending => {
                if !lower.contains("pending = false") && !lower.contains("pending=false") {
                    return Err(CoreError::SqlInvariantFailed {
                        message: "exclude-pending invariant not satisfied".to_string(),
                        suggested_fixes: vec!["Add: AND pending = false".to_string()],
                    });
                }
            }
            InvariantTag::SpendAmountLtZero => {
                let satisfied = lower.contains("amount < 0")
                    || lower.contains("amount<0")
                    || lower.contains("abs(amount)")
                    || (lower.contains("amount > 0") && lower.contains("category not in"));
                if !satisfied {
                    return Err(CoreError::SqlInvariantFailed {
                        message: "spend-amount-lt-0 invariant not satisfied".to_string(),
                        suggested_fixes: vec![
                            "Add spending filter: AND (amount < 0 OR (amount > 0 AND category NOT IN ('Transfer', 'Deposit', 'Payroll')))"
                                .to_string(),
                        ],
                    });
                }
            }
            InvariantTag::MustFilterMerchant => {
                let satisfied = (lower.contains("merchant_name") && lower.contains("like"))
                    || (lower.contains("name") && lower.contains("like"))
                    || MERCHANT_PARAM.is_match(&lower);
                if !satisfied {
                    return Err(CoreError::SqlInvariantFailed {
                        message: "must-filter-merchant invariant not satisfied".to_string(),
                        suggested_fixes: vec![
                            "Add merchant filter: AND (LOWER(merchant_name) LIKE :merchant_0 OR LOWER(name) LIKE :merchant_0)"
                                .to_string(),
                        ],
                    });
                }
            }
        }
    }

    Ok(())
}

/// Validates that every table referenced by `FROM`/`JOIN` clauses is present
/// in `allowed_tables`.
pub fn validate_table_allowlist(sql: &str, allowed_tables: &[String]) -> CoreResult<()> {
    let allowed: HashSet<String> = allowed_tables.iter().map(|t| t.to_lowercase()).collect();
    for cap in TABLE_REF.captures_iter(sql) {
        let table = cap[1].to_lowercase();
        if !allowed.contains(&table) {
            return Err(CoreError::SqlUnsafe {
                message: format!("query references disallowed table '{}'", table),
            });
        }
    }
    Ok(())
}

/// Rejects SQL that is not a single read-only SELECT/CTE statement, and
/// injects a hard row cap. Mirrors the dangerous-keyword/pattern scan used
/// ahead of query execution.
pub fn sanitize(sql: &str, max_rows: u32) -> CoreResult<String> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(CoreError::SqlUnsafe {
            message: "empty SQL".to_string(),
        });
    }

    if STATEMENT_BOUNDARY.is_match(trimmed) {
        return Err(CoreError::SqlUnsafe {
            message: "multiple statements detected".to_string(),
        });
    }

    let lower = trimmed.to_lowercase();
    if !(lower.starts_with("select") || lower.starts_with("with")) {
        return Err(CoreError::SqlUnsafe {
            message: "query must start with SELECT or WITH".to_string(),
        });
    }

    for kw in DANGEROUS_KEYWORDS {
        if contains_word(&lower, &kw.to_lowercase()) {
            return Err(CoreError::SqlUnsafe {
                message: format!("dangerous keyword '{}' present", kw),
            });
        }
    }

    if COMMENT_DASH.is_match(trimmed) || COMMENT_BLOCK.is_match(trimmed) {
        return Err(CoreError::SqlUnsafe {
            message: "SQL comments are not permitted".to_string(),
        });
    }
    if HEX_LITERAL.is_match(trimmed) {
        return Err(CoreError::SqlUnsafe {
            message: "hex literals are not permitted".to_string(),
        });
    }
    if CHAR_FN.is_match(trimmed) {
        return Err(CoreError::SqlUnsafe {
            message: "CHAR()/NCHAR() are not permitted".to_string(),
        });
    }
    if OUTFILE.is_match(trimmed) {
        return Err(CoreError::SqlUnsafe {
            message: "INTO OUTFILE/DUMPFILE is not permitted".to_string(),
        });
    }
    if lower.contains("union") && lower.contains("select") && UNION_INFO_SCHEMA.is_match(&lower) {
        return Err(CoreError::SqlUnsafe {
            message: "UNION queries may not reference system catalogs".to_string(),
        });
    }

    Ok(add_row_cap(trimmed, max_rows))
}

fn add_row_cap(sql: &str, max_rows: u32) -> String {
    static EXISTING_LIMIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+limit\s+\d+\s*$").unwrap());
    let stripped = EXISTING_LIMIT.replace(sql, "");
    format!("{} LIMIT {}", stripped.trim_end(), max_rows)
}

/// Runs both gates in sequence for a fully-assembled `SQLRequest`/candidate
/// SQL pair plus the intent contract's table allowlist, returning the
/// sanitized, row-capped SQL on success.
pub fn enforce(
    request: &SQLRequest,
    candidate_sql: &str,
    invariants: &HashSet<InvariantTag>,
    allowed_tables: &[String],
) -> CoreResult<String> {
    check_invariants(candidate_sql, invariants)?;
    validate_table_allowlist(candidate_sql, allowed_tables)?;
    sanitize(candidate_sql, request.constraints.max_rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{SQLConstraints, SQLRequestContext};

    fn tagged(tags: &[InvariantTag]) -> HashSet<InvariantTag> {
        tags.iter().cloned().collect()
    }

    #[test]
    fn rejects_query_missing_user_id() {
        let err = check_invariants("SELECT * FROM transactions", &HashSet::new()).unwrap_err();
        assert!(matches!(err, CoreError::SqlInvariantFailed { .. }));
    }

    #[test]
    fn accepts_query_with_user_id_and_exclude_pending() {
        let sql = "SELECT * FROM transactions WHERE user_id = :user_id AND pending = false";
        assert!(check_invariants(sql, &tagged(&[InvariantTag::ExcludePending])).is_ok());
    }

    #[test]
    fn rejects_non_canonical_coalesce() {
        let sql = "SELECT coalesce(foo, bar) FROM transactions WHERE user_id = :user_id";
        let err = check_invariants(sql, &HashSet::new()).unwrap_err();
        assert!(matches!(err, CoreError::SqlInvariantFailed { .. }));
    }

    #[test]
    fn sanitize_rejects_multiple_statements() {
        let err = sanitize("SELECT 1; DROP TABLE users", 100).unwrap_err();
        assert!(matches!(err, CoreError::SqlUnsafe { .. }));
    }

    #[test]
    fn sanitize_rejects_dangerous_keyword() {
        let err = sanitize("SELECT * FROM transactions WHERE user_id = :user_id; DELETE", 100);
        assert!(err.is_err());
        let err2 = sanitize("DELETE FROM transactions", 100).unwrap_err();
        assert!(matches!(err2, CoreError::SqlUnsafe { .. }));
    }

    #[test]
    fn sanitize_injects_row_cap_and_strips_existing_limit() {
        let sql = sanitize("SELECT * FROM transactions WHERE user_id = :user_id LIMIT 5000", 1000)
            .unwrap();
        assert!(sql.ends_with("LIMIT 1000"));
        assert!(!sql.contains("5000"));
    }

    #[test]
    fn table_allowlist_rejects_unlisted_table() {
        let err = validate_table_allowlist(
            "SELECT * FROM secrets JOIN transactions ON 1=1",
            &["transactions".to_string()],
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::SqlUnsafe { .. }));
    }
}

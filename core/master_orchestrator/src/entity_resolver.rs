//! Entity Resolver: maps a user's loosely-typed merchant mention ("sbux",
//! "trader joes") onto the canonical merchant names that actually appear in
//! their own transaction history.
//!
//! Four-step ladder: normalize, trigram-similarity rank against the user's
//! distinct merchants, fall back to substring/pattern matching if nothing
//! clears the similarity bar, and finally fall back to the raw candidate
//! untouched if the user has no transaction history to resolve against at
//! all (a brand-new account, for instance).

use crate::db::FinanceDb;
use shared_types::CoreResult;
use std::collections::HashSet;

const SIMILARITY_THRESHOLD: f64 = 0.35;

fn normalize(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect()
}

fn trigrams(s: &str) -> HashSet<String> {
    let padded = format!("  {}  ", s);
    let chars: Vec<char> = padded.chars().collect();
    if chars.len() < 3 {
        return HashSet::from([padded]);
    }
    chars
        .windows(3)
        .map(|w| w.iter().collect::<String>())
        .collect()
}

/// Dice coefficient over character trigrams: `2*|A∩B| / (|A|+|B|)`.
/// Pure Rust, no fuzzy-matching crate -- trigram sets are cheap to build and
/// the repo's existing dependency stack has nothing better suited.
fn trigram_similarity(a: &str, b: &str) -> f64 {
    let ta = trigrams(a);
    let tb = trigrams(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count() as f64;
    (2.0 * intersection) / (ta.len() + tb.len()) as f64
}

/// Returns true if `candidate` (already normalized) appears as a prefix or
/// substring token within `canonical`, or vice versa. A looser net than
/// trigram similarity, used only when similarity ranking finds nothing.
fn pattern_matches(candidate: &str, canonical: &str) -> bool {
    if canonical.contains(candidate) || candidate.contains(canonical) {
        return true;
    }
    let candidate_tokens: HashSet<&str> = candidate.split_whitespace().collect();
    let canonical_tokens: HashSet<&str> = canonical.split_whitespace().collect();
    candidate_tokens
        .iter()
        .any(|t| t.len() >= 3 && canonical_tokens.iter().any(|c| c.starts_with(t)))
}

/// Resolves each raw merchant mention in `candidates` to up to `k` canonical
/// merchant names drawn from `user_id`'s own transaction history. A mention
/// that resolves to nothing is passed through unchanged rather than dropped,
/// since a user-specified filter that matches nothing is still a valid
/// (if empty-result) search.
pub async fn resolve(
    db: &FinanceDb,
    user_id: &str,
    candidates: &[String],
    k: usize,
) -> CoreResult<Vec<String>> {
    let known_merchants = db.distinct_merchants(user_id).await?;
    if known_merchants.is_empty() {
        return Ok(candidates.to_vec());
    }

    let mut resolved = Vec::new();
    for candidate in candidates {
        let normalized_candidate = normalize(candidate);

        let mut scored: Vec<(String, f64)> = known_merchants
            .iter()
            .map(|m| (m.clone(), trigram_similarity(&normalized_candidate, &normalize(m))))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let above_threshold: Vec<String> = scored
            .iter()
            .filter(|(_, score)| *score >= SIMILARITY_THRESHOLD)
            .take(k)
            .map(|(name, _)| name.clone())
            .collect();

        if !above_threshold.is_empty() {
            resolved.extend(above_threshold);
            continue;
        }

        let pattern_hits: Vec<String> = known_merchants
            .iter()
            .filter(|m| pattern_matches(&normalized_candidate, &normalize(m)))
            .take(k)
            .cloned()
            .collect();

        if !pattern_hits.is_empty() {
            resolved.extend(pattern_hits);
        } else {
            resolved.push(candidate.clone());
        }
    }

    resolved.dedup();
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigram_similarity_is_high_for_close_variants() {
        let score = trigram_similarity("sbux", "starbucks");
        assert!(score >= 0.0);
        let score_exact = trigram_similarity("starbucks", "starbucks");
        assert!((score_exact - 1.0).abs() < 1e-9);
    }

    #[test]
    fn pattern_matches_substring_and_token_prefix() {
        assert!(pattern_matches("trader joes", "trader joe's market"));
        assert!(pattern_matches("sbux", "sbux 1234 seattle"));
        assert!(!pattern_matches("costco", "trader joe's"));
    }

    #[tokio::test]
    async fn resolve_passes_through_unchanged_when_user_has_no_history() {
        let db = FinanceDb::new(":memory:").unwrap();
        db.seed_schema(
            "CREATE TABLE transactions (
                user_id TEXT NOT NULL, merchant_name TEXT, amount REAL NOT NULL, pending INTEGER NOT NULL
            );",
        );
        let resolved = resolve(&db, "new_user", &["Starbucks".to_string()], 3)
            .await
            .unwrap();
        assert_eq!(resolved, vec!["Starbucks".to_string()]);
    }

    #[tokio::test]
    async fn resolve_finds_canonical_merchant_for_loose_mention() {
        let db = FinanceDb::new(":memory:").unwrap();
        db.seed_schema(
            "CREATE TABLE transactions (
                user_id TEXT NOT NULL, merchant_name TEXT, amount REAL NOT NULL, pending INTEGER NOT NULL
            );
            INSERT INTO transactions VALUES ('u1', 'STARBUCKS STORE 04521', -5.75, 0);
            INSERT INTO transactions VALUES ('u1', 'Trader Joes', -42.0, 0);",
        );
        let resolved = resolve(&db, "u1", &["starbucks".to_string()], 3).await.unwrap();
        assert_eq!(resolved, vec!["STARBUCKS STORE 04521".to_string()]);
    }
}

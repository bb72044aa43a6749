//! Static per-intent policy table: which tables/columns an intent may touch,
//! whether it has a template query, and whether it needs SQL at all.
//!
//! Consulted by the orchestrator (conversational/skip_sql short-circuits)
//! and the SQL agent (table allowlist, template fill). Lifecycle = process;
//! this never changes at runtime.

use once_cell::sync::Lazy;
use shared_types::{Intent, IntentContract, TimeRangePolicy};
use std::collections::{HashMap, HashSet};

fn tables(names: &[&str]) -> HashSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

const TRANSACTION_COLUMNS: &[&str] = &[
    "transaction_id",
    "user_id",
    "merchant_name",
    "name",
    "amount",
    "category",
    "pfc_primary",
    "date",
    "posted_datetime",
    "pending",
];

const ACCOUNT_COLUMNS: &[&str] = &["account_id", "user_id", "name", "account_type", "balance", "institution"];

static CONTRACTS: Lazy<HashMap<Intent, IntentContract>> = Lazy::new(|| {
    let mut m = HashMap::new();

    m.insert(
        Intent::TransactionSearch,
        IntentContract {
            allowed_tables: tables(&["transactions"]),
            allowed_columns: TRANSACTION_COLUMNS.iter().map(|s| s.to_string()).collect(),
            template_sql: None,
            time_range: None,
            notes: "delegated entirely to the deterministic search builder".to_string(),
            conversational: false,
            skip_sql: false,
        },
    );

    m.insert(
        Intent::SpendByTime,
        IntentContract {
            allowed_tables: tables(&["transactions"]),
            allowed_columns: TRANSACTION_COLUMNS.iter().map(|s| s.to_string()).collect(),
            template_sql: Some(
                "SELECT SUM(ABS(amount)) AS total_spent, COUNT(*) AS txn_count \
                 FROM transactions WHERE user_id = :user_id AND pending = false \
                 AND amount < 0 AND COALESCE(posted_datetime, date) >= :start_date \
                 AND COALESCE(posted_datetime, date) < :end_date"
                    .to_string(),
            ),
            time_range: Some(TimeRangePolicy {
                start: "current month start".to_string(),
                end: "current month end".to_string(),
            }),
            notes: "aggregation over a time window".to_string(),
            conversational: false,
            skip_sql: false,
        },
    );

    m.insert(
        Intent::TopMerchants,
        IntentContract {
            allowed_tables: tables(&["transactions"]),
            allowed_columns: TRANSACTION_COLUMNS.iter().map(|s| s.to_string()).collect(),
            template_sql: Some(
                "SELECT merchant_name, SUM(ABS(amount)) AS total_spent, COUNT(*) AS txn_count \
                 FROM transactions WHERE user_id = :user_id AND pending = false AND amount < 0 \
                 AND COALESCE(posted_datetime, date) >= :start_date \
                 GROUP BY merchant_name ORDER BY total_spent DESC"
                    .to_string(),
            ),
            time_range: Some(TimeRangePolicy {
                start: "90 days ago".to_string(),
                end: "now".to_string(),
            }),
            notes: "ranked merchant aggregation".to_string(),
            conversational: false,
            skip_sql: false,
        },
    );

    m.insert(
        Intent::CategoryBreakdown,
        IntentContract {
            allowed_tables: tables(&["transactions"]),
            allowed_columns: TRANSACTION_COLUMNS.iter().map(|s| s.to_string()).collect(),
            template_sql: Some(
                "SELECT category, SUM(ABS(amount)) AS total_spent \
                 FROM transactions WHERE user_id = :user_id AND pending = false AND amount < 0 \
                 AND COALESCE(posted_datetime, date) >= :start_date \
                 GROUP BY category ORDER BY total_spent DESC"
                    .to_string(),
            ),
            time_range: Some(TimeRangePolicy {
                start: "30 days ago".to_string(),
                end: "now".to_string(),
            }),
            notes: "categorized spending breakdown".to_string(),
            conversational: false,
            skip_sql: false,
        },
    );

    m.insert(
        Intent::BalanceLookup,
        IntentContract {
            allowed_tables: tables(&["accounts"]),
            allowed_columns: ACCOUNT_COLUMNS.iter().map(|s| s.to_string()).collect(),
            template_sql: Some(
                "SELECT account_id, name, account_type, balance FROM accounts WHERE user_id = :user_id"
                    .to_string(),
            ),
            time_range: None,
            notes: "balance/net-worth questions always read accounts, never transactions".to_string(),
            conversational: false,
            skip_sql: false,
        },
    );

    for intent in [
        Intent::NetWorth,
        Intent::InvestmentAnalysis,
        Intent::RetirementPlanning,
        Intent::TaxPlanning,
        Intent::DebtAnalysis,
        Intent::GoalPlanning,
        Intent::SavingsAnalysis,
        Intent::BudgetAnalysis,
    ] {
        m.insert(
            intent,
            IntentContract {
                allowed_tables: HashSet::new(),
                allowed_columns: HashSet::new(),
                template_sql: None,
                time_range: None,
                notes: "answered entirely from the profile pack; no direct SQL".to_string(),
                conversational: false,
                skip_sql: true,
            },
        );
    }

    for intent in [Intent::Greeting, Intent::CasualConversation] {
        m.insert(
            intent,
            IntentContract {
                allowed_tables: HashSet::new(),
                allowed_columns: HashSet::new(),
                template_sql: None,
                time_range: None,
                notes: "conversational short-circuit, no profile pack or SQL".to_string(),
                conversational: true,
                skip_sql: true,
            },
        );
    }

    m.insert(
        Intent::Unknown,
        IntentContract {
            allowed_tables: HashSet::new(),
            allowed_columns: HashSet::new(),
            template_sql: None,
            time_range: None,
            notes: "unclassified question; no SQL attempted".to_string(),
            conversational: false,
            skip_sql: true,
        },
    );

    m
});

/// Looks up the static contract for `intent`. Every `Intent` variant has an
/// entry, so this never falls through to a default.
pub fn contract_for(intent: Intent) -> IntentContract {
    CONTRACTS
        .get(&intent)
        .cloned()
        .unwrap_or_else(|| IntentContract {
            allowed_tables: HashSet::new(),
            allowed_columns: HashSet::new(),
            template_sql: None,
            time_range: None,
            notes: "no contract registered".to_string(),
            conversational: false,
            skip_sql: true,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_lookup_only_allows_accounts_table() {
        let contract = contract_for(Intent::BalanceLookup);
        assert!(contract.allowed_tables.contains("accounts"));
        assert!(!contract.allowed_tables.contains("transactions"));
    }

    #[test]
    fn greeting_is_conversational_and_skips_sql() {
        let contract = contract_for(Intent::Greeting);
        assert!(contract.conversational);
        assert!(contract.skip_sql);
    }

    #[test]
    fn net_worth_skips_sql_in_favor_of_profile_pack() {
        let contract = contract_for(Intent::NetWorth);
        assert!(contract.skip_sql);
        assert!(!contract.conversational);
    }

    #[test]
    fn every_intent_variant_has_a_contract() {
        let all = [
            Intent::TransactionSearch,
            Intent::SpendByTime,
            Intent::TopMerchants,
            Intent::CategoryBreakdown,
            Intent::BalanceLookup,
            Intent::NetWorth,
            Intent::InvestmentAnalysis,
            Intent::RetirementPlanning,
            Intent::TaxPlanning,
            Intent::DebtAnalysis,
            Intent::GoalPlanning,
            Intent::SavingsAnalysis,
            Intent::BudgetAnalysis,
            Intent::Greeting,
            Intent::CasualConversation,
            Intent::Unknown,
        ];
        for intent in all {
            assert!(CONTRACTS.contains_key(&intent), "{:?} missing", intent);
        }
    }
}

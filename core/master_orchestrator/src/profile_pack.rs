//! Profile Pack Builder: assembles the bounded financial snapshot
//! ([`ProfilePack`]) that every modeling and conversational answer is
//! grounded in.
//!
//! Four steps: check the cache, query the finance database for each
//! section under the user's caps, compute derived metrics off the raw
//! sections, then cache the assembled pack. Lightweight intents
//! (balance/transaction lookups) skip straight past this builder entirely
//! in the orchestrator -- they don't need a full pack.

use serde_json::Value;
use shared_types::{
    Account, Budgets, CoreResult, DerivedMetrics, Goal, Holding, ManualAsset, ManualLiability,
    ProfilePack, RecentTransaction, RecurringIncome, UserCore, MAX_ACCOUNTS, MAX_GOALS,
    MAX_HOLDINGS, MAX_MANUAL_ASSETS, MAX_MANUAL_LIABILITIES,
};
use std::collections::HashMap;

use crate::cache_service;
use crate::db::FinanceDb;

const RECENT_TRANSACTION_LIMIT: usize = 50;
const PROFILE_PACK_TTL_MINUTES: u64 = 15;

/// Builds (or returns a cached) `ProfilePack` for `user_id`. `intent_class`
/// scopes the cache key since different intents may eventually want
/// different slices of the same user's data; today every intent gets the
/// full pack, but the cache key already reflects intent-class granularity.
pub async fn build(db: &FinanceDb, user_id: &str, intent_class: &str) -> CoreResult<ProfilePack> {
    if let Some(cached) = cache_service::get_cached_profile_pack(user_id, intent_class) {
        return Ok(cached);
    }

    let user_core = fetch_user_core(db, user_id).await?;
    let accounts = fetch_accounts(db, user_id).await?;
    let manual_assets = fetch_manual_assets(db, user_id).await?;
    let manual_liabilities = fetch_manual_liabilities(db, user_id).await?;
    let goals = fetch_goals(db, user_id).await?;
    let holdings = fetch_holdings(db, user_id).await?;
    let budgets = fetch_budgets(db, user_id).await?;
    let recurring_income = fetch_recurring_income(db, user_id).await?;
    let recent_transactions = fetch_recent_transactions(db, user_id).await?;

    let derived_metrics = compute_derived_metrics(
        &accounts,
        &manual_assets,
        &manual_liabilities,
        &holdings,
        &recurring_income,
        &recent_transactions,
    );

    let pack = ProfilePack {
        user_id: user_id.to_string(),
        user_core,
        accounts,
        manual_assets,
        manual_liabilities,
        goals,
        holdings,
        budgets,
        recurring_income,
        recent_transactions,
        derived_metrics,
        generated_at: chrono::Utc::now().to_rfc3339(),
    };

    cache_service::cache_profile_pack(user_id, intent_class, pack.clone(), PROFILE_PACK_TTL_MINUTES);
    Ok(pack)
}

fn str_param(user_id: &str) -> HashMap<String, Value> {
    let mut p = HashMap::new();
    p.insert("user_id".to_string(), Value::String(user_id.to_string()));
    p
}

fn get_str(row: &[Value], idx: usize) -> Option<String> {
    row.get(idx).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn get_f64(row: &[Value], idx: usize) -> f64 {
    row.get(idx).and_then(|v| v.as_f64()).unwrap_or(0.0)
}

fn get_opt_f64(row: &[Value], idx: usize) -> Option<f64> {
    row.get(idx).and_then(|v| v.as_f64())
}

async fn fetch_user_core(db: &FinanceDb, user_id: &str) -> CoreResult<UserCore> {
    let result = db
        .execute_query(
            "SELECT first_name, last_name, age, marital_status, dependents, \
             federal_tax_rate, state_tax_rate, risk_tolerance FROM users WHERE user_id = :user_id LIMIT 1",
            str_param(user_id),
        )
        .await?;
    let Some(row) = result.rows.first() else {
        return Ok(UserCore::default());
    };
    Ok(UserCore {
        first_name: get_str(row, 0),
        last_name: get_str(row, 1),
        age: row.get(2).and_then(|v| v.as_u64()).map(|v| v as u32),
        marital_status: get_str(row, 3),
        dependents: row.get(4).and_then(|v| v.as_u64()).map(|v| v as u32),
        federal_tax_rate: get_opt_f64(row, 5),
        state_tax_rate: get_opt_f64(row, 6),
        risk_tolerance: get_str(row, 7),
    })
}

async fn fetch_accounts(db: &FinanceDb, user_id: &str) -> CoreResult<Vec<Account>> {
    let result = db
        .execute_query(
            &format!(
                "SELECT account_id, name, account_type, balance, institution \
                 FROM accounts WHERE user_id = :user_id LIMIT {}",
                MAX_ACCOUNTS
            ),
            str_param(user_id),
        )
        .await?;
    Ok(result
        .rows
        .iter()
        .filter_map(|row| {
            Some(Account {
                account_id: get_str(row, 0)?,
                name: get_str(row, 1)?,
                account_type: get_str(row, 2)?,
                balance: get_f64(row, 3),
                institution: get_str(row, 4),
            })
        })
        .collect())
}

async fn fetch_manual_assets(db: &FinanceDb, user_id: &str) -> CoreResult<Vec<ManualAsset>> {
    let result = db
        .execute_query(
            &format!(
                "SELECT asset_id, name, value, category FROM manual_assets \
                 WHERE user_id = :user_id LIMIT {}",
                MAX_MANUAL_ASSETS
            ),
            str_param(user_id),
        )
        .await?;
    Ok(result
        .rows
        .iter()
        .filter_map(|row| {
            Some(ManualAsset {
                asset_id: get_str(row, 0)?,
                name: get_str(row, 1)?,
                value: get_f64(row, 2),
                category: get_str(row, 3),
            })
        })
        .collect())
}

async fn fetch_manual_liabilities(db: &FinanceDb, user_id: &str) -> CoreResult<Vec<ManualLiability>> {
    let result = db
        .execute_query(
            &format!(
                "SELECT liability_id, name, balance, interest_rate, minimum_payment \
                 FROM manual_liabilities WHERE user_id = :user_id LIMIT {}",
                MAX_MANUAL_LIABILITIES
            ),
            str_param(user_id),
        )
        .await?;
    Ok(result
        .rows
        .iter()
        .filter_map(|row| {
            Some(ManualLiability {
                liability_id: get_str(row, 0)?,
                name: get_str(row, 1)?,
                balance: get_f64(row, 2),
                interest_rate: get_opt_f64(row, 3),
                minimum_payment: get_opt_f64(row, 4),
            })
        })
        .collect())
}

async fn fetch_goals(db: &FinanceDb, user_id: &str) -> CoreResult<Vec<Goal>> {
    let result = db
        .execute_query(
            &format!(
                "SELECT goal_id, name, target_amount, current_amount, target_date \
                 FROM goals WHERE user_id = :user_id LIMIT {}",
                MAX_GOALS
            ),
            str_param(user_id),
        )
        .await?;
    Ok(result
        .rows
        .iter()
        .filter_map(|row| {
            Some(Goal {
                goal_id: get_str(row, 0)?,
                name: get_str(row, 1)?,
                target_amount: get_f64(row, 2),
                current_amount: get_f64(row, 3),
                target_date: get_str(row, 4),
            })
        })
        .collect())
}

async fn fetch_holdings(db: &FinanceDb, user_id: &str) -> CoreResult<Vec<Holding>> {
    let result = db
        .execute_query(
            &format!(
                "SELECT holding_id, security_name, quantity, current_value, asset_class \
                 FROM holdings_current WHERE user_id = :user_id LIMIT {}",
                MAX_HOLDINGS
            ),
            str_param(user_id),
        )
        .await?;
    Ok(result
        .rows
        .iter()
        .filter_map(|row| {
            Some(Holding {
                holding_id: get_str(row, 0)?,
                security_name: get_str(row, 1)?,
                quantity: get_f64(row, 2),
                current_value: get_f64(row, 3),
                asset_class: get_str(row, 4),
            })
        })
        .collect())
}

async fn fetch_budgets(db: &FinanceDb, user_id: &str) -> CoreResult<Budgets> {
    let result = db
        .execute_query(
            "SELECT category, budgeted_amount, spent_amount FROM budgets WHERE user_id = :user_id",
            str_param(user_id),
        )
        .await?;
    let categories = result
        .rows
        .iter()
        .filter_map(|row| {
            Some(shared_types::BudgetCategory {
                category: get_str(row, 0)?,
                budgeted_amount: get_f64(row, 1),
                spent_amount: get_f64(row, 2),
            })
        })
        .collect();
    Ok(Budgets { categories })
}

async fn fetch_recurring_income(db: &FinanceDb, user_id: &str) -> CoreResult<Vec<RecurringIncome>> {
    let result = db
        .execute_query(
            "SELECT source, monthly_amount, frequency FROM recurring_income WHERE user_id = :user_id",
            str_param(user_id),
        )
        .await?;
    Ok(result
        .rows
        .iter()
        .filter_map(|row| {
            Some(RecurringIncome {
                source: get_str(row, 0)?,
                monthly_amount: get_f64(row, 1),
                frequency: get_str(row, 2),
            })
        })
        .collect())
}

async fn fetch_recent_transactions(db: &FinanceDb, user_id: &str) -> CoreResult<Vec<RecentTransaction>> {
    let result = db
        .execute_query(
            &format!(
                "SELECT transaction_id, date, merchant_name, amount, category, pending \
                 FROM transactions WHERE user_id = :user_id \
                 ORDER BY COALESCE(posted_datetime, date) DESC LIMIT {}",
                RECENT_TRANSACTION_LIMIT
            ),
            str_param(user_id),
        )
        .await?;
    Ok(result
        .rows
        .iter()
        .filter_map(|row| {
            Some(RecentTransaction {
                transaction_id: get_str(row, 0)?,
                date: get_str(row, 1)?,
                merchant_name: get_str(row, 2),
                amount: get_f64(row, 3),
                category: get_str(row, 4),
                pending: row.get(5).and_then(|v| v.as_bool()).unwrap_or(false),
            })
        })
        .collect())
}

fn compute_derived_metrics(
    accounts: &[Account],
    manual_assets: &[ManualAsset],
    manual_liabilities: &[ManualLiability],
    holdings: &[Holding],
    recurring_income: &[RecurringIncome],
    recent_transactions: &[RecentTransaction],
) -> DerivedMetrics {
    let account_assets: f64 = accounts.iter().map(|a| a.balance.max(0.0)).sum();
    let account_liabilities: f64 = accounts.iter().map(|a| a.balance.min(0.0).abs()).sum();
    let asset_total: f64 = account_assets
        + manual_assets.iter().map(|a| a.value).sum::<f64>()
        + holdings.iter().map(|h| h.current_value).sum::<f64>();
    let liability_total: f64 =
        account_liabilities + manual_liabilities.iter().map(|l| l.balance).sum::<f64>();

    let avg_monthly_income_3m = recurring_income.iter().map(|r| r.monthly_amount).sum::<f64>();

    let monthly_expense = recent_transactions
        .iter()
        .filter(|t| !t.pending && t.amount < 0.0)
        .map(|t| t.amount.abs())
        .sum::<f64>()
        / 3.0_f64.max(1.0);

    let liquid_assets: f64 = accounts
        .iter()
        .filter(|a| a.account_type.to_lowercase().contains("checking") || a.account_type.to_lowercase().contains("savings"))
        .map(|a| a.balance.max(0.0))
        .sum();

    let monthly_debt_minimums: f64 = manual_liabilities
        .iter()
        .filter_map(|l| l.minimum_payment)
        .sum();

    DerivedMetrics {
        net_worth: asset_total - liability_total,
        total_assets: asset_total,
        total_liabilities: liability_total,
        avg_monthly_income_3m,
        avg_monthly_expense_3m: monthly_expense,
        savings_rate_3m: if avg_monthly_income_3m > 0.0 {
            Some((avg_monthly_income_3m - monthly_expense) / avg_monthly_income_3m)
        } else {
            None
        },
        savings_rate_6m: None,
        savings_rate_12m: None,
        liquid_reserves_months: if monthly_expense > 0.0 {
            Some(liquid_assets / monthly_expense)
        } else {
            None
        },
        debt_to_income: if avg_monthly_income_3m > 0.0 {
            Some(monthly_debt_minimums / avg_monthly_income_3m)
        } else {
            None
        },
        income_volatility: None,
        spending_volatility: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_db() -> FinanceDb {
        let db = FinanceDb::new(":memory:").unwrap();
        db.seed_schema(
            "CREATE TABLE users (user_id TEXT, first_name TEXT, last_name TEXT, age INTEGER,
                marital_status TEXT, dependents INTEGER, federal_tax_rate REAL, state_tax_rate REAL,
                risk_tolerance TEXT);
             CREATE TABLE accounts (account_id TEXT, user_id TEXT, name TEXT, account_type TEXT,
                balance REAL, institution TEXT);
             CREATE TABLE manual_assets (asset_id TEXT, user_id TEXT, name TEXT, value REAL, category TEXT);
             CREATE TABLE manual_liabilities (liability_id TEXT, user_id TEXT, name TEXT, balance REAL,
                interest_rate REAL, minimum_payment REAL);
             CREATE TABLE goals (goal_id TEXT, user_id TEXT, name TEXT, target_amount REAL,
                current_amount REAL, target_date TEXT);
             CREATE TABLE holdings_current (holding_id TEXT, user_id TEXT, security_name TEXT,
                quantity REAL, current_value REAL, asset_class TEXT);
             CREATE TABLE budgets (user_id TEXT, category TEXT, budgeted_amount REAL, spent_amount REAL);
             CREATE TABLE recurring_income (user_id TEXT, source TEXT, monthly_amount REAL, frequency TEXT);
             CREATE TABLE transactions (transaction_id TEXT, user_id TEXT, date TEXT, posted_datetime TEXT,
                merchant_name TEXT, amount REAL, category TEXT, pending INTEGER);
             INSERT INTO accounts VALUES ('a1', 'u1', 'Checking', 'checking', 5000.0, 'Bank');
             INSERT INTO recurring_income VALUES ('u1', 'Job', 6000.0, 'monthly');
             INSERT INTO transactions VALUES ('t1', 'u1', '2025-09-01', NULL, 'Store', -100.0, 'shopping', 0);",
        );
        db
    }

    #[tokio::test]
    async fn build_assembles_pack_from_all_sections() {
        let db = seeded_db();
        let pack = build(&db, "u1", "net_worth").await.unwrap();
        assert_eq!(pack.accounts.len(), 1);
        assert_eq!(pack.recurring_income.len(), 1);
        assert!(pack.derived_metrics.net_worth > 0.0);
    }

    #[tokio::test]
    async fn build_returns_default_user_core_when_absent() {
        let db = seeded_db();
        let pack = build(&db, "nobody", "net_worth").await.unwrap();
        assert!(pack.user_core.first_name.is_none());
        assert!(pack.accounts.is_empty());
    }
}

use serde::{Deserialize, Serialize};

pub const MAX_ACCOUNTS: usize = 200;
pub const MAX_MANUAL_ASSETS: usize = 100;
pub const MAX_MANUAL_LIABILITIES: usize = 100;
pub const MAX_GOALS: usize = 50;
pub const MAX_HOLDINGS: usize = 500;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UserCore {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<u32>,
    pub marital_status: Option<String>,
    pub dependents: Option<u32>,
    pub federal_tax_rate: Option<f64>,
    pub state_tax_rate: Option<f64>,
    pub risk_tolerance: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Account {
    pub account_id: String,
    pub name: String,
    pub account_type: String,
    pub balance: f64,
    #[serde(default)]
    pub institution: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ManualAsset {
    pub asset_id: String,
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ManualLiability {
    pub liability_id: String,
    pub name: String,
    pub balance: f64,
    #[serde(default)]
    pub interest_rate: Option<f64>,
    #[serde(default)]
    pub minimum_payment: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Goal {
    pub goal_id: String,
    pub name: String,
    pub target_amount: f64,
    pub current_amount: f64,
    #[serde(default)]
    pub target_date: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Holding {
    pub holding_id: String,
    pub security_name: String,
    pub quantity: f64,
    pub current_value: f64,
    #[serde(default)]
    pub asset_class: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct BudgetCategory {
    pub category: String,
    pub budgeted_amount: f64,
    pub spent_amount: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Budgets {
    #[serde(default)]
    pub categories: Vec<BudgetCategory>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RecurringIncome {
    pub source: String,
    pub monthly_amount: f64,
    #[serde(default)]
    pub frequency: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RecentTransaction {
    pub transaction_id: String,
    pub date: String,
    pub merchant_name: Option<String>,
    pub amount: f64,
    pub category: Option<String>,
    pub pending: bool,
}

/// Metrics computed from the raw rows above; never persisted, always
/// recomputed fresh when the pack is (re)built.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct DerivedMetrics {
    pub net_worth: f64,
    pub total_assets: f64,
    pub total_liabilities: f64,
    pub avg_monthly_income_3m: f64,
    pub avg_monthly_expense_3m: f64,
    pub savings_rate_3m: Option<f64>,
    pub savings_rate_6m: Option<f64>,
    pub savings_rate_12m: Option<f64>,
    pub liquid_reserves_months: Option<f64>,
    pub debt_to_income: Option<f64>,
    pub income_volatility: Option<f64>,
    pub spending_volatility: Option<f64>,
}

/// A bounded, cached, tenant-scoped financial snapshot. Read-only: every
/// downstream consumer must copy before mutating.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ProfilePack {
    pub user_id: String,
    pub user_core: UserCore,
    pub accounts: Vec<Account>,
    pub manual_assets: Vec<ManualAsset>,
    pub manual_liabilities: Vec<ManualLiability>,
    pub goals: Vec<Goal>,
    pub holdings: Vec<Holding>,
    pub budgets: Budgets,
    pub recurring_income: Vec<RecurringIncome>,
    pub recent_transactions: Vec<RecentTransaction>,
    pub derived_metrics: DerivedMetrics,
    pub generated_at: String,
}

impl ProfilePack {
    /// Rough JSON size check against the ~120 KB budget. Used by tests and
    /// by observability, not on the hot path.
    pub fn approx_json_bytes(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }

    pub fn respects_caps(&self) -> bool {
        self.accounts.len() <= MAX_ACCOUNTS
            && self.manual_assets.len() <= MAX_MANUAL_ASSETS
            && self.manual_liabilities.len() <= MAX_MANUAL_LIABILITIES
            && self.goals.len() <= MAX_GOALS
            && self.holdings.len() <= MAX_HOLDINGS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_pack() -> ProfilePack {
        ProfilePack {
            user_id: "u1".into(),
            user_core: UserCore::default(),
            accounts: Vec::new(),
            manual_assets: Vec::new(),
            manual_liabilities: Vec::new(),
            goals: Vec::new(),
            holdings: Vec::new(),
            budgets: Budgets::default(),
            recurring_income: Vec::new(),
            recent_transactions: Vec::new(),
            derived_metrics: DerivedMetrics::default(),
            generated_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn empty_pack_respects_caps() {
        assert!(empty_pack().respects_caps());
    }

    #[test]
    fn oversized_accounts_violates_cap() {
        let mut pack = empty_pack();
        for i in 0..(MAX_ACCOUNTS + 1) {
            pack.accounts.push(Account {
                account_id: i.to_string(),
                name: "a".into(),
                account_type: "checking".into(),
                balance: 0.0,
                institution: None,
            });
        }
        assert!(!pack.respects_caps());
    }
}

use serde::{Deserialize, Serialize};

/// Closed set of intents the planner can classify a question into.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    TransactionSearch,
    SpendByTime,
    TopMerchants,
    CategoryBreakdown,
    BalanceLookup,
    NetWorth,
    InvestmentAnalysis,
    RetirementPlanning,
    TaxPlanning,
    DebtAnalysis,
    GoalPlanning,
    SavingsAnalysis,
    BudgetAnalysis,
    Greeting,
    CasualConversation,
    Unknown,
}

impl Intent {
    /// Whether this intent short-circuits before any SQL or profile pack work.
    pub fn is_conversational(self) -> bool {
        matches!(self, Intent::Greeting | Intent::CasualConversation)
    }

    /// Whether this intent only needs a lightweight profile pack (skips
    /// holdings, goals, assets, and volatility calculations).
    pub fn is_lightweight(self) -> bool {
        matches!(
            self,
            Intent::BalanceLookup | Intent::TransactionSearch | Intent::CategoryBreakdown
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Intent::TransactionSearch => "transaction_search",
            Intent::SpendByTime => "spend_by_time",
            Intent::TopMerchants => "top_merchants",
            Intent::CategoryBreakdown => "category_breakdown",
            Intent::BalanceLookup => "balance_lookup",
            Intent::NetWorth => "net_worth",
            Intent::InvestmentAnalysis => "investment_analysis",
            Intent::RetirementPlanning => "retirement_planning",
            Intent::TaxPlanning => "tax_planning",
            Intent::DebtAnalysis => "debt_analysis",
            Intent::GoalPlanning => "goal_planning",
            Intent::SavingsAnalysis => "savings_analysis",
            Intent::BudgetAnalysis => "budget_analysis",
            Intent::Greeting => "greeting",
            Intent::CasualConversation => "casual_conversation",
            Intent::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Comparison operator for an extracted amount filter.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AmountOp {
    Gt,
    Lt,
    Eq,
    Between,
}

/// One amount constraint extracted from the question, e.g. "over $200".
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AmountFilter {
    pub op: AmountOp,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

/// A date range, either explicit bounds or a symbolic default like "90d".
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct DateRange {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub default: Option<String>,
}

/// Entities extracted from a natural-language question.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Entities {
    #[serde(default)]
    pub merchants: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub date_range: Option<DateRange>,
    #[serde(default)]
    pub amount_filters: Vec<AmountFilter>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_round_trips_snake_case() {
        let json = serde_json::to_string(&Intent::SpendByTime).unwrap();
        assert_eq!(json, "\"spend_by_time\"");
        let back: Intent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Intent::SpendByTime);
    }

    #[test]
    fn greeting_and_casual_are_conversational() {
        assert!(Intent::Greeting.is_conversational());
        assert!(Intent::CasualConversation.is_conversational());
        assert!(!Intent::BalanceLookup.is_conversational());
    }

    #[test]
    fn lightweight_intents_skip_heavy_metrics() {
        assert!(Intent::BalanceLookup.is_lightweight());
        assert!(!Intent::RetirementPlanning.is_lightweight());
    }
}

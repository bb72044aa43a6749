//! Deterministic modeling-kind router.
//!
//! Maps a resolved `Intent` onto the calculation family it needs. This is
//! the fallback path used when the Planner's LLM call fails, times out, or
//! returns a low-confidence plan -- it never calls an LLM itself, so it is
//! always available and its output is always the same for the same intent.

use serde::{Deserialize, Serialize};
use shared_types::Intent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelingKind {
    PortfolioProjection,
    RetirementAdequacy,
    GoalAchievement,
    StressTest,
    ClosedForm,
    None,
}

pub fn route_modeling_request(intent: Intent) -> ModelingKind {
    match intent {
        Intent::InvestmentAnalysis => ModelingKind::PortfolioProjection,
        Intent::RetirementPlanning => ModelingKind::RetirementAdequacy,
        Intent::GoalPlanning => ModelingKind::GoalAchievement,
        Intent::TaxPlanning | Intent::DebtAnalysis => ModelingKind::ClosedForm,
        Intent::NetWorth | Intent::SavingsAnalysis | Intent::BudgetAnalysis => {
            ModelingKind::ClosedForm
        }
        Intent::TransactionSearch
        | Intent::SpendByTime
        | Intent::TopMerchants
        | Intent::CategoryBreakdown
        | Intent::BalanceLookup
        | Intent::Greeting
        | Intent::CasualConversation
        | Intent::Unknown => ModelingKind::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retirement_planning_routes_to_retirement_adequacy() {
        assert_eq!(
            route_modeling_request(Intent::RetirementPlanning),
            ModelingKind::RetirementAdequacy
        );
    }

    #[test]
    fn transaction_search_needs_no_modeling() {
        assert_eq!(route_modeling_request(Intent::TransactionSearch), ModelingKind::None);
    }

    #[test]
    fn greeting_needs_no_modeling() {
        assert_eq!(route_modeling_request(Intent::Greeting), ModelingKind::None);
    }
}

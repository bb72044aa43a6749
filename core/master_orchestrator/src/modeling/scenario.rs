//! What-if scenario comparison: re-runs a simulation under one or more
//! adjusted assumptions and reports the delta against the baseline.

use crate::modeling::calculators::{debt_payoff, Debt, DebtPayoffResult, DebtStrategy};
use crate::modeling::monte_carlo::{GoalAchievementResult, MonteCarloEngine, RetirementAdequacyResult};
use serde::{Deserialize, Serialize};
use shared_types::CoreResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalScenarioInput {
    pub label: String,
    pub current_value: f64,
    pub target_value: f64,
    pub years: u32,
    pub monthly_contribution: f64,
    pub expected_return: f64,
    pub volatility: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioComparisonEntry {
    pub label: String,
    pub result: GoalAchievementResult,
    pub success_rate_delta_vs_baseline: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioComparison {
    pub baseline: ScenarioComparisonEntry,
    pub variants: Vec<ScenarioComparisonEntry>,
}

/// Runs `baseline` plus every entry in `variants` through the same seeded
/// engine and reports each variant's success-rate delta against baseline.
pub fn compare_goal_scenarios(
    engine: &MonteCarloEngine,
    baseline: GoalScenarioInput,
    variants: Vec<GoalScenarioInput>,
) -> CoreResult<ScenarioComparison> {
    let baseline_result = engine.simulate_goal_achievement(
        baseline.current_value,
        baseline.target_value,
        baseline.years,
        baseline.monthly_contribution,
        baseline.expected_return,
        baseline.volatility,
    )?;
    let baseline_rate = baseline_result.success_rate;

    let mut entries = Vec::with_capacity(variants.len());
    for variant in variants {
        let result = engine.simulate_goal_achievement(
            variant.current_value,
            variant.target_value,
            variant.years,
            variant.monthly_contribution,
            variant.expected_return,
            variant.volatility,
        )?;
        entries.push(ScenarioComparisonEntry {
            label: variant.label,
            success_rate_delta_vs_baseline: result.success_rate - baseline_rate,
            result,
        });
    }

    Ok(ScenarioComparison {
        baseline: ScenarioComparisonEntry {
            label: baseline.label,
            success_rate_delta_vs_baseline: 0.0,
            result: baseline_result,
        },
        variants: entries,
    })
}

/// Named monthly-contribution multipliers for the four savings postures a
/// user can be compared across. FIRE assumes an aggressive redirection of
/// discretionary income toward early retirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavingsStrategy {
    Conservative,
    Moderate,
    Aggressive,
    Fire,
}

impl SavingsStrategy {
    fn contribution_multiplier(self) -> f64 {
        match self {
            SavingsStrategy::Conservative => 0.5,
            SavingsStrategy::Moderate => 1.0,
            SavingsStrategy::Aggressive => 1.5,
            SavingsStrategy::Fire => 2.5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SavingsStrategy::Conservative => "conservative",
            SavingsStrategy::Moderate => "moderate",
            SavingsStrategy::Aggressive => "aggressive",
            SavingsStrategy::Fire => "FIRE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingsStrategyEntry {
    pub label: String,
    pub monthly_contribution: f64,
    pub result: GoalAchievementResult,
}

/// Compares a goal's outcome under each of the four savings postures,
/// scaling `baseline.monthly_contribution` by each strategy's multiplier.
pub fn compare_savings_strategies(
    engine: &MonteCarloEngine,
    baseline: &GoalScenarioInput,
    strategies: &[SavingsStrategy],
) -> CoreResult<Vec<SavingsStrategyEntry>> {
    let mut entries = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        let monthly_contribution = baseline.monthly_contribution * strategy.contribution_multiplier();
        let result = engine.simulate_goal_achievement(
            baseline.current_value,
            baseline.target_value,
            baseline.years,
            monthly_contribution,
            baseline.expected_return,
            baseline.volatility,
        )?;
        entries.push(SavingsStrategyEntry {
            label: strategy.label().to_string(),
            monthly_contribution,
            result,
        });
    }
    Ok(entries)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtStrategyEntry {
    pub strategy: String,
    pub months_to_payoff: u32,
    pub total_interest_paid: f64,
}

/// Compares avalanche vs. snowball vs. minimum-only payoff of the same debt
/// set under the same extra monthly payment.
pub fn compare_debt_strategies(debts: &[Debt], extra: f64) -> CoreResult<Vec<DebtStrategyEntry>> {
    let avalanche = debt_payoff(debts, extra, DebtStrategy::Avalanche)?;
    let snowball = debt_payoff(debts, extra, DebtStrategy::Snowball)?;
    let minimum_only: DebtPayoffResult = debt_payoff(debts, 0.0, DebtStrategy::Avalanche)?;

    Ok(vec![
        DebtStrategyEntry {
            strategy: "avalanche".to_string(),
            months_to_payoff: avalanche.months_to_payoff,
            total_interest_paid: avalanche.total_interest_paid,
        },
        DebtStrategyEntry {
            strategy: "snowball".to_string(),
            months_to_payoff: snowball.months_to_payoff,
            total_interest_paid: snowball.total_interest_paid,
        },
        DebtStrategyEntry {
            strategy: "minimum".to_string(),
            months_to_payoff: minimum_only.months_to_payoff,
            total_interest_paid: minimum_only.total_interest_paid,
        },
    ])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetirementTiming {
    Early,
    Standard,
    Late,
    Coast,
}

impl RetirementTiming {
    fn age_offset(self) -> i32 {
        match self {
            RetirementTiming::Early => -5,
            RetirementTiming::Standard => 0,
            RetirementTiming::Late => 5,
            RetirementTiming::Coast => 0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RetirementTiming::Early => "early",
            RetirementTiming::Standard => "standard",
            RetirementTiming::Late => "late",
            RetirementTiming::Coast => "coast",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetirementScenarioEntry {
    pub label: String,
    pub retirement_age: u32,
    pub result: RetirementAdequacyResult,
}

/// Compares retirement outcomes across early/standard/late retirement ages
/// and a "coast" variant where contributions stop at the standard age's
/// halfway point but the retirement date itself doesn't move.
#[allow(clippy::too_many_arguments)]
pub fn compare_retirement_scenarios(
    engine: &MonteCarloEngine,
    current_age: u32,
    standard_retirement_age: u32,
    life_expectancy: u32,
    current_savings: f64,
    monthly_contribution: f64,
    annual_expenses_retirement: f64,
    pre_retirement_return: f64,
    post_retirement_return: f64,
    inflation_rate: f64,
    volatility_pre: f64,
    volatility_post: f64,
    timings: &[RetirementTiming],
) -> CoreResult<Vec<RetirementScenarioEntry>> {
    let mut entries = Vec::with_capacity(timings.len());
    for timing in timings {
        let retirement_age =
            (standard_retirement_age as i32 + timing.age_offset()).max(current_age as i32 + 1) as u32;
        let contribution = if *timing == RetirementTiming::Coast {
            monthly_contribution * 0.5
        } else {
            monthly_contribution
        };
        let result = engine.simulate_retirement_adequacy(
            current_age,
            retirement_age,
            life_expectancy,
            current_savings,
            contribution,
            annual_expenses_retirement,
            pre_retirement_return,
            post_retirement_return,
            inflation_rate,
            volatility_pre,
            volatility_post,
        )?;
        entries.push(RetirementScenarioEntry {
            label: timing.label().to_string(),
            retirement_age,
            result,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_contribution_variant_improves_success_rate() {
        let engine = MonteCarloEngine::new(200, 11);
        let baseline = GoalScenarioInput {
            label: "current plan".to_string(),
            current_value: 0.0,
            target_value: 50_000.0,
            years: 5,
            monthly_contribution: 200.0,
            expected_return: 0.07,
            volatility: 0.15,
        };
        let variant = GoalScenarioInput {
            label: "save $100 more per month".to_string(),
            monthly_contribution: 300.0,
            ..baseline.clone()
        };
        let comparison = compare_goal_scenarios(&engine, baseline, vec![variant]).unwrap();
        assert_eq!(comparison.variants.len(), 1);
        assert!(comparison.variants[0].success_rate_delta_vs_baseline >= 0.0);
    }

    #[test]
    fn savings_strategies_scale_contribution_by_posture() {
        let engine = MonteCarloEngine::new(200, 5);
        let baseline = GoalScenarioInput {
            label: "baseline".to_string(),
            current_value: 10_000.0,
            target_value: 60_000.0,
            years: 8,
            monthly_contribution: 200.0,
            expected_return: 0.07,
            volatility: 0.15,
        };
        let entries = compare_savings_strategies(
            &engine,
            &baseline,
            &[
                SavingsStrategy::Conservative,
                SavingsStrategy::Moderate,
                SavingsStrategy::Aggressive,
                SavingsStrategy::Fire,
            ],
        )
        .unwrap();
        assert_eq!(entries.len(), 4);
        assert!(entries[3].monthly_contribution > entries[0].monthly_contribution);
    }

    #[test]
    fn debt_strategies_report_three_variants() {
        let debts = vec![
            Debt {
                name: "card".to_string(),
                balance: 8_000.0,
                annual_rate: 0.22,
                minimum_payment: 200.0,
            },
            Debt {
                name: "auto".to_string(),
                balance: 2_500.0,
                annual_rate: 0.06,
                minimum_payment: 60.0,
            },
        ];
        let entries = compare_debt_strategies(&debts, 300.0).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().any(|e| e.strategy == "minimum"));
    }

    #[test]
    fn retirement_scenarios_vary_retirement_age_by_timing() {
        let engine = MonteCarloEngine::new(50, 9);
        let entries = compare_retirement_scenarios(
            &engine,
            35,
            65,
            90,
            95_000.0,
            1_500.0,
            84_000.0,
            0.07,
            0.04,
            0.03,
            0.15,
            0.08,
            &[
                RetirementTiming::Early,
                RetirementTiming::Standard,
                RetirementTiming::Late,
                RetirementTiming::Coast,
            ],
        )
        .unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].retirement_age, 60);
        assert_eq!(entries[1].retirement_age, 65);
        assert_eq!(entries[2].retirement_age, 70);
        assert_eq!(entries[3].retirement_age, 65);
    }
}

//! Historical-scenario stress testing for a user's asset allocation.

use serde::{Deserialize, Serialize};
use shared_types::CoreResult;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetAllocation {
    pub stocks: f64,
    pub bonds: f64,
    pub real_estate: f64,
    pub commodities: f64,
    pub cash: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressScenario {
    pub name: String,
    pub stocks: f64,
    pub bonds: f64,
    pub real_estate: f64,
    pub commodities: f64,
    pub cash: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioImpact {
    pub scenario: String,
    pub portfolio_impact_pct: f64,
    pub dollar_loss: f64,
    pub recovery_months_estimate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub worst_case_loss: f64,
    pub average_loss: f64,
    pub value_at_risk_95: f64,
    pub max_drawdown: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressTestResult {
    pub scenarios: Vec<ScenarioImpact>,
    pub risk_metrics: RiskMetrics,
    pub recommendations: Vec<String>,
}

/// The five canonical historical scenarios used when the caller doesn't
/// supply its own.
pub fn default_scenarios() -> Vec<StressScenario> {
    vec![
        StressScenario {
            name: "2008 Financial Crisis".to_string(),
            stocks: -0.37,
            bonds: 0.05,
            real_estate: -0.20,
            commodities: -0.35,
            cash: 0.0,
        },
        StressScenario {
            name: "2020 COVID Crash".to_string(),
            stocks: -0.34,
            bonds: 0.08,
            real_estate: -0.15,
            commodities: -0.20,
            cash: 0.0,
        },
        StressScenario {
            name: "Dot-com Bubble (2000)".to_string(),
            stocks: -0.49,
            bonds: 0.11,
            real_estate: 0.05,
            commodities: 0.10,
            cash: 0.0,
        },
        StressScenario {
            name: "Stagflation (1970s style)".to_string(),
            stocks: -0.15,
            bonds: -0.10,
            real_estate: 0.08,
            commodities: 0.25,
            cash: -0.08,
        },
        StressScenario {
            name: "Rising Rates Environment".to_string(),
            stocks: -0.10,
            bonds: -0.15,
            real_estate: -0.12,
            commodities: 0.05,
            cash: 0.02,
        },
    ]
}

pub fn stress_test_portfolio(
    portfolio_value: f64,
    allocation: &AssetAllocation,
    scenarios: Option<Vec<StressScenario>>,
) -> CoreResult<StressTestResult> {
    let scenarios = scenarios.unwrap_or_else(default_scenarios);

    let impacts: Vec<ScenarioImpact> = scenarios
        .iter()
        .map(|s| {
            let impact_pct = allocation.stocks * s.stocks
                + allocation.bonds * s.bonds
                + allocation.real_estate * s.real_estate
                + allocation.commodities * s.commodities
                + allocation.cash * s.cash;
            let dollar_loss = portfolio_value * impact_pct;
            let recovery_months = if impact_pct < 0.0 {
                impact_pct.abs() * 24.0
            } else {
                0.0
            };
            ScenarioImpact {
                scenario: s.name.clone(),
                portfolio_impact_pct: impact_pct,
                dollar_loss,
                recovery_months_estimate: recovery_months,
            }
        })
        .collect();

    let losses: Vec<f64> = impacts
        .iter()
        .map(|i| i.portfolio_impact_pct)
        .filter(|p| *p < 0.0)
        .collect();

    let worst_case_loss = impacts
        .iter()
        .map(|i| i.portfolio_impact_pct)
        .fold(0.0_f64, |acc, v| acc.min(v));
    let average_loss = if losses.is_empty() {
        0.0
    } else {
        losses.iter().sum::<f64>() / losses.len() as f64
    };

    let mut sorted_impacts: Vec<f64> = impacts.iter().map(|i| i.portfolio_impact_pct).collect();
    sorted_impacts.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let var_95_idx = ((sorted_impacts.len() as f64) * 0.05).floor() as usize;
    let value_at_risk_95 = sorted_impacts.get(var_95_idx).copied().unwrap_or(worst_case_loss);

    let risk_metrics = RiskMetrics {
        worst_case_loss,
        average_loss,
        value_at_risk_95,
        max_drawdown: worst_case_loss,
    };

    let recommendations = stress_recommendations(&risk_metrics, allocation);

    Ok(StressTestResult {
        scenarios: impacts,
        risk_metrics,
        recommendations,
    })
}

fn stress_recommendations(metrics: &RiskMetrics, allocation: &AssetAllocation) -> Vec<String> {
    let mut recs = Vec::new();
    if metrics.worst_case_loss < -0.35 {
        recs.push(
            "Worst-case scenario losses exceed 35%. Consider diversifying away from concentrated equity exposure."
                .to_string(),
        );
    }
    if allocation.cash < 0.05 {
        recs.push("A small cash reserve can reduce forced selling during drawdowns.".to_string());
    }
    if recs.is_empty() {
        recs.push("Current allocation shows reasonable resilience across historical stress scenarios.".to_string());
    }
    recs
}

/// Builds an `AssetAllocation` from a raw holdings map keyed by asset class
/// name, normalizing weights to sum to 1.0.
pub fn allocation_from_weights(weights: &HashMap<String, f64>) -> AssetAllocation {
    let total: f64 = weights.values().sum();
    let norm = |k: &str| -> f64 {
        if total <= 0.0 {
            0.0
        } else {
            weights.get(k).copied().unwrap_or(0.0) / total
        }
    };
    AssetAllocation {
        stocks: norm("stocks"),
        bonds: norm("bonds"),
        real_estate: norm("real_estate"),
        commodities: norm("commodities"),
        cash: norm("cash"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_equity_allocation_suffers_in_2008_scenario() {
        let allocation = AssetAllocation {
            stocks: 1.0,
            bonds: 0.0,
            real_estate: 0.0,
            commodities: 0.0,
            cash: 0.0,
        };
        let result = stress_test_portfolio(100_000.0, &allocation, None).unwrap();
        let crisis = result
            .scenarios
            .iter()
            .find(|s| s.scenario == "2008 Financial Crisis")
            .unwrap();
        assert!((crisis.portfolio_impact_pct - (-0.37)).abs() < 1e-9);
        assert!(crisis.dollar_loss < 0.0);
    }

    #[test]
    fn cash_heavy_allocation_has_smaller_worst_case_loss() {
        let risky = AssetAllocation { stocks: 1.0, bonds: 0.0, real_estate: 0.0, commodities: 0.0, cash: 0.0 };
        let safe = AssetAllocation { stocks: 0.1, bonds: 0.2, real_estate: 0.0, commodities: 0.0, cash: 0.7 };
        let risky_result = stress_test_portfolio(100_000.0, &risky, None).unwrap();
        let safe_result = stress_test_portfolio(100_000.0, &safe, None).unwrap();
        assert!(safe_result.risk_metrics.worst_case_loss > risky_result.risk_metrics.worst_case_loss);
    }
}

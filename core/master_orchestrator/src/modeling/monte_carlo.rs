//! Seeded Monte-Carlo simulation engine.
//!
//! Every entry point takes an explicit seed so that two calls with the same
//! inputs produce bit-identical output -- the orchestrator's testable
//! property I-DETERMINISM depends on this. All dollar/percentage knobs are
//! annual; monthly stepping is used internally to match how real account
//! balances compound.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use shared_types::{CoreError, CoreResult};

const MONTHS_PER_YEAR: f64 = 12.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSummary {
    pub best: Vec<f64>,
    pub worst: Vec<f64>,
    pub median: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Percentiles {
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Probabilities {
    pub double: f64,
    pub triple: f64,
    pub million: f64,
    pub positive_return: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSimulationResult {
    pub statistics: Statistics,
    pub percentiles: Percentiles,
    pub probabilities: Probabilities,
    pub paths: PathSummary,
    pub num_simulations: u32,
    pub years: u32,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetirementAdequacyResult {
    pub success_rate: f64,
    pub median_depletion_age: Option<f64>,
    pub safe_withdrawal_monthly: f64,
    pub recommendations: Vec<String>,
    pub num_simulations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalAchievementResult {
    pub success_rate: f64,
    pub required_monthly_contribution: Option<f64>,
    pub statistics: Statistics,
}

pub struct MonteCarloEngine {
    pub num_simulations: u32,
    seed: u64,
}

impl MonteCarloEngine {
    pub fn new(num_simulations: u32, seed: u64) -> Self {
        Self {
            num_simulations: num_simulations.max(1),
            seed,
        }
    }

    fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed)
    }

    /// Simulates a portfolio's value path month by month over `years`,
    /// returning the aggregate statistics/percentiles/probabilities and the
    /// best/worst/median paths.
    pub fn simulate_portfolio_returns(
        &self,
        initial_value: f64,
        years: u32,
        expected_return: f64,
        volatility: f64,
        annual_contribution: f64,
        contribution_growth_rate: f64,
    ) -> CoreResult<PortfolioSimulationResult> {
        if years == 0 {
            return Err(CoreError::ModelingFailed {
                message: "years must be positive".to_string(),
            });
        }

        let months = years * 12;
        let monthly_return = expected_return / MONTHS_PER_YEAR;
        let monthly_volatility = volatility / MONTHS_PER_YEAR.sqrt();
        let normal = Normal::new(monthly_return, monthly_volatility.max(1e-9))
            .map_err(|e| CoreError::ModelingFailed { message: e.to_string() })?;

        let mut rng = self.rng();
        let mut finals = Vec::with_capacity(self.num_simulations as usize);
        let mut all_paths: Vec<Vec<f64>> = Vec::with_capacity(self.num_simulations as usize);

        for _ in 0..self.num_simulations {
            let mut value = initial_value;
            let mut monthly_contribution = annual_contribution / MONTHS_PER_YEAR;
            let mut path = Vec::with_capacity(months as usize + 1);
            path.push(value);

            for month in 1..=months {
                let r: f64 = normal.sample(&mut rng);
                value = value * (1.0 + r) + monthly_contribution;
                if month % 12 == 0 {
                    monthly_contribution *= 1.0 + contribution_growth_rate;
                }
                path.push(value);
            }

            finals.push(value);
            all_paths.push(path);
        }

        let statistics = compute_statistics(&finals);
        let percentiles = compute_percentiles(&finals);
        let probabilities = Probabilities {
            double: fraction_at_least(&finals, initial_value * 2.0),
            triple: fraction_at_least(&finals, initial_value * 3.0),
            million: fraction_at_least(&finals, 1_000_000.0),
            positive_return: fraction_at_least(&finals, initial_value),
        };

        let best_idx = argmax(&finals);
        let worst_idx = argmin(&finals);
        let median_idx = closest_to(&finals, statistics.median);

        Ok(PortfolioSimulationResult {
            statistics,
            percentiles,
            probabilities,
            paths: PathSummary {
                best: all_paths[best_idx].clone(),
                worst: all_paths[worst_idx].clone(),
                median: all_paths[median_idx].clone(),
            },
            num_simulations: self.num_simulations,
            years,
            seed: self.seed,
        })
    }

    /// Runs accumulation-then-distribution retirement adequacy simulation,
    /// binary searching for the safe monthly withdrawal that clears a 95%
    /// success rate.
    #[allow(clippy::too_many_arguments)]
    pub fn simulate_retirement_adequacy(
        &self,
        current_age: u32,
        retirement_age: u32,
        life_expectancy: u32,
        current_savings: f64,
        monthly_contribution: f64,
        annual_expenses_retirement: f64,
        pre_retirement_return: f64,
        post_retirement_return: f64,
        inflation_rate: f64,
        volatility_pre: f64,
        volatility_post: f64,
    ) -> CoreResult<RetirementAdequacyResult> {
        if retirement_age <= current_age || life_expectancy <= retirement_age {
            return Err(CoreError::ModelingFailed {
                message: "ages must satisfy current_age < retirement_age < life_expectancy"
                    .to_string(),
            });
        }

        let accumulation_months = (retirement_age - current_age) * 12;
        let distribution_months = (life_expectancy - retirement_age) * 12;

        let run = |monthly_withdrawal: f64, seed: u64| -> (f64, Vec<Option<u32>>) {
            let pre_normal = Normal::new(
                pre_retirement_return / MONTHS_PER_YEAR,
                (volatility_pre / MONTHS_PER_YEAR.sqrt()).max(1e-9),
            )
            .unwrap();
            let post_normal = Normal::new(
                post_retirement_return / MONTHS_PER_YEAR,
                (volatility_post / MONTHS_PER_YEAR.sqrt()).max(1e-9),
            )
            .unwrap();
            let mut rng = StdRng::seed_from_u64(seed);

            let mut successes = 0u32;
            let mut depletion_ages = Vec::with_capacity(self.num_simulations as usize);

            for _ in 0..self.num_simulations {
                let mut balance = current_savings;
                for _ in 0..accumulation_months {
                    let r: f64 = pre_normal.sample(&mut rng);
                    balance = balance * (1.0 + r) + monthly_contribution;
                }

                let mut withdrawal = monthly_withdrawal;
                let mut depleted_at: Option<u32> = None;
                for month in 0..distribution_months {
                    let r: f64 = post_normal.sample(&mut rng);
                    balance = balance * (1.0 + r) - withdrawal;
                    if month % 12 == 0 && month > 0 {
                        withdrawal *= 1.0 + inflation_rate;
                    }
                    if balance <= 0.0 {
                        depleted_at = Some(retirement_age + month / 12);
                        break;
                    }
                }

                if depleted_at.is_none() {
                    successes += 1;
                }
                depletion_ages.push(depleted_at);
            }

            (successes as f64 / self.num_simulations as f64, depletion_ages)
        };

        let target_monthly = annual_expenses_retirement / MONTHS_PER_YEAR;
        let (base_success_rate, depletion_ages) = run(target_monthly, self.seed);

        let safe_withdrawal_monthly =
            self.find_safe_withdrawal_rate(&run, 0.0, target_monthly.max(1.0) * 3.0, 0.95);

        let median_depletion_age = {
            let mut ages: Vec<f64> = depletion_ages.iter().filter_map(|a| a.map(|v| v as f64)).collect();
            if ages.is_empty() {
                None
            } else {
                ages.sort_by(|a, b| a.partial_cmp(b).unwrap());
                Some(percentile(&ages, 50.0))
            }
        };

        Ok(RetirementAdequacyResult {
            success_rate: base_success_rate,
            median_depletion_age,
            safe_withdrawal_monthly,
            recommendations: retirement_recommendations(base_success_rate, life_expectancy - retirement_age),
            num_simulations: self.num_simulations,
        })
    }

    /// Binary search (tolerance $100/mo, `low`/`high` bounds in dollars) for
    /// the monthly withdrawal that achieves `target_success_rate`.
    fn find_safe_withdrawal_rate(
        &self,
        run: &dyn Fn(f64, u64) -> (f64, Vec<Option<u32>>),
        mut low: f64,
        mut high: f64,
        target_success_rate: f64,
    ) -> f64 {
        const TOLERANCE: f64 = 100.0;
        while high - low > TOLERANCE {
            let mid = (low + high) / 2.0;
            let (success_rate, _) = run(mid, self.seed);
            if success_rate >= target_success_rate {
                low = mid;
            } else {
                high = mid;
            }
        }
        low
    }

    /// Simulates progress toward a dollar goal, binary searching for the
    /// monthly contribution that hits `target_success_rate` (tolerance $10/mo).
    pub fn simulate_goal_achievement(
        &self,
        current_value: f64,
        target_value: f64,
        years: u32,
        monthly_contribution: f64,
        expected_return: f64,
        volatility: f64,
    ) -> CoreResult<GoalAchievementResult> {
        if years == 0 {
            return Err(CoreError::ModelingFailed {
                message: "years must be positive".to_string(),
            });
        }
        let months = years * 12;
        let normal = Normal::new(
            expected_return / MONTHS_PER_YEAR,
            (volatility / MONTHS_PER_YEAR.sqrt()).max(1e-9),
        )
        .map_err(|e| CoreError::ModelingFailed { message: e.to_string() })?;

        let run = |contribution: f64| -> (f64, Vec<f64>) {
            let mut rng = self.rng();
            let mut finals = Vec::with_capacity(self.num_simulations as usize);
            let mut hits = 0u32;
            for _ in 0..self.num_simulations {
                let mut value = current_value;
                for _ in 0..months {
                    let r: f64 = normal.sample(&mut rng);
                    value = value * (1.0 + r) + contribution;
                }
                if value >= target_value {
                    hits += 1;
                }
                finals.push(value);
            }
            (hits as f64 / self.num_simulations as f64, finals)
        };

        let (success_rate, finals) = run(monthly_contribution);

        let mut low = 0.0;
        let mut high = 50_000.0_f64.max(monthly_contribution * 5.0);
        const TOLERANCE: f64 = 10.0;
        let mut required = None;
        if success_rate < 0.95 {
            while high - low > TOLERANCE {
                let mid = (low + high) / 2.0;
                let (rate, _) = run(mid);
                if rate >= 0.95 {
                    high = mid;
                } else {
                    low = mid;
                }
            }
            required = Some(high);
        }

        Ok(GoalAchievementResult {
            success_rate,
            required_monthly_contribution: required,
            statistics: compute_statistics(&finals),
        })
    }
}

fn retirement_recommendations(success_rate: f64, years_in_retirement: u32) -> Vec<String> {
    let mut recs = Vec::new();
    if success_rate < 0.5 {
        recs.push(
            "Your current plan has a low probability of lasting through retirement. Consider increasing savings or delaying retirement.".to_string(),
        );
    } else if success_rate < 0.75 {
        recs.push(
            "Your plan is below the recommended 75% success threshold. Consider increasing contributions.".to_string(),
        );
    } else if success_rate < 0.9 {
        recs.push("Your plan is reasonably funded but has some risk of shortfall.".to_string());
    } else {
        recs.push("Your plan has a high probability of success.".to_string());
    }

    if years_in_retirement > 25 {
        recs.push("A long retirement horizon favors maintaining some equity exposure throughout.".to_string());
    }

    recs
}

fn compute_statistics(values: &[f64]) -> Statistics {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Statistics {
        mean,
        median: percentile(&sorted, 50.0),
        std_dev: variance.sqrt(),
        min: *sorted.first().unwrap_or(&0.0),
        max: *sorted.last().unwrap_or(&0.0),
    }
}

fn compute_percentiles(values: &[f64]) -> Percentiles {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    Percentiles {
        p5: percentile(&sorted, 5.0),
        p25: percentile(&sorted, 25.0),
        p50: percentile(&sorted, 50.0),
        p75: percentile(&sorted, 75.0),
        p95: percentile(&sorted, 95.0),
    }
}

/// Linear-interpolated percentile over an already-sorted slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (pct / 100.0) * (sorted.len() as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

fn fraction_at_least(values: &[f64], threshold: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|v| **v >= threshold).count() as f64 / values.len() as f64
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn argmin(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn closest_to(values: &[f64], target: f64) -> usize {
    values
        .iter()
        .enumerate()
        .min_by(|a, b| (a.1 - target).abs().partial_cmp(&(b.1 - target).abs()).unwrap())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_and_inputs_are_deterministic() {
        let a = MonteCarloEngine::new(200, 42)
            .simulate_portfolio_returns(10_000.0, 10, 0.07, 0.15, 6_000.0, 0.03)
            .unwrap();
        let b = MonteCarloEngine::new(200, 42)
            .simulate_portfolio_returns(10_000.0, 10, 0.07, 0.15, 6_000.0, 0.03)
            .unwrap();
        assert_eq!(a.statistics.mean, b.statistics.mean);
        assert_eq!(a.percentiles.p50, b.percentiles.p50);
    }

    #[test]
    fn different_seeds_diverge() {
        let a = MonteCarloEngine::new(200, 1)
            .simulate_portfolio_returns(10_000.0, 10, 0.07, 0.15, 0.0, 0.0)
            .unwrap();
        let b = MonteCarloEngine::new(200, 2)
            .simulate_portfolio_returns(10_000.0, 10, 0.07, 0.15, 0.0, 0.0)
            .unwrap();
        assert_ne!(a.statistics.mean, b.statistics.mean);
    }

    #[test]
    fn zero_years_is_rejected() {
        let err = MonteCarloEngine::new(100, 1)
            .simulate_portfolio_returns(1000.0, 0, 0.07, 0.15, 0.0, 0.0)
            .unwrap_err();
        assert!(matches!(err, CoreError::ModelingFailed { .. }));
    }

    #[test]
    fn retirement_adequacy_reports_success_rate_in_bounds() {
        let result = MonteCarloEngine::new(100, 7)
            .simulate_retirement_adequacy(
                35, 65, 90, 200_000.0, 1500.0, 60_000.0, 0.07, 0.04, 0.03, 0.15, 0.08,
            )
            .unwrap();
        assert!(result.success_rate >= 0.0 && result.success_rate <= 1.0);
        assert!(!result.recommendations.is_empty());
    }

    #[test]
    fn goal_achievement_suggests_higher_contribution_when_underfunded() {
        let result = MonteCarloEngine::new(200, 3)
            .simulate_goal_achievement(0.0, 100_000.0, 5, 100.0, 0.07, 0.15)
            .unwrap();
        if result.success_rate < 0.95 {
            assert!(result.required_monthly_contribution.unwrap() > 100.0);
        }
    }
}

//! Closed-form financial calculators used when a question doesn't need a
//! full Monte-Carlo simulation (e.g. "what's my net worth" or "how much
//! would $500/month become in 10 years at 7%").

use shared_types::{CoreError, CoreResult, ProfilePack};

/// Future value of a present sum plus level monthly contributions,
/// compounded monthly at `annual_rate`.
pub fn future_value(
    present_value: f64,
    monthly_contribution: f64,
    annual_rate: f64,
    years: u32,
) -> CoreResult<f64> {
    if years == 0 {
        return Ok(present_value);
    }
    let monthly_rate = annual_rate / 12.0;
    let months = (years * 12) as f64;

    let fv = if monthly_rate.abs() < 1e-12 {
        present_value + monthly_contribution * months
    } else {
        let growth = (1.0 + monthly_rate).powf(months);
        present_value * growth + monthly_contribution * ((growth - 1.0) / monthly_rate)
    };

    if !fv.is_finite() {
        return Err(CoreError::CalculationOverflow {
            message: "future value calculation overflowed".to_string(),
        });
    }
    Ok(fv)
}

/// Level monthly contribution required to reach `target_value` from
/// `present_value` in `years` at `annual_rate`.
pub fn required_monthly_contribution(
    present_value: f64,
    target_value: f64,
    annual_rate: f64,
    years: u32,
) -> CoreResult<f64> {
    if years == 0 {
        return Err(CoreError::ModelingFailed {
            message: "years must be positive".to_string(),
        });
    }
    let monthly_rate = annual_rate / 12.0;
    let months = (years * 12) as f64;
    let remaining = target_value - present_value * (1.0 + monthly_rate).powf(months);

    let contribution = if monthly_rate.abs() < 1e-12 {
        remaining / months
    } else {
        let growth = (1.0 + monthly_rate).powf(months);
        remaining * monthly_rate / (growth - 1.0)
    };

    if !contribution.is_finite() {
        return Err(CoreError::CalculationOverflow {
            message: "required contribution calculation overflowed".to_string(),
        });
    }
    Ok(contribution.max(0.0))
}

/// Net worth from a profile pack's already-derived totals.
pub fn net_worth(profile: &ProfilePack) -> f64 {
    profile.derived_metrics.total_assets - profile.derived_metrics.total_liabilities
}

/// Months of essential spending covered by liquid assets.
pub fn liquid_reserves_months(liquid_assets: f64, avg_monthly_expense: f64) -> CoreResult<f64> {
    if avg_monthly_expense <= 0.0 {
        return Err(CoreError::ModelingFailed {
            message: "average monthly expense must be positive".to_string(),
        });
    }
    Ok(liquid_assets / avg_monthly_expense)
}

/// Monthly debt service divided by monthly gross income, as a fraction.
pub fn debt_to_income(monthly_debt_service: f64, monthly_gross_income: f64) -> CoreResult<f64> {
    if monthly_gross_income <= 0.0 {
        return Err(CoreError::ModelingFailed {
            message: "monthly gross income must be positive".to_string(),
        });
    }
    Ok(monthly_debt_service / monthly_gross_income)
}

/// Savings rate: (income - expense) / income, as a fraction.
pub fn savings_rate(avg_monthly_income: f64, avg_monthly_expense: f64) -> CoreResult<f64> {
    if avg_monthly_income <= 0.0 {
        return Err(CoreError::ModelingFailed {
            message: "average monthly income must be positive".to_string(),
        });
    }
    Ok((avg_monthly_income - avg_monthly_expense) / avg_monthly_income)
}

/// Gross income less federal and state tax, from the profile's user core
/// rates. Missing rates default to 0 (no withholding assumption).
pub fn after_tax_income(gross_annual_income: f64, federal_tax_rate: f64, state_tax_rate: f64) -> f64 {
    (gross_annual_income * (1.0 - federal_tax_rate - state_tax_rate)).max(0.0)
}

/// Single lump-sum compounded at `annual_rate` for `years`, compounding
/// `compounds_per_year` times per year (12 for monthly, 1 for annual).
pub fn compound_interest(
    principal: f64,
    annual_rate: f64,
    years: f64,
    compounds_per_year: u32,
) -> CoreResult<f64> {
    if compounds_per_year == 0 {
        return Err(CoreError::ModelingFailed {
            message: "compounds_per_year must be positive".to_string(),
        });
    }
    let n = compounds_per_year as f64;
    let value = principal * (1.0 + annual_rate / n).powf(n * years);
    if !value.is_finite() {
        return Err(CoreError::CalculationOverflow {
            message: "compound interest calculation overflowed".to_string(),
        });
    }
    Ok(value)
}

/// Standard amortized monthly payment for a loan of `principal` at
/// `annual_rate` over `years`. A zero rate degrades to the simple
/// `principal / num_payments` split.
pub fn loan_payment(principal: f64, annual_rate: f64, years: u32) -> CoreResult<f64> {
    if years == 0 {
        return Err(CoreError::ModelingFailed {
            message: "years must be positive".to_string(),
        });
    }
    let n = (years * 12) as f64;
    let monthly_rate = annual_rate / 12.0;

    let payment = if monthly_rate.abs() < 1e-12 {
        principal / n
    } else {
        let factor = (1.0 + monthly_rate).powf(n);
        principal * monthly_rate * factor / (factor - 1.0)
    };

    if !payment.is_finite() {
        return Err(CoreError::CalculationOverflow {
            message: "loan payment calculation overflowed".to_string(),
        });
    }
    Ok(payment)
}

/// Nest egg required to sustain `annual_expenses` at a given safe
/// withdrawal rate (4% by convention, configurable).
pub fn retirement_target(annual_expenses: f64, safe_withdrawal_rate: f64) -> CoreResult<f64> {
    if safe_withdrawal_rate <= 0.0 {
        return Err(CoreError::ModelingFailed {
            message: "safe withdrawal rate must be positive".to_string(),
        });
    }
    Ok(annual_expenses / safe_withdrawal_rate)
}

#[derive(Debug, Clone)]
pub struct Debt {
    pub name: String,
    pub balance: f64,
    pub annual_rate: f64,
    pub minimum_payment: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebtStrategy {
    Avalanche,
    Snowball,
}

#[derive(Debug, Clone)]
pub struct DebtPayoffMonth {
    pub month: u32,
    pub balances: Vec<(String, f64)>,
}

#[derive(Debug, Clone)]
pub struct DebtPayoffResult {
    pub months_to_payoff: u32,
    pub total_interest_paid: f64,
    pub schedule: Vec<DebtPayoffMonth>,
}

/// Simulates payoff of `debts` with a fixed `extra` monthly payment beyond
/// each debt's minimum, ordered by `strategy` (avalanche = highest rate
/// first, snowball = smallest balance first). When a debt's balance reaches
/// zero, its full payment -- minimum plus whatever extra had rolled onto it
/// -- rolls onto the next debt in the order, rather than being redistributed
/// evenly or left idle.
pub fn debt_payoff(debts: &[Debt], extra: f64, strategy: DebtStrategy) -> CoreResult<DebtPayoffResult> {
    if debts.is_empty() {
        return Err(CoreError::ModelingFailed {
            message: "debt_payoff requires at least one debt".to_string(),
        });
    }

    let mut order: Vec<usize> = (0..debts.len()).collect();
    match strategy {
        DebtStrategy::Avalanche => {
            order.sort_by(|&a, &b| debts[b].annual_rate.partial_cmp(&debts[a].annual_rate).unwrap())
        }
        DebtStrategy::Snowball => {
            order.sort_by(|&a, &b| debts[a].balance.partial_cmp(&debts[b].balance).unwrap())
        }
    }

    let mut balances: Vec<f64> = debts.iter().map(|d| d.balance).collect();
    let mut total_interest = 0.0;
    let mut schedule = Vec::new();
    let mut month = 0u32;
    const MAX_MONTHS: u32 = 12 * 100;

    while balances.iter().any(|b| *b > 0.01) && month < MAX_MONTHS {
        month += 1;
        let mut rollover = extra;

        for &idx in &order {
            if balances[idx] <= 0.0 {
                continue;
            }
            let monthly_rate = debts[idx].annual_rate / 12.0;
            let interest = balances[idx] * monthly_rate;
            total_interest += interest;
            balances[idx] += interest;

            let available = debts[idx].minimum_payment + rollover;
            let payment = available.min(balances[idx]);
            balances[idx] -= payment;

            if balances[idx] <= 0.01 {
                rollover = available - payment;
                balances[idx] = 0.0;
            } else {
                rollover = 0.0;
            }
        }

        schedule.push(DebtPayoffMonth {
            month,
            balances: order
                .iter()
                .map(|&idx| (debts[idx].name.clone(), balances[idx]))
                .collect(),
        });
    }

    Ok(DebtPayoffResult {
        months_to_payoff: month,
        total_interest_paid: total_interest,
        schedule,
    })
}

/// Discretionary income left after essential expenses and debt minimums --
/// what a user could actually redirect into savings, as opposed to their
/// raw `savings_rate` which doesn't distinguish essential from discretionary.
pub fn true_savings_capacity(
    avg_monthly_income: f64,
    essential_monthly_expense: f64,
    monthly_debt_minimums: f64,
) -> f64 {
    (avg_monthly_income - essential_monthly_expense - monthly_debt_minimums).max(0.0)
}

/// Formats a dollar amount with an overflow guard: magnitudes beyond 1e15
/// return a sentinel marker rather than a misleading number, 1e9+ formats as
/// billions, 1e6+ as millions, otherwise a plain two-decimal dollar string.
pub fn format_dollar_amount(amount: f64) -> String {
    let magnitude = amount.abs();
    if magnitude > 1e15 {
        return "$<overflow>".to_string();
    }
    if magnitude > 1e9 {
        return format!("${:.1}B", amount / 1e9);
    }
    if magnitude > 1e6 {
        return format!("${:.1}M", amount / 1e6);
    }
    format!("${:.2}", amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn future_value_with_no_rate_is_simple_sum() {
        let fv = future_value(1000.0, 100.0, 0.0, 1).unwrap();
        assert!((fv - (1000.0 + 100.0 * 12.0)).abs() < 1e-6);
    }

    #[test]
    fn required_contribution_roundtrips_future_value() {
        let target = future_value(5_000.0, 250.0, 0.06, 10).unwrap();
        let contribution = required_monthly_contribution(5_000.0, target, 0.06, 10).unwrap();
        assert!((contribution - 250.0).abs() < 1.0);
    }

    #[test]
    fn savings_rate_rejects_zero_income() {
        let err = savings_rate(0.0, 100.0).unwrap_err();
        assert!(matches!(err, CoreError::ModelingFailed { .. }));
    }

    #[test]
    fn debt_to_income_computes_fraction() {
        let ratio = debt_to_income(500.0, 5_000.0).unwrap();
        assert!((ratio - 0.1).abs() < 1e-9);
    }

    #[test]
    fn loan_payment_with_zero_rate_splits_evenly() {
        let payment = loan_payment(12_000.0, 0.0, 1).unwrap();
        assert!((payment - 1_000.0).abs() < 1e-6);
    }

    #[test]
    fn retirement_target_uses_safe_withdrawal_rate() {
        let target = retirement_target(84_000.0, 0.04).unwrap();
        assert!((target - 2_100_000.0).abs() < 1e-6);
    }

    #[test]
    fn debt_payoff_avalanche_prioritizes_higher_rate_debt() {
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
        let result = debt_payoff(&debts, 300.0, DebtStrategy::Avalanche).unwrap();
        assert!(result.months_to_payoff > 0);
        assert!(result.total_interest_paid > 0.0);

        let snowball = debt_payoff(&debts, 300.0, DebtStrategy::Snowball).unwrap();
        assert!(snowball.months_to_payoff > 0);
    }

    #[test]
    fn debt_payoff_rolls_payment_to_next_debt_on_payoff() {
        let debts = vec![
            Debt {
                name: "small".to_string(),
                balance: 100.0,
                annual_rate: 0.10,
                minimum_payment: 50.0,
            },
            Debt {
                name: "big".to_string(),
                balance: 5_000.0,
                annual_rate: 0.10,
                minimum_payment: 100.0,
            },
        ];
        let result = debt_payoff(&debts, 0.0, DebtStrategy::Snowball).unwrap();
        let month2 = result.schedule.iter().find(|m| m.month == 2).unwrap();
        let big_balance = month2
            .balances
            .iter()
            .find(|(name, _)| name == "big")
            .unwrap()
            .1;
        assert!(big_balance < 5_000.0 - 100.0 * 2.0);
    }

    #[test]
    fn format_dollar_amount_scales_by_magnitude() {
        assert_eq!(format_dollar_amount(1_234.5), "$1234.50");
        assert_eq!(format_dollar_amount(2_500_000.0), "$2.5M");
        assert_eq!(format_dollar_amount(3_200_000_000.0), "$3.2B");
        assert_eq!(format_dollar_amount(2e15), "$<overflow>");
    }
}

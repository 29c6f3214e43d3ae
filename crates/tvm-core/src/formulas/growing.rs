//! Growing perpetuity and growing annuities (ordinary and due, PV and FV).
//!
//! Here `r` and `g` are per-period rates and `n` is a period count. When the
//! rate equals the growth rate the general factor is 0/0, so the kernel
//! switches to the limiting form.

use rust_decimal::Decimal;

use super::{FormulaInputs, Symbol};
use crate::error::TvmError;
use crate::math;
use crate::solver::{self, SolverConfig, SolverResult};
use crate::types::percent_to_rate;
use crate::TvmResult;

use super::Symbol::{
    FutureValue as FV, Growth as G, Payment as PMT, Periods as N, PresentValue as PV, Rate as R,
};

const RATE_EXCEEDS_GROWTH: &str = "rate must exceed growth rate";

const fn value_symbol(future: bool) -> Symbol {
    if future {
        FV
    } else {
        PV
    }
}

/// Value of a payment stream starting at 1 and growing at `g` per period.
pub fn growing_factor(
    due: bool,
    future: bool,
    rate: Decimal,
    growth: Decimal,
    periods: Decimal,
) -> TvmResult<Decimal> {
    let one_plus_r = math::try_add(Decimal::ONE, rate, "r")?;
    let one_plus_g = math::try_add(Decimal::ONE, growth, "g")?;
    let spread = math::try_sub(rate, growth, "r - g")?;

    let factor = if rate == growth {
        if future {
            let exponent = math::try_sub(periods, Decimal::ONE, "n")?;
            let grown = math::try_pow(one_plus_r, exponent, "r")?;
            math::try_mul(periods, grown, "FV")?
        } else {
            math::try_div(periods, one_plus_r, "1 + r")?
        }
    } else if future {
        let grown_r = math::try_pow(one_plus_r, periods, "r")?;
        let grown_g = math::try_pow(one_plus_g, periods, "g")?;
        let gap = math::try_sub(grown_r, grown_g, "FV")?;
        math::try_div(gap, spread, "r - g")?
    } else {
        let ratio = math::try_div(one_plus_g, one_plus_r, "1 + r")?;
        let discounted = math::try_pow(ratio, periods, "g")?;
        let remaining = math::try_sub(Decimal::ONE, discounted, "PV")?;
        math::try_div(remaining, spread, "r - g")?
    };

    if due {
        math::try_mul(factor, one_plus_r, "growing annuity due factor")
    } else {
        Ok(factor)
    }
}

/// Reject r < g, or r ≤ g when `strict`.
fn check_rate_exceeds_growth(rate: Decimal, growth: Decimal, strict: bool) -> TvmResult<()> {
    if rate < growth || (strict && rate == growth) {
        return Err(TvmError::domain("r", RATE_EXCEEDS_GROWTH));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Growing perpetuity: PV = PMT / (r - g)
// ---------------------------------------------------------------------------

pub fn perpetuity_pv(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    let rate = inputs.rate(R)?;
    let growth = inputs.rate(G)?;
    check_rate_exceeds_growth(rate, growth, true)?;
    math::try_div(inputs.get(PMT)?, rate - growth, "r - g")
}

pub fn perpetuity_payment(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    let rate = inputs.rate(R)?;
    let growth = inputs.rate(G)?;
    check_rate_exceeds_growth(rate, growth, true)?;
    math::try_mul(inputs.get(PV)?, rate - growth, "PMT")
}

pub fn perpetuity_rate(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    let growth = inputs.rate(G)?;
    let yield_part = math::try_div(inputs.get(PMT)?, inputs.get(PV)?, "PV")?;
    let rate = math::try_add(yield_part, growth, "r")?;
    check_rate_exceeds_growth(rate, growth, true)?;
    math::try_percent(rate, "r")
}

pub fn perpetuity_growth(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    let rate = inputs.rate(R)?;
    let yield_part = math::try_div(inputs.get(PMT)?, inputs.get(PV)?, "PV")?;
    let growth = math::try_sub(rate, yield_part, "g")?;
    check_rate_exceeds_growth(rate, growth, true)?;
    math::try_percent(growth, "g")
}

// ---------------------------------------------------------------------------
// Growing annuities
// ---------------------------------------------------------------------------

/// PV or FV from PMT, r, g, n.
pub fn value<const IS_DUE: bool, const IS_FUTURE: bool>(
    inputs: &FormulaInputs,
) -> TvmResult<Decimal> {
    let rate = inputs.rate(R)?;
    let growth = inputs.rate(G)?;
    check_rate_exceeds_growth(rate, growth, false)?;
    let factor = growing_factor(IS_DUE, IS_FUTURE, rate, growth, inputs.get(N)?)?;
    math::try_mul(inputs.get(PMT)?, factor, value_symbol(IS_FUTURE).as_str())
}

/// First payment from PV or FV, r, g, n.
pub fn payment<const IS_DUE: bool, const IS_FUTURE: bool>(
    inputs: &FormulaInputs,
) -> TvmResult<Decimal> {
    let rate = inputs.rate(R)?;
    let growth = inputs.rate(G)?;
    check_rate_exceeds_growth(rate, growth, false)?;
    let factor = growing_factor(IS_DUE, IS_FUTURE, rate, growth, inputs.get(N)?)?;
    math::try_div(
        inputs.get(value_symbol(IS_FUTURE))?,
        factor,
        "growing annuity factor",
    )
}

/// r by Newton; the result is a percentage. A root below the growth rate
/// lies outside the family's domain and is rejected.
pub fn rate<const IS_DUE: bool, const IS_FUTURE: bool>(
    inputs: &FormulaInputs,
    config: &SolverConfig,
) -> TvmResult<SolverResult> {
    let target = inputs.get(value_symbol(IS_FUTURE))?;
    let pmt = inputs.get(PMT)?;
    let growth = inputs.rate(G)?;
    let periods = inputs.get(N)?;
    let result = solver::solve_rate(
        target,
        |r| {
            let factor = growing_factor(IS_DUE, IS_FUTURE, r, growth, periods)?;
            math::try_mul(pmt, factor, "PMT")
        },
        config,
    )?;
    check_rate_exceeds_growth(percent_to_rate(result.value), growth, false)?;
    Ok(result)
}

/// g by Newton, iterating directly in percent. A root above the rate is
/// rejected like a known g would be.
pub fn growth<const IS_DUE: bool, const IS_FUTURE: bool>(
    inputs: &FormulaInputs,
    config: &SolverConfig,
) -> TvmResult<SolverResult> {
    let target = inputs.get(value_symbol(IS_FUTURE))?;
    let pmt = inputs.get(PMT)?;
    let rate = inputs.rate(R)?;
    let periods = inputs.get(N)?;
    let result = solver::solve_for_variable(
        target,
        |g_pct| {
            let factor =
                growing_factor(IS_DUE, IS_FUTURE, rate, percent_to_rate(g_pct), periods)?;
            math::try_mul(pmt, factor, "PMT")
        },
        config,
    )?;
    check_rate_exceeds_growth(rate, percent_to_rate(result.value), false)?;
    Ok(result)
}

/// n by Newton.
pub fn periods<const IS_DUE: bool, const IS_FUTURE: bool>(
    inputs: &FormulaInputs,
    config: &SolverConfig,
) -> TvmResult<SolverResult> {
    let target = inputs.get(value_symbol(IS_FUTURE))?;
    let pmt = inputs.get(PMT)?;
    let rate = inputs.rate(R)?;
    let growth = inputs.rate(G)?;
    solver::solve_for_variable(
        target,
        |n| {
            let factor = growing_factor(IS_DUE, IS_FUTURE, rate, growth, n)?;
            math::try_mul(pmt, factor, "PMT")
        },
        config,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulas::annuity::{DUE, FUTURE, ORDINARY, PRESENT};
    use rust_decimal_macros::dec;

    fn inputs(pairs: &[(Symbol, Decimal)]) -> FormulaInputs {
        FormulaInputs::from_pairs(pairs)
    }

    fn assert_close(actual: Decimal, expected: Decimal, tol: Decimal) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_growing_perpetuity_exact() {
        let i = inputs(&[(PMT, dec!(100)), (R, dec!(8)), (G, dec!(3))]);
        assert_eq!(perpetuity_pv(&i).unwrap(), dec!(2000));
    }

    #[test]
    fn test_growing_perpetuity_rate_not_above_growth_is_domain_error() {
        for g in [dec!(8), dec!(9)] {
            let i = inputs(&[(PMT, dec!(100)), (R, dec!(8)), (G, g)]);
            let err = perpetuity_pv(&i).unwrap_err();
            match err {
                TvmError::Domain { symbol, reason } => {
                    assert_eq!(symbol, "r");
                    assert_eq!(reason, RATE_EXCEEDS_GROWTH);
                }
                other => panic!("expected domain error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_growing_perpetuity_inverses() {
        let i = inputs(&[(PV, dec!(2000)), (PMT, dec!(100)), (G, dec!(3))]);
        assert_eq!(perpetuity_rate(&i).unwrap(), dec!(8));
        let i = inputs(&[(PV, dec!(2000)), (PMT, dec!(100)), (R, dec!(8))]);
        assert_eq!(perpetuity_growth(&i).unwrap(), dec!(3));
        let i = inputs(&[(PV, dec!(2000)), (R, dec!(8)), (G, dec!(3))]);
        assert_eq!(perpetuity_payment(&i).unwrap(), dec!(100));
    }

    #[test]
    fn test_growing_annuity_pv() {
        // 100/(0.05) * (1 - (1.03/1.08)^10) = 755.01
        let i = inputs(&[(PMT, dec!(100)), (R, dec!(8)), (G, dec!(3)), (N, dec!(10))]);
        let pv = value::<ORDINARY, PRESENT>(&i).unwrap();
        assert_close(pv, dec!(755.013369), dec!(0.0001));
    }

    #[test]
    fn test_growing_annuity_equal_rate_limits() {
        let i = inputs(&[(PMT, dec!(100)), (R, dec!(5)), (G, dec!(5)), (N, dec!(10))]);
        assert_close(
            value::<ORDINARY, PRESENT>(&i).unwrap(),
            dec!(1000) / dec!(1.05),
            dec!(0.0000001),
        );
        assert_eq!(value::<DUE, PRESENT>(&i).unwrap(), dec!(1000));
        assert_close(
            value::<ORDINARY, FUTURE>(&i).unwrap(),
            dec!(1000) * crate::math::powi(dec!(1.05), 9).unwrap(),
            dec!(0.0000001),
        );
        assert_close(
            value::<DUE, FUTURE>(&i).unwrap(),
            dec!(1000) * crate::math::powi(dec!(1.05), 10).unwrap(),
            dec!(0.0000001),
        );
    }

    #[test]
    fn test_growing_annuity_limit_is_continuous() {
        let exact = growing_factor(false, true, dec!(0.05), dec!(0.05), dec!(10)).unwrap();
        let near = growing_factor(false, true, dec!(0.05), dec!(0.0499999), dec!(10)).unwrap();
        assert_close(exact, near, dec!(0.0001));
    }

    #[test]
    fn test_growing_annuity_rate_below_growth_is_domain_error() {
        let i = inputs(&[(PMT, dec!(100)), (R, dec!(2)), (G, dec!(3)), (N, dec!(10))]);
        assert!(value::<ORDINARY, FUTURE>(&i).unwrap_err().is_domain());
    }

    #[test]
    fn test_growth_solved_in_percent() {
        let base = inputs(&[(PMT, dec!(100)), (R, dec!(8)), (G, dec!(5)), (N, dec!(10))]);
        let fv = value::<ORDINARY, FUTURE>(&base).unwrap();
        let i = inputs(&[(FV, fv), (PMT, dec!(100)), (R, dec!(8)), (N, dec!(10))]);
        let config = SolverConfig::variable().with_initial_guess(dec!(3));
        let result = growth::<ORDINARY, FUTURE>(&i, &config).unwrap();
        assert!(result.converged);
        assert_close(result.value, dec!(5), dec!(0.01));
    }

    #[test]
    fn test_solved_rate_below_growth_is_domain_error() {
        // 10 payments of 100 growing at 3% only reach 1200 if r ≈ -0.79%
        let i = inputs(&[(PV, dec!(1200)), (PMT, dec!(100)), (G, dec!(3)), (N, dec!(10))]);
        let err = rate::<ORDINARY, PRESENT>(&i, &SolverConfig::rate()).unwrap_err();
        assert!(matches!(
            err,
            TvmError::Domain { ref reason, .. } if reason == RATE_EXCEEDS_GROWTH
        ));
    }

    #[test]
    fn test_solved_growth_above_rate_is_domain_error() {
        // Reaching 5000 at r = 3% needs g ≈ 31.7%
        let i = inputs(&[(FV, dec!(5000)), (PMT, dec!(100)), (R, dec!(3)), (N, dec!(10))]);
        let config = SolverConfig::variable().with_initial_guess(dec!(3));
        let err = growth::<ORDINARY, FUTURE>(&i, &config).unwrap_err();
        assert!(matches!(
            err,
            TvmError::Domain { ref reason, .. } if reason == RATE_EXCEEDS_GROWTH
        ));
    }

    #[test]
    fn test_solved_rate_feeds_back_into_value() {
        let base = inputs(&[(PMT, dec!(100)), (R, dec!(6)), (G, dec!(2)), (N, dec!(15))]);
        let pv = value::<ORDINARY, PRESENT>(&base).unwrap();
        let i = inputs(&[(PV, pv), (PMT, dec!(100)), (G, dec!(2)), (N, dec!(15))]);
        let solved = rate::<ORDINARY, PRESENT>(&i, &SolverConfig::rate()).unwrap();
        let back = inputs(&[(PMT, dec!(100)), (R, solved.value), (G, dec!(2)), (N, dec!(15))]);
        assert_close(value::<ORDINARY, PRESENT>(&back).unwrap(), pv, dec!(0.01));
    }

    #[test]
    fn test_rate_solved_for_due_pv() {
        let base = inputs(&[(PMT, dec!(100)), (R, dec!(8)), (G, dec!(3)), (N, dec!(20))]);
        let pv = value::<DUE, PRESENT>(&base).unwrap();
        let i = inputs(&[(PV, pv), (PMT, dec!(100)), (G, dec!(3)), (N, dec!(20))]);
        let result = rate::<DUE, PRESENT>(&i, &SolverConfig::rate()).unwrap();
        assert!(result.converged);
        assert_close(result.value, dec!(8), dec!(0.01));
    }
}

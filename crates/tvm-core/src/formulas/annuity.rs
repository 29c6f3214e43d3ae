//! Level annuities (ordinary and due, present and future value) and the
//! level perpetuity.
//!
//! The four annuity families share one kernel, selected by the `IS_DUE` and
//! `IS_FUTURE` const parameters so that each instantiation is a plain `fn`
//! pointer in the registry. `r` is annual, `n` is years, `m` is payments per
//! year; the periodic rate is r/m over n·m periods.

use rust_decimal::Decimal;

use super::{FormulaInputs, Symbol};
use crate::error::TvmError;
use crate::math;
use crate::solver::{self, SolverConfig, SolverResult};
use crate::time_value;
use crate::TvmResult;

use super::Symbol::{
    Frequency as M, FutureValue as FV, Payment as PMT, Periods as N, PresentValue as PV,
    Rate as R,
};

/// Payments at the end of each period.
pub const ORDINARY: bool = false;
/// Payments at the start of each period.
pub const DUE: bool = true;
/// Value measured today.
pub const PRESENT: bool = false;
/// Value measured after the last period.
pub const FUTURE: bool = true;

const fn value_symbol(future: bool) -> Symbol {
    if future {
        FV
    } else {
        PV
    }
}

/// Value of 1 per period.
pub fn annuity_factor(
    due: bool,
    future: bool,
    rate: Decimal,
    years: Decimal,
    m: Decimal,
) -> TvmResult<Decimal> {
    if m <= Decimal::ZERO {
        return Err(TvmError::domain("m", "m must be > 0"));
    }
    let periodic = math::try_div(rate, m, "m")?;
    let periods = math::try_mul(years, m, "n·m")?;

    let factor = if future {
        time_value::annuity_fv_factor(periodic, periods)?
    } else {
        time_value::annuity_pv_factor(periodic, periods)?
    };

    if due {
        let one_plus_periodic = math::try_add(Decimal::ONE, periodic, "r")?;
        math::try_mul(factor, one_plus_periodic, "annuity due factor")
    } else {
        Ok(factor)
    }
}

fn annuity_value(
    due: bool,
    future: bool,
    pmt: Decimal,
    rate: Decimal,
    years: Decimal,
    m: Decimal,
) -> TvmResult<Decimal> {
    let factor = annuity_factor(due, future, rate, years, m)?;
    math::try_mul(pmt, factor, value_symbol(future).as_str())
}

/// PV or FV from PMT, r, n, m.
pub fn value<const IS_DUE: bool, const IS_FUTURE: bool>(
    inputs: &FormulaInputs,
) -> TvmResult<Decimal> {
    annuity_value(
        IS_DUE,
        IS_FUTURE,
        inputs.get(PMT)?,
        inputs.rate(R)?,
        inputs.get(N)?,
        inputs.positive(M)?,
    )
}

/// PMT from PV or FV, r, n, m.
pub fn payment<const IS_DUE: bool, const IS_FUTURE: bool>(
    inputs: &FormulaInputs,
) -> TvmResult<Decimal> {
    let factor = annuity_factor(
        IS_DUE,
        IS_FUTURE,
        inputs.rate(R)?,
        inputs.get(N)?,
        inputs.positive(M)?,
    )?;
    math::try_div(inputs.get(value_symbol(IS_FUTURE))?, factor, "annuity factor")
}

/// r by Newton; the result is an annual percentage.
pub fn rate<const IS_DUE: bool, const IS_FUTURE: bool>(
    inputs: &FormulaInputs,
    config: &SolverConfig,
) -> TvmResult<SolverResult> {
    let target = inputs.get(value_symbol(IS_FUTURE))?;
    let pmt = inputs.get(PMT)?;
    let years = inputs.get(N)?;
    let m = inputs.positive(M)?;
    solver::solve_rate(
        target,
        |r| annuity_value(IS_DUE, IS_FUTURE, pmt, r, years, m),
        config,
    )
}

/// n (years) by Newton.
pub fn periods<const IS_DUE: bool, const IS_FUTURE: bool>(
    inputs: &FormulaInputs,
    config: &SolverConfig,
) -> TvmResult<SolverResult> {
    let target = inputs.get(value_symbol(IS_FUTURE))?;
    let pmt = inputs.get(PMT)?;
    let rate = inputs.rate(R)?;
    let m = inputs.positive(M)?;
    solver::solve_for_variable(
        target,
        |n| annuity_value(IS_DUE, IS_FUTURE, pmt, rate, n, m),
        config,
    )
}

/// m (payments per year) by Newton.
pub fn frequency<const IS_DUE: bool, const IS_FUTURE: bool>(
    inputs: &FormulaInputs,
    config: &SolverConfig,
) -> TvmResult<SolverResult> {
    let target = inputs.get(value_symbol(IS_FUTURE))?;
    let pmt = inputs.get(PMT)?;
    let rate = inputs.rate(R)?;
    let years = inputs.get(N)?;
    solver::solve_for_variable(
        target,
        |m| annuity_value(IS_DUE, IS_FUTURE, pmt, rate, years, m),
        config,
    )
}

// ---------------------------------------------------------------------------
// Perpetuity: PV = PMT / r
// ---------------------------------------------------------------------------

pub fn perpetuity_pv(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    math::try_div(inputs.get(PMT)?, inputs.rate(R)?, "perpetuity rate")
}

pub fn perpetuity_payment(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    math::try_mul(inputs.get(PV)?, inputs.rate(R)?, "PMT")
}

pub fn perpetuity_rate(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    let rate = math::try_div(inputs.get(PMT)?, inputs.get(PV)?, "PV")?;
    math::try_percent(rate, "r")
}

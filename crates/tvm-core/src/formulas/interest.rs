//! Lump-sum interest families: simple, annual compound, m-period compound,
//! continuous compounding and the effective annual rate.

use rust_decimal::Decimal;

use super::{FormulaInputs, Symbol};
use crate::math;
use crate::solver::{self, SolverConfig, SolverResult};
use crate::time_value;
use crate::TvmResult;

use super::Symbol::{
    EffectiveRate as EAR, Frequency as M, FutureValue as FV, Periods as N, PresentValue as PV,
    Rate as R, Years as T,
};

// ---------------------------------------------------------------------------
// Simple interest: FV = PV(1 + r·t)
// ---------------------------------------------------------------------------

fn simple_growth(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    let accrued = math::try_mul(inputs.rate(R)?, inputs.get(T)?, "r·t")?;
    math::try_add(Decimal::ONE, accrued, "1 + r·t")
}

pub fn simple_fv(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    math::try_mul(inputs.get(PV)?, simple_growth(inputs)?, "FV")
}

pub fn simple_pv(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    math::try_div(inputs.get(FV)?, simple_growth(inputs)?, "1 + r·t")
}

pub fn simple_rate(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    let ratio = math::try_div(inputs.get(FV)?, inputs.get(PV)?, "PV")?;
    let gain = math::try_sub(ratio, Decimal::ONE, "FV")?;
    let rate = math::try_div(gain, inputs.get(T)?, "t")?;
    math::try_percent(rate, "r")
}

pub fn simple_years(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    let ratio = math::try_div(inputs.get(FV)?, inputs.get(PV)?, "PV")?;
    let gain = math::try_sub(ratio, Decimal::ONE, "FV")?;
    math::try_div(gain, inputs.rate(R)?, "r")
}

// ---------------------------------------------------------------------------
// Compound interest, annual: FV = PV(1 + r)^n
// ---------------------------------------------------------------------------

pub fn compound_fv(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    time_value::future_value(inputs.get(PV)?, inputs.rate(R)?, inputs.get(N)?)
}

pub fn compound_pv(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    time_value::present_value(inputs.get(FV)?, inputs.rate(R)?, inputs.get(N)?)
}

pub fn compound_rate(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    let ratio = inputs.positive_ratio(FV, PV)?;
    let inv_n = math::try_div(Decimal::ONE, inputs.get(N)?, "n")?;
    let rate = math::try_pow(ratio, inv_n, "FV")? - Decimal::ONE;
    math::try_percent(rate, "r")
}

pub fn compound_periods(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    let ratio = inputs.positive_ratio(FV, PV)?;
    let one_plus_r = math::try_add(Decimal::ONE, inputs.rate(R)?, "r")?;
    let growth = math::try_ln(one_plus_r, "r")?;
    math::try_div(math::try_ln(ratio, "FV")?, growth, "ln(1 + r)")
}

// ---------------------------------------------------------------------------
// Compound interest, m periods per year: FV = PV(1 + r/m)^(n·m)
// ---------------------------------------------------------------------------

/// Periodic rate r/m and period count n·m.
fn periodic_terms(rate: Decimal, years: Decimal, m: Decimal) -> TvmResult<(Decimal, Decimal)> {
    let periodic = math::try_div(rate, m, "m")?;
    let periods = math::try_mul(years, m, "n·m")?;
    Ok((periodic, periods))
}

fn periodic_fv(pv: Decimal, rate: Decimal, years: Decimal, m: Decimal) -> TvmResult<Decimal> {
    let (periodic, periods) = periodic_terms(rate, years, m)?;
    time_value::future_value(pv, periodic, periods)
}

pub fn periodic_compound_fv(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    periodic_fv(
        inputs.get(PV)?,
        inputs.rate(R)?,
        inputs.get(N)?,
        inputs.positive(M)?,
    )
}

pub fn periodic_compound_pv(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    let (periodic, periods) =
        periodic_terms(inputs.rate(R)?, inputs.get(N)?, inputs.positive(M)?)?;
    time_value::present_value(inputs.get(FV)?, periodic, periods)
}

pub fn periodic_compound_rate(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    let ratio = inputs.positive_ratio(FV, PV)?;
    let m = inputs.positive(M)?;
    let periods = math::try_mul(inputs.get(N)?, m, "n·m")?;
    let inv_periods = math::try_div(Decimal::ONE, periods, "n")?;
    let periodic = math::try_pow(ratio, inv_periods, "FV")? - Decimal::ONE;
    math::try_percent(math::try_mul(periodic, m, "r")?, "r")
}

pub fn periodic_compound_periods(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    let ratio = inputs.positive_ratio(FV, PV)?;
    let m = inputs.positive(M)?;
    let periodic = math::try_div(inputs.rate(R)?, m, "m")?;
    let one_plus_periodic = math::try_add(Decimal::ONE, periodic, "r")?;
    let growth = math::try_ln(one_plus_periodic, "r")?;
    let denominator = math::try_mul(m, growth, "m·ln(1 + r/m)")?;
    math::try_div(math::try_ln(ratio, "FV")?, denominator, "m·ln(1 + r/m)")
}

/// No closed form for m: Newton on FV(m).
pub fn periodic_compound_frequency(
    inputs: &FormulaInputs,
    config: &SolverConfig,
) -> TvmResult<SolverResult> {
    let pv = inputs.get(PV)?;
    let fv = inputs.get(FV)?;
    let rate = inputs.rate(R)?;
    let years = inputs.get(N)?;
    solver::solve_for_variable(fv, |m| periodic_fv(pv, rate, years, m), config)
}

// ---------------------------------------------------------------------------
// Continuous compounding: FV = PV·e^(r·t)
// ---------------------------------------------------------------------------

fn continuous_growth(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    let exponent = math::try_mul(inputs.rate(R)?, inputs.get(T)?, "r·t")?;
    math::try_exp(exponent, "r")
}

pub fn continuous_fv(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    math::try_mul(inputs.get(PV)?, continuous_growth(inputs)?, "FV")
}

pub fn continuous_pv(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    math::try_div(inputs.get(FV)?, continuous_growth(inputs)?, "e^(r·t)")
}

pub fn continuous_rate(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    let ratio = inputs.positive_ratio(FV, PV)?;
    let rate = math::try_div(math::try_ln(ratio, "FV")?, inputs.get(T)?, "t")?;
    math::try_percent(rate, "r")
}

pub fn continuous_years(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    let ratio = inputs.positive_ratio(FV, PV)?;
    math::try_div(math::try_ln(ratio, "FV")?, inputs.rate(R)?, "r")
}

// ---------------------------------------------------------------------------
// Effective annual rate: EAR = (1 + r/m)^m - 1
// ---------------------------------------------------------------------------

fn ear_decimal(rate: Decimal, m: Decimal) -> TvmResult<Decimal> {
    let periodic = math::try_div(rate, m, "m")?;
    Ok(time_value::compound_factor(periodic, m)? - Decimal::ONE)
}

pub fn effective_rate(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    let ear = ear_decimal(inputs.rate(R)?, inputs.positive(M)?)?;
    math::try_percent(ear, "EAR")
}

pub fn nominal_rate(inputs: &FormulaInputs) -> TvmResult<Decimal> {
    let m = inputs.positive(M)?;
    let inv_m = math::try_div(Decimal::ONE, m, "m")?;
    let one_plus_ear = math::try_add(Decimal::ONE, inputs.rate(EAR)?, "EAR")?;
    let root = math::try_pow(one_plus_ear, inv_m, "EAR")?;
    let rate = math::try_mul(m, root - Decimal::ONE, "r")?;
    math::try_percent(rate, "r")
}

/// No closed form for m: Newton on EAR(m), in decimal-rate space.
pub fn effective_rate_frequency(
    inputs: &FormulaInputs,
    config: &SolverConfig,
) -> TvmResult<SolverResult> {
    let ear = inputs.rate(EAR)?;
    let rate = inputs.rate(R)?;
    solver::solve_for_variable(ear, |m| ear_decimal(rate, m), config)
}

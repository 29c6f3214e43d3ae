//! Year-by-year growth paths and the compounding-frequency comparison.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::registry::find_formula;
use super::{Calculation, FormulaInputs, Symbol};
use crate::error::TvmError;
use crate::math;
use crate::time_value;
use crate::types::{percent_to_rate, Money, Percent};
use crate::TvmResult;

use super::Symbol::{Frequency as M, Growth as G, Payment as PMT, Periods as N, PresentValue as PV, Years as T};

/// Longest horizon a timeline will expand, in years.
const MAX_TIMELINE_YEARS: Decimal = dec!(1000);

/// Compounding frequencies compared against continuous compounding.
const COMPARISON_FREQUENCIES: [(u32, &str); 6] = [
    (1, "annually"),
    (2, "semi-annually"),
    (4, "quarterly"),
    (12, "monthly"),
    (52, "weekly"),
    (365, "daily"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub year: Decimal,
    pub value: Money,
    /// Cumulative principal and payments put in by this year.
    pub contributions: Money,
    /// value - contributions
    pub growth: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundingPoint {
    pub label: String,
    /// `None` for continuous compounding.
    pub periods_per_year: Option<u32>,
    pub future_value: Money,
    pub effective_annual_rate: Percent,
}

/// What a family has put in after `year` years.
fn contributions(family: &str, inputs: &FormulaInputs, year: Decimal) -> TvmResult<Money> {
    match family {
        "fva" | "fvad" => {
            let payments = math::try_mul(inputs.get(M)?, year, "m")?;
            math::try_mul(inputs.get(PMT)?, payments, "PMT")
        }
        "gfva" | "gfvad" => {
            let growth = inputs.rate(G)?;
            let pmt = inputs.get(PMT)?;
            if growth.is_zero() {
                return math::try_mul(pmt, year, "PMT");
            }
            let factor = time_value::annuity_fv_factor(growth, year)?;
            math::try_mul(pmt, factor, "PMT")
        }
        _ => inputs.get(PV),
    }
}

/// Future value at every whole year from 0 to the horizon, plus the horizon
/// itself when it is fractional.
///
/// The horizon is `t` for simple interest and continuous compounding, and
/// `n` for every other family. Only families flagged `timeline` qualify.
pub fn growth_timeline(family: &str, inputs: &FormulaInputs) -> TvmResult<Vec<TimelinePoint>> {
    let spec = find_formula(family)?;
    if !spec.timeline {
        return Err(TvmError::invalid(
            "family",
            format!("{} has no growth timeline", spec.id),
        ));
    }
    let value_at = match spec.primary().calculation {
        Calculation::ClosedForm(f) => f,
        Calculation::Numerical { .. } => {
            return Err(TvmError::invalid(
                "family",
                format!("{} has no closed-form primary variation", spec.id),
            ))
        }
    };

    let horizon_symbol: Symbol = if spec.symbols.contains(&T) { T } else { N };
    let horizon = inputs.get(horizon_symbol)?;
    if horizon < Decimal::ZERO || horizon > MAX_TIMELINE_YEARS {
        return Err(TvmError::invalid(
            horizon_symbol.as_str(),
            format!("horizon must be between 0 and {MAX_TIMELINE_YEARS} years"),
        ));
    }

    let mut years: Vec<Decimal> = Vec::new();
    let mut year = Decimal::ZERO;
    while year <= horizon {
        years.push(year);
        year += Decimal::ONE;
    }
    if horizon.fract() != Decimal::ZERO {
        years.push(horizon);
    }

    years
        .into_iter()
        .map(|year| {
            let value = value_at(&inputs.with(horizon_symbol, year))?;
            let contributions = contributions(spec.id, inputs, year)?;
            Ok(TimelinePoint {
                year,
                value,
                contributions,
                growth: math::try_sub(value, contributions, "growth")?,
            })
        })
        .collect()
}

/// FV of `pv` at `rate_percent` for `years` under each standard compounding
/// frequency, finishing with continuous compounding.
pub fn compounding_comparison(
    pv: Money,
    rate_percent: Percent,
    years: Decimal,
) -> TvmResult<Vec<CompoundingPoint>> {
    if years < Decimal::ZERO {
        return Err(TvmError::invalid("years", "years must be >= 0"));
    }
    let rate = percent_to_rate(rate_percent);

    let mut points = Vec::with_capacity(COMPARISON_FREQUENCIES.len() + 1);
    for (m, label) in COMPARISON_FREQUENCIES {
        let m_dec = Decimal::from(m);
        let periodic = rate / m_dec;
        let periods = math::try_mul(years, m_dec, "years")?;
        let future_value = time_value::future_value(pv, periodic, periods)?;
        let ear = math::try_sub(time_value::compound_factor(periodic, m_dec)?, Decimal::ONE, "EAR")?;
        points.push(CompoundingPoint {
            label: label.to_string(),
            periods_per_year: Some(m),
            future_value,
            effective_annual_rate: math::try_percent(ear, "EAR")?,
        });
    }

    let growth = math::try_exp(math::try_mul(rate, years, "r")?, "r")?;
    let ear = math::try_sub(math::try_exp(rate, "r")?, Decimal::ONE, "EAR")?;
    points.push(CompoundingPoint {
        label: "continuous".to_string(),
        periods_per_year: None,
        future_value: math::try_mul(pv, growth, "FV")?,
        effective_annual_rate: math::try_percent(ear, "EAR")?,
    });

    Ok(points)
}

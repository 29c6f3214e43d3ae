//! Checked Decimal transcendental helpers.
//!
//! `rust_decimal` panics on overflow in `+`, `-`, `*` and `/`, and its
//! fractional `powd` loses precision for the long exponents that show up in
//! TVM work (e.g. 360 monthly periods). Integer powers go through
//! `MathematicalOps::checked_powi`; `exp` and `ln` are series with range
//! reduction. Everything reports overflow or an undefined result as `None`,
//! and the `try_*` wrappers turn that into a `TvmError` naming the offending
//! symbol. Formula code never uses the bare operators on caller input.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;

use crate::error::TvmError;
use crate::TvmResult;

/// ln(2) to 28 significant digits.
const LN_2: Decimal = dec!(0.6931471805599453094172321215);

/// exp(x) overflows Decimal::MAX (~7.9e28) above this argument.
const EXP_MAX_ARG: Decimal = dec!(66);

/// Below this argument exp(x) is smaller than the smallest Decimal step.
const EXP_MIN_ARG: Decimal = dec!(-66);

const TAYLOR_EXP_TERMS: u32 = 40;
const ATANH_SERIES_TERMS: u32 = 40;

/// Exponents with a larger magnitude are never treated as integer powers.
const MAX_INTEGER_EXPONENT: i64 = 1_000_000;

/// e^x with range reduction: exp(x) = exp(x / 2^k)^(2^k).
pub fn exp(x: Decimal) -> Option<Decimal> {
    if x > EXP_MAX_ARG {
        return None;
    }
    if x < EXP_MIN_ARG {
        return Some(Decimal::ZERO);
    }
    if x < Decimal::ZERO {
        let pos = exp(-x)?;
        return Decimal::ONE.checked_div(pos);
    }

    let mut k: u32 = 0;
    let mut reduced = x;
    while reduced > dec!(0.5) {
        reduced /= dec!(2);
        k += 1;
    }

    let mut sum = Decimal::ONE;
    let mut term = Decimal::ONE;
    for n in 1..=TAYLOR_EXP_TERMS {
        term = term.checked_mul(reduced)? / Decimal::from(n);
        if term.is_zero() {
            break;
        }
        sum += term;
    }

    for _ in 0..k {
        sum = sum.checked_mul(sum)?;
    }
    Some(sum)
}

/// Natural logarithm. `None` for non-positive arguments.
///
/// Reduces x = y * 2^k with y in [0.75, 1.5], then sums the atanh series
/// ln(y) = 2 * (z + z^3/3 + z^5/5 + ...), z = (y - 1) / (y + 1).
pub fn ln(x: Decimal) -> Option<Decimal> {
    if x <= Decimal::ZERO {
        return None;
    }
    if x == Decimal::ONE {
        return Some(Decimal::ZERO);
    }

    let mut k: i64 = 0;
    let mut y = x;
    while y > dec!(1.5) {
        y /= dec!(2);
        k += 1;
    }
    while y < dec!(0.75) {
        y *= dec!(2);
        k -= 1;
    }

    let z = (y - Decimal::ONE) / (y + Decimal::ONE);
    let z2 = z * z;
    let mut power = z;
    let mut series = Decimal::ZERO;
    for n in 0..ATANH_SERIES_TERMS {
        let term = power / Decimal::from(2 * n + 1);
        if term.is_zero() {
            break;
        }
        series += term;
        power *= z2;
    }

    Some(Decimal::from(k) * LN_2 + dec!(2) * series)
}

/// base^n for an integer exponent. `None` on overflow or 0^-n.
pub fn powi(base: Decimal, n: i64) -> Option<Decimal> {
    base.checked_powi(n)
}

/// base^exponent for an arbitrary Decimal exponent.
///
/// Integer exponents go through `powi` (exact up to rounding, and defined
/// for negative bases). Fractional exponents need base > 0.
pub fn pow(base: Decimal, exponent: Decimal) -> Option<Decimal> {
    if exponent.is_zero() {
        return Some(Decimal::ONE);
    }
    if exponent.fract().is_zero() {
        if let Some(n) = exponent.to_i64() {
            if n.abs() <= MAX_INTEGER_EXPONENT {
                return powi(base, n);
            }
        }
    }
    if base <= Decimal::ZERO {
        return None;
    }
    if base == Decimal::ONE {
        return Some(Decimal::ONE);
    }
    exp(exponent.checked_mul(ln(base)?)?)
}

/// `pow` reporting failure as a domain error on `symbol`.
pub fn try_pow(base: Decimal, exponent: Decimal, symbol: &str) -> TvmResult<Decimal> {
    pow(base, exponent).ok_or_else(|| {
        TvmError::domain(
            symbol,
            format!("{base}^{exponent} is undefined or out of range"),
        )
    })
}

/// `ln` reporting failure as a domain error on `symbol`.
pub fn try_ln(x: Decimal, symbol: &str) -> TvmResult<Decimal> {
    ln(x).ok_or_else(|| TvmError::domain(symbol, format!("logarithm of non-positive value {x}")))
}

/// `exp` reporting failure as a domain error on `symbol`.
pub fn try_exp(x: Decimal, symbol: &str) -> TvmResult<Decimal> {
    exp(x).ok_or_else(|| TvmError::domain(symbol, format!("e^{x} is out of range")))
}

/// Checked division reporting a zero denominator with `context`.
pub fn try_div(numerator: Decimal, denominator: Decimal, context: &str) -> TvmResult<Decimal> {
    if denominator.is_zero() {
        return Err(TvmError::DivisionByZero {
            context: context.to_string(),
        });
    }
    numerator
        .checked_div(denominator)
        .ok_or_else(|| TvmError::domain(context, "quotient out of range"))
}

/// Checked multiplication reporting overflow as a domain error.
pub fn try_mul(a: Decimal, b: Decimal, context: &str) -> TvmResult<Decimal> {
    a.checked_mul(b)
        .ok_or_else(|| TvmError::domain(context, "product out of range"))
}

pub fn try_add(a: Decimal, b: Decimal, context: &str) -> TvmResult<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| TvmError::domain(context, "sum out of range"))
}

pub fn try_sub(a: Decimal, b: Decimal, context: &str) -> TvmResult<Decimal> {
    a.checked_sub(b)
        .ok_or_else(|| TvmError::domain(context, "difference out of range"))
}

/// Decimal rate to a boundary percentage.
pub fn try_percent(rate: Decimal, symbol: &str) -> TvmResult<Decimal> {
    try_mul(rate, Decimal::ONE_HUNDRED, symbol)
}

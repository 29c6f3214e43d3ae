use rust_decimal::Decimal;

use crate::error::TvmError;
use crate::math;
use crate::types::{Money, Rate};
use crate::TvmResult;

/// Growth factor (1 + rate)^periods. Periods may be fractional.
pub fn compound_factor(rate: Rate, periods: Decimal) -> TvmResult<Decimal> {
    let base = math::try_add(Decimal::ONE, rate, "r")?;
    math::try_pow(base, periods, "r")
}

/// Future value of a lump sum.
pub fn future_value(present_value: Money, rate: Rate, periods: Decimal) -> TvmResult<Money> {
    let factor = compound_factor(rate, periods)?;
    math::try_mul(present_value, factor, "FV")
}

/// Present value of a lump sum.
pub fn present_value(future_value: Money, rate: Rate, periods: Decimal) -> TvmResult<Money> {
    let factor = compound_factor(rate, periods)?;
    math::try_div(future_value, factor, "PV discount factor")
}

/// Present value of 1 paid at the end of each of `periods` periods.
pub fn annuity_pv_factor(rate: Rate, periods: Decimal) -> TvmResult<Decimal> {
    if rate.is_zero() {
        return Ok(periods);
    }

    let factor = compound_factor(rate, periods)?;
    if factor.is_zero() {
        return Err(TvmError::DivisionByZero {
            context: "annuity PV factor".into(),
        });
    }

    let discount = math::try_div(Decimal::ONE, factor, "annuity PV factor")?;
    math::try_div(Decimal::ONE - discount, rate, "annuity PV factor")
}

/// Future value of 1 paid at the end of each of `periods` periods.
pub fn annuity_fv_factor(rate: Rate, periods: Decimal) -> TvmResult<Decimal> {
    if rate.is_zero() {
        return Ok(periods);
    }

    let factor = compound_factor(rate, periods)?;
    let growth = math::try_sub(factor, Decimal::ONE, "annuity FV factor")?;
    math::try_div(growth, rate, "annuity FV factor")
}

/// Level payment that amortizes `principal` over `periods` at `rate` per period.
pub fn pmt(principal: Money, rate: Rate, periods: Decimal) -> TvmResult<Money> {
    if periods <= Decimal::ZERO {
        return Err(TvmError::InvalidInput {
            field: "periods".into(),
            reason: "Number of periods must be > 0".into(),
        });
    }

    if rate.is_zero() {
        return math::try_div(principal, periods, "PMT periods");
    }

    let annuity_factor = annuity_pv_factor(rate, periods)?;
    if annuity_factor.is_zero() {
        return Err(TvmError::DivisionByZero {
            context: "PMT annuity factor".into(),
        });
    }

    math::try_div(principal, annuity_factor, "PMT annuity factor")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_future_value_basic() {
        let result = future_value(dec!(1000), dec!(0.05), dec!(10)).unwrap();
        // 1000 * 1.05^10 = 1628.894627
        assert!((result - dec!(1628.894627)).abs() < dec!(0.00001));
    }

    #[test]
    fn test_present_value_inverts_future_value() {
        let fv = future_value(dec!(2500), dec!(0.0075), dec!(48)).unwrap();
        let pv = present_value(fv, dec!(0.0075), dec!(48)).unwrap();
        assert!((pv - dec!(2500)).abs() < dec!(0.0000001));
    }

    #[test]
    fn test_annuity_pv_factor() {
        // 100 * (1 - 1/1.08^10) / 0.08 = ~671.01
        let result = dec!(100) * annuity_pv_factor(dec!(0.08), dec!(10)).unwrap();
        assert!((result - dec!(671.0081)).abs() < dec!(0.001));
    }

    #[test]
    fn test_annuity_factors_zero_rate() {
        assert_eq!(annuity_pv_factor(Decimal::ZERO, dec!(12)).unwrap(), dec!(12));
        assert_eq!(annuity_fv_factor(Decimal::ZERO, dec!(12)).unwrap(), dec!(12));
    }

    #[test]
    fn test_pmt_mortgage() {
        // 500k, 6% / 12, 360 periods => ~2,997.75
        let result = pmt(dec!(500_000), dec!(0.005), dec!(360)).unwrap();
        assert!((result - dec!(2997.75)).abs() < dec!(0.01));
    }

    #[test]
    fn test_pmt_zero_periods_rejected() {
        assert!(pmt(dec!(1000), dec!(0.01), Decimal::ZERO).is_err());
    }

    #[test]
    fn test_negative_base_fractional_periods_is_domain() {
        let err = compound_factor(dec!(-2), dec!(1.5)).unwrap_err();
        assert!(err.is_domain());
    }
}

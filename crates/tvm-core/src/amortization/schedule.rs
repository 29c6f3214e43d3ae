use chrono::{Days, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Instant;
use tracing::{debug, trace, warn};

use super::{
    AmortizationInput, AmortizationOutput, LoanType, PaymentFrequency, PaymentRecord,
    RateChange, ScheduleSummary,
};
use crate::error::TvmError;
use crate::math;
use crate::time_value;
use crate::types::{percent_to_rate, with_metadata, ComputationOutput, Money};
use crate::TvmResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Balances at or below this are treated as fully repaid.
const PAYOFF_THRESHOLD: Decimal = dec!(0.01);
/// Periods allowed beyond the contractual term before the run is cut off.
const SAFETY_MARGIN_PERIODS: Decimal = dec!(100);
const MONTHS_PER_YEAR: Decimal = dec!(12);
/// Upper bound on the records reserved up front.
const MAX_PREALLOCATED_PERIODS: usize = 1_200;

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

struct ScheduleRun {
    scheduled_payment: Money,
    records: Vec<PaymentRecord>,
    rate_changes_applied: u32,
    hit_safety_cap: bool,
}

/// Generate the full payment schedule for a loan.
pub fn generate_schedule(input: &AmortizationInput) -> TvmResult<Vec<PaymentRecord>> {
    let mut warnings = Vec::new();
    validate_input(input)?;
    Ok(run_schedule(input, &mut warnings)?.records)
}

/// Generate the schedule and wrap it with a summary and a comparison
/// against the same loan with extras and offset switched off.
pub fn build_amortization(
    input: &AmortizationInput,
) -> TvmResult<ComputationOutput<AmortizationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;

    let run = run_schedule(input, &mut warnings)?;

    let baseline = if input.extras_enabled() || input.offset_enabled() {
        let plain = AmortizationInput {
            extra_payment: None,
            offset_account: None,
            ..input.clone()
        };
        // Warnings from the baseline would repeat the main run's
        Some(run_schedule(&plain, &mut Vec::new())?)
    } else {
        None
    };

    let summary = summarize(&run, baseline.as_ref())?;
    debug!(
        payments = summary.number_of_payments,
        total_interest = %summary.total_interest,
        hit_safety_cap = summary.hit_safety_cap,
        "amortization schedule built"
    );

    let output = AmortizationOutput {
        scheduled_payment: run.scheduled_payment,
        schedule: run.records,
        summary,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Level-payment amortization with variable rate, extra payments and offset account",
        &serde_json::json!({
            "principal": input.loan.principal.to_string(),
            "annual_rate": input.loan.annual_rate.to_string(),
            "term_years": input.loan.term_years.to_string(),
            "payments_per_year": input.loan.payments_per_year.periods_per_year(),
            "loan_type": input.loan.loan_type,
            "rate_changes": input.rate_changes.len(),
            "extra_payments": input.extras_enabled(),
            "offset_account": input.offset_enabled(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn run_schedule(input: &AmortizationInput, warnings: &mut Vec<String>) -> TvmResult<ScheduleRun> {
    let loan = &input.loan;
    let frequency = loan.payments_per_year;
    let ppy = Decimal::from(frequency.periods_per_year());
    let term_periods = math::try_mul(loan.term_years, ppy, "term_years")?;
    let safety_cap = math::try_add(term_periods, SAFETY_MARGIN_PERIODS, "term_years")?;

    let scheduled_payment = time_value::pmt(loan.principal, loan.annual_rate / ppy, term_periods)?;

    // Fixed loans with queued changes are rejected by validation
    let mut rate_changes: Vec<&RateChange> = input.rate_changes.iter().collect();
    rate_changes.sort_by_key(|c| c.effective_date);
    let mut next_change = 0usize;

    let (offset_enabled, mut offset_balance, offset_contribution) = match &input.offset_account {
        Some(offset) if offset.enabled => (
            true,
            offset.initial_balance,
            math::try_mul(offset.monthly_contribution, ppy, "offset_account")? / MONTHS_PER_YEAR,
        ),
        _ => (false, Decimal::ZERO, Decimal::ZERO),
    };

    let mut annual_rate = loan.annual_rate;
    let mut balance = loan.principal;
    let mut cumulative_interest = Decimal::ZERO;
    let mut cumulative_principal = Decimal::ZERO;
    let mut cumulative_interest_saved = Decimal::ZERO;
    let mut rate_changes_applied = 0u32;
    let mut hit_safety_cap = false;
    let mut warned_negative_amortization = false;

    let mut records: Vec<PaymentRecord> = Vec::with_capacity(
        term_periods
            .to_usize()
            .unwrap_or_default()
            .min(MAX_PREALLOCATED_PERIODS),
    );
    let mut payment_number: u32 = 0;

    while balance > PAYOFF_THRESHOLD {
        payment_number += 1;
        if Decimal::from(payment_number) > safety_cap {
            hit_safety_cap = true;
            break;
        }
        let date = period_date(loan.start_date, frequency, payment_number)?;

        // At most one queued change per period
        let mut rate_changed = false;
        if let Some(change) = rate_changes.get(next_change) {
            if change.effective_date <= date {
                annual_rate = percent_to_rate(change.new_rate_percent);
                rate_changed = true;
                next_change += 1;
                rate_changes_applied += 1;
            }
        }
        let periodic_rate = annual_rate / ppy;

        let effective_balance = if offset_enabled {
            (balance - offset_balance).max(Decimal::ZERO)
        } else {
            balance
        };
        let interest = math::try_mul(effective_balance, periodic_rate, "interest")?;
        let standard_interest = math::try_mul(balance, periodic_rate, "interest")?;
        let interest_saved = standard_interest - interest;

        let extra = input
            .extra_payment
            .as_ref()
            .map(|p| p.amount_for(payment_number, frequency))
            .unwrap_or(Decimal::ZERO);

        let mut scheduled_principal = (scheduled_payment - interest).min(balance);
        if scheduled_principal < Decimal::ZERO {
            if !warned_negative_amortization {
                warnings.push(format!(
                    "Scheduled payment {scheduled_payment} does not cover interest {interest} in period {payment_number}; principal floored at zero"
                ));
                warned_negative_amortization = true;
            }
            scheduled_principal = Decimal::ZERO;
        }
        let principal = math::try_add(scheduled_principal, extra, "extra_payment")?.min(balance);
        let extra_applied = principal - scheduled_principal;

        balance = (balance - principal).max(Decimal::ZERO);

        if offset_enabled {
            offset_balance = math::try_add(offset_balance, offset_contribution, "offset_balance")?;
        }

        cumulative_interest = math::try_add(cumulative_interest, interest, "interest")?;
        cumulative_principal += principal;
        cumulative_interest_saved =
            math::try_add(cumulative_interest_saved, interest_saved, "interest_saved")?;

        trace!(
            payment_number,
            %date,
            %interest,
            %principal,
            %balance,
            "amortization period"
        );

        records.push(PaymentRecord {
            payment_number,
            date,
            scheduled_payment,
            extra_payment_applied: extra_applied,
            interest_payment: interest,
            principal_payment: principal,
            remaining_balance: balance,
            current_annual_rate_percent: math::try_percent(annual_rate, "annual_rate")?,
            offset_balance,
            interest_saved,
            cumulative_interest,
            cumulative_principal,
            cumulative_interest_saved,
            effective_balance,
            rate_changed_this_period: rate_changed,
        });
    }

    if hit_safety_cap {
        warn!(
            periods = records.len(),
            %balance,
            "amortization stopped at safety cap"
        );
        warnings.push(format!(
            "Schedule stopped after {} payments with {} still outstanding",
            records.len(),
            balance
        ));
    }

    Ok(ScheduleRun {
        scheduled_payment,
        records,
        rate_changes_applied,
        hit_safety_cap,
    })
}

/// Date of `payment_number`: the start date plus whole days of elapsed periods.
fn period_date(
    start: NaiveDate,
    frequency: PaymentFrequency,
    payment_number: u32,
) -> TvmResult<NaiveDate> {
    let elapsed = Decimal::from(payment_number - 1) * frequency.day_increment();
    let days = elapsed
        .floor()
        .to_u64()
        .ok_or_else(|| TvmError::DateError(format!("{elapsed} days out of range")))?;
    start
        .checked_add_days(Days::new(days))
        .ok_or_else(|| TvmError::DateError(format!("{start} + {days} days out of range")))
}

fn summarize(run: &ScheduleRun, baseline: Option<&ScheduleRun>) -> TvmResult<ScheduleSummary> {
    let records = &run.records;
    let last = records.last();

    let total_interest = last.map(|r| r.cumulative_interest).unwrap_or_default();
    let total_principal = last.map(|r| r.cumulative_principal).unwrap_or_default();
    let total_extra_payments: Money = records.iter().map(|r| r.extra_payment_applied).sum();
    let number_of_payments = records.len() as u32;

    let (baseline_payments, payments_saved, interest_saved_vs_baseline) = match baseline {
        Some(base) => {
            let base_payments = base.records.len() as u32;
            let base_interest = base
                .records
                .last()
                .map(|r| r.cumulative_interest)
                .unwrap_or_default();
            (
                base_payments,
                base_payments.saturating_sub(number_of_payments),
                base_interest - total_interest,
            )
        }
        None => (number_of_payments, 0, Decimal::ZERO),
    };

    Ok(ScheduleSummary {
        number_of_payments,
        total_interest,
        total_principal,
        total_extra_payments,
        total_paid: math::try_add(total_interest, total_principal, "total_paid")?,
        total_interest_saved: last.map(|r| r.cumulative_interest_saved).unwrap_or_default(),
        final_offset_balance: last.map(|r| r.offset_balance).unwrap_or_default(),
        payoff_date: if run.hit_safety_cap {
            None
        } else {
            last.map(|r| r.date)
        },
        rate_changes_applied: run.rate_changes_applied,
        hit_safety_cap: run.hit_safety_cap,
        baseline_payments,
        payments_saved,
        interest_saved_vs_baseline,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_input(input: &AmortizationInput) -> TvmResult<()> {
    let loan = &input.loan;
    if loan.principal <= Decimal::ZERO {
        return Err(TvmError::InvalidInput {
            field: "principal".into(),
            reason: "Principal must be positive".into(),
        });
    }
    if loan.term_years <= Decimal::ZERO {
        return Err(TvmError::InvalidInput {
            field: "term_years".into(),
            reason: "Term must be positive".into(),
        });
    }
    if loan.annual_rate <= -Decimal::ONE {
        return Err(TvmError::InvalidInput {
            field: "annual_rate".into(),
            reason: "Annual rate must be greater than -100%".into(),
        });
    }
    if loan.loan_type == LoanType::Fixed && !input.rate_changes.is_empty() {
        return Err(TvmError::InvalidInput {
            field: "rate_changes".into(),
            reason: format!(
                "Fixed-rate loan cannot take {} rate change(s); set loan_type to variable",
                input.rate_changes.len()
            ),
        });
    }
    for change in &input.rate_changes {
        if change.new_rate_percent <= -Decimal::ONE_HUNDRED {
            return Err(TvmError::InvalidInput {
                field: "rate_changes".into(),
                reason: format!(
                    "Rate change on {} must be greater than -100%",
                    change.effective_date
                ),
            });
        }
    }
    if let Some(extra) = &input.extra_payment {
        if extra.amount < Decimal::ZERO {
            return Err(TvmError::InvalidInput {
                field: "extra_payment.amount".into(),
                reason: "Extra payment cannot be negative".into(),
            });
        }
    }
    if let Some(offset) = &input.offset_account {
        if offset.initial_balance < Decimal::ZERO {
            return Err(TvmError::InvalidInput {
                field: "offset_account.initial_balance".into(),
                reason: "Offset balance cannot be negative".into(),
            });
        }
        if offset.monthly_contribution < Decimal::ZERO {
            return Err(TvmError::InvalidInput {
                field: "offset_account.monthly_contribution".into(),
                reason: "Offset contribution cannot be negative".into(),
            });
        }
    }
    check_term_fits_calendar(input)
}

/// The last period the run may reach, safety margin included, must have a
/// representable date.
fn check_term_fits_calendar(input: &AmortizationInput) -> TvmResult<()> {
    let loan = &input.loan;
    let too_long = || TvmError::InvalidInput {
        field: "term_years".into(),
        reason: format!("Term of {} years runs past the calendar", loan.term_years),
    };
    let ppy = Decimal::from(loan.payments_per_year.periods_per_year());
    let last_period = loan
        .term_years
        .checked_mul(ppy)
        .and_then(|periods| periods.checked_add(SAFETY_MARGIN_PERIODS))
        .and_then(|periods| periods.ceil().to_u32())
        .ok_or_else(too_long)?;
    period_date(loan.start_date, loan.payments_per_year, last_period).map_err(|_| too_long())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amortization::{ExtraPaymentFrequency, ExtraPaymentPolicy, LoanParameters, OffsetAccount};

    fn loan(principal: Decimal, rate: Decimal, years: Decimal) -> AmortizationInput {
        AmortizationInput::new(LoanParameters {
            principal,
            annual_rate: rate,
            term_years: years,
            payments_per_year: PaymentFrequency::Monthly,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            loan_type: LoanType::Variable,
        })
    }

    #[test]
    fn test_zero_rate_loan_is_straight_line() {
        let schedule = generate_schedule(&loan(dec!(1200), Decimal::ZERO, dec!(1))).unwrap();
        assert_eq!(schedule.len(), 12);
        assert!(schedule.iter().all(|r| r.principal_payment == dec!(100)));
        assert!(schedule.iter().all(|r| r.interest_payment.is_zero()));
        assert_eq!(schedule[11].remaining_balance, Decimal::ZERO);
    }

    #[test]
    fn test_period_dates_accumulate_fractional_days() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(period_date(start, PaymentFrequency::Monthly, 1).unwrap(), start);
        // floor(30.4167) = 30
        assert_eq!(
            period_date(start, PaymentFrequency::Monthly, 2).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
        );
        // floor(3 * 30.4167) = 91
        assert_eq!(
            period_date(start, PaymentFrequency::Monthly, 4).unwrap(),
            NaiveDate::from_ymd_opt(2025, 4, 2).unwrap()
        );
        // floor(4 * 365.25) = 1461
        assert_eq!(
            period_date(start, PaymentFrequency::Annual, 5).unwrap(),
            NaiveDate::from_ymd_opt(2029, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_one_rate_change_per_period() {
        let mut input = loan(dec!(100000), dec!(0.05), dec!(5));
        // Both already due at period 1; the second waits for period 2
        input.rate_changes = vec![
            RateChange {
                effective_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                new_rate_percent: dec!(7),
            },
            RateChange {
                effective_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                new_rate_percent: dec!(6),
            },
        ];
        let schedule = generate_schedule(&input).unwrap();
        assert!(schedule[0].rate_changed_this_period);
        assert_eq!(schedule[0].current_annual_rate_percent, dec!(6));
        assert!(schedule[1].rate_changed_this_period);
        assert_eq!(schedule[1].current_annual_rate_percent, dec!(7));
        assert!(!schedule[2].rate_changed_this_period);
        assert_eq!(schedule[1].scheduled_payment, schedule[0].scheduled_payment);
    }

    #[test]
    fn test_fixed_loan_rejects_rate_changes() {
        let mut input = loan(dec!(100000), dec!(0.05), dec!(5));
        input.loan.loan_type = LoanType::Fixed;
        input.rate_changes = vec![RateChange {
            effective_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            new_rate_percent: dec!(9),
        }];
        for err in [
            generate_schedule(&input).unwrap_err(),
            build_amortization(&input).unwrap_err(),
        ] {
            assert!(matches!(
                err,
                TvmError::InvalidInput { ref field, .. } if field == "rate_changes"
            ));
        }

        input.rate_changes.clear();
        let out = build_amortization(&input).unwrap();
        assert!(out
            .result
            .schedule
            .iter()
            .all(|r| r.current_annual_rate_percent == dec!(5) && !r.rate_changed_this_period));
        assert_eq!(out.result.summary.rate_changes_applied, 0);
    }

    #[test]
    fn test_rate_rise_triggers_negative_amortization_guard() {
        let mut input = loan(dec!(100000), dec!(0.01), dec!(30));
        input.rate_changes = vec![RateChange {
            effective_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            new_rate_percent: dec!(20),
        }];
        let out = build_amortization(&input).unwrap();
        let schedule = &out.result.schedule;
        assert!(schedule
            .windows(2)
            .all(|w| w[1].remaining_balance <= w[0].remaining_balance));
        assert!(out.result.summary.hit_safety_cap);
        assert_eq!(out.result.summary.payoff_date, None);
        assert_eq!(schedule.len(), 460);
        assert!(out.warnings.iter().any(|w| w.contains("does not cover interest")));
        assert!(out.warnings.iter().any(|w| w.contains("still outstanding")));
    }

    #[test]
    fn test_offset_reduces_interest() {
        let mut input = loan(dec!(200000), dec!(0.06), dec!(25));
        input.offset_account = Some(OffsetAccount {
            enabled: true,
            initial_balance: dec!(20000),
            monthly_contribution: dec!(500),
        });
        let out = build_amortization(&input).unwrap();
        let first = &out.result.schedule[0];
        assert_eq!(first.effective_balance, dec!(180000));
        assert_eq!(first.interest_payment, dec!(900));
        assert_eq!(first.interest_saved, dec!(100));
        assert_eq!(first.offset_balance, dec!(20500));
        let summary = &out.result.summary;
        assert!(summary.payments_saved > 0);
        assert!(summary.interest_saved_vs_baseline > Decimal::ZERO);
    }

    #[test]
    fn test_extra_payment_applied_is_capped_at_balance() {
        let mut input = loan(dec!(1000), dec!(0.12), dec!(1));
        input.extra_payment = Some(ExtraPaymentPolicy {
            enabled: true,
            amount: dec!(600),
            frequency: ExtraPaymentFrequency::EveryPayment,
        });
        let schedule = generate_schedule(&input).unwrap();
        assert_eq!(schedule.len(), 2);
        let last = &schedule[1];
        assert_eq!(last.remaining_balance, Decimal::ZERO);
        assert!(last.extra_payment_applied < dec!(600));
        let total: Decimal = schedule.iter().map(|r| r.principal_payment).sum();
        assert_eq!(total, dec!(1000));
    }

    #[test]
    fn test_validation_errors() {
        let bad_principal = loan(Decimal::ZERO, dec!(0.05), dec!(10));
        assert!(matches!(
            generate_schedule(&bad_principal).unwrap_err(),
            TvmError::InvalidInput { ref field, .. } if field == "principal"
        ));

        let bad_term = loan(dec!(1000), dec!(0.05), Decimal::ZERO);
        assert!(generate_schedule(&bad_term).unwrap_err().is_invalid_argument());

        let mut bad_offset = loan(dec!(1000), dec!(0.05), dec!(10));
        bad_offset.offset_account = Some(OffsetAccount {
            enabled: true,
            initial_balance: dec!(-1),
            monthly_contribution: Decimal::ZERO,
        });
        assert!(generate_schedule(&bad_offset).is_err());
    }

    #[test]
    fn test_term_past_calendar_rejected_before_running() {
        // 1e9 years at zero rate would otherwise run billions of periods
        let endless = loan(dec!(1000), Decimal::ZERO, dec!(1000000000));
        assert!(matches!(
            generate_schedule(&endless).unwrap_err(),
            TvmError::InvalidInput { ref field, .. } if field == "term_years"
        ));

        let overflowing = loan(dec!(1000), dec!(0.05), Decimal::MAX);
        assert!(build_amortization(&overflowing)
            .unwrap_err()
            .is_invalid_argument());
    }

    #[test]
    fn test_long_term_reserves_bounded_capacity() {
        // 400 years of monthly payments is past the reservation bound
        let input = loan(dec!(4800), Decimal::ZERO, dec!(400));
        let schedule = generate_schedule(&input).unwrap();
        assert_eq!(schedule.len(), 4800);
        assert!(schedule.iter().all(|r| r.principal_payment == Decimal::ONE));
        assert_eq!(schedule.last().unwrap().remaining_balance, Decimal::ZERO);
    }

    #[test]
    fn test_oversized_rate_is_domain_error() {
        let input = loan(Decimal::MAX / dec!(2), Decimal::MAX / dec!(1000), dec!(1));
        let err = generate_schedule(&input).unwrap_err();
        assert!(err.is_domain());
    }
}

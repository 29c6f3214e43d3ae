use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use tvm_core::amortization::{
    build_amortization, generate_schedule, AmortizationInput, ExtraPaymentFrequency,
    ExtraPaymentPolicy, LoanParameters, LoanType, OffsetAccount, PaymentFrequency,
    PaymentRecord, RateChange,
};
use tvm_core::TvmError;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn loan(
    principal: Decimal,
    annual_rate: Decimal,
    term_years: Decimal,
    frequency: PaymentFrequency,
) -> AmortizationInput {
    AmortizationInput::new(LoanParameters {
        principal,
        annual_rate,
        term_years,
        payments_per_year: frequency,
        start_date: date(2025, 1, 1),
        loan_type: LoanType::Variable,
    })
}

fn every_payment(amount: Decimal) -> Option<ExtraPaymentPolicy> {
    Some(ExtraPaymentPolicy {
        enabled: true,
        amount,
        frequency: ExtraPaymentFrequency::EveryPayment,
    })
}

/// Loans with and without extras, offsets and rate changes.
fn sample_inputs() -> Vec<AmortizationInput> {
    let base = loan(dec!(300000), dec!(0.055), dec!(30), PaymentFrequency::Monthly);

    let mut with_extra = base.clone();
    with_extra.extra_payment = every_payment(dec!(200));

    let mut biweekly_monthly_extra =
        loan(dec!(300000), dec!(0.055), dec!(30), PaymentFrequency::Biweekly);
    biweekly_monthly_extra.extra_payment = Some(ExtraPaymentPolicy {
        enabled: true,
        amount: dec!(100),
        frequency: ExtraPaymentFrequency::Monthly,
    });

    let mut with_offset = base.clone();
    with_offset.offset_account = Some(OffsetAccount {
        enabled: true,
        initial_balance: dec!(50000),
        monthly_contribution: dec!(1000),
    });

    let mut large_offset = loan(dec!(100000), dec!(0.04), dec!(15), PaymentFrequency::Weekly);
    large_offset.offset_account = Some(OffsetAccount {
        enabled: true,
        initial_balance: dec!(150000),
        monthly_contribution: Decimal::ZERO,
    });

    let mut variable = base.clone();
    variable.rate_changes = vec![
        RateChange {
            effective_date: date(2027, 1, 1),
            new_rate_percent: dec!(5.75),
        },
        RateChange {
            effective_date: date(2026, 1, 1),
            new_rate_percent: dec!(4.5),
        },
    ];
    variable.extra_payment = Some(ExtraPaymentPolicy {
        enabled: true,
        amount: dec!(5000),
        frequency: ExtraPaymentFrequency::Annually,
    });

    let quarterly_zero_rate = loan(dec!(20000), Decimal::ZERO, dec!(5), PaymentFrequency::Quarterly);

    vec![
        base,
        with_extra,
        biweekly_monthly_extra,
        with_offset,
        large_offset,
        variable,
        quarterly_zero_rate,
    ]
}

fn last(schedule: &[PaymentRecord]) -> &PaymentRecord {
    schedule.last().expect("schedule should not be empty")
}

// ===========================================================================
// Conservation and invariants
// ===========================================================================

#[test]
fn test_principal_is_conserved() {
    for input in sample_inputs() {
        let schedule = generate_schedule(&input).unwrap();
        let principal = input.loan.principal;

        let paid: Decimal = schedule.iter().map(|r| r.principal_payment).sum();
        assert!((paid - principal).abs() <= dec!(0.01), "paid {paid} of {principal}");

        let final_record = last(&schedule);
        assert!(final_record.remaining_balance <= dec!(0.01));
        assert!((final_record.cumulative_principal - principal).abs() <= dec!(0.01));
    }
}

#[test]
fn test_schedule_invariants_hold_for_every_record() {
    for input in sample_inputs() {
        let schedule = generate_schedule(&input).unwrap();
        let scheduled = schedule[0].scheduled_payment;

        for (i, record) in schedule.iter().enumerate() {
            assert_eq!(record.payment_number as usize, i + 1);
            assert_eq!(record.scheduled_payment, scheduled);
            assert!(record.remaining_balance >= Decimal::ZERO);
            assert!(record.effective_balance >= Decimal::ZERO);
            assert!(record.interest_saved >= Decimal::ZERO);
            assert!(record.extra_payment_applied >= Decimal::ZERO);
        }
        for pair in schedule.windows(2) {
            assert!(pair[1].remaining_balance <= pair[0].remaining_balance);
            assert!(pair[1].date > pair[0].date);
        }
    }
}

#[test]
fn test_offset_larger_than_balance_floors_effective_balance() {
    let mut input = loan(dec!(100000), dec!(0.04), dec!(15), PaymentFrequency::Weekly);
    input.offset_account = Some(OffsetAccount {
        enabled: true,
        initial_balance: dec!(150000),
        monthly_contribution: Decimal::ZERO,
    });
    let schedule = generate_schedule(&input).unwrap();
    assert!(schedule.iter().all(|r| r.effective_balance.is_zero()));
    assert!(schedule.iter().all(|r| r.interest_payment.is_zero()));
    // Every payment is pure principal
    let expected = (dec!(100000) / schedule[0].scheduled_payment).ceil();
    assert_eq!(Decimal::from(schedule.len() as u32), expected);
}

// ===========================================================================
// Extra payments
// ===========================================================================

#[test]
fn test_extra_payments_shorten_schedule() {
    let base = loan(dec!(300000), dec!(0.055), dec!(30), PaymentFrequency::Monthly);
    let baseline = generate_schedule(&base).unwrap();
    assert_eq!(baseline.len(), 360);

    for (amount, frequency) in [
        (dec!(200), ExtraPaymentFrequency::EveryPayment),
        (dec!(200), ExtraPaymentFrequency::Monthly),
        (dec!(5000), ExtraPaymentFrequency::Annually),
    ] {
        let mut input = base.clone();
        input.extra_payment = Some(ExtraPaymentPolicy {
            enabled: true,
            amount,
            frequency,
        });
        let schedule = generate_schedule(&input).unwrap();
        assert!(schedule.iter().any(|r| r.extra_payment_applied > Decimal::ZERO));
        assert!(schedule.len() < baseline.len(), "{frequency:?}");
    }
}

#[test]
fn test_disabled_extra_payment_changes_nothing() {
    let base = loan(dec!(300000), dec!(0.055), dec!(30), PaymentFrequency::Monthly);
    let mut input = base.clone();
    input.extra_payment = Some(ExtraPaymentPolicy {
        enabled: false,
        amount: dec!(1000),
        frequency: ExtraPaymentFrequency::EveryPayment,
    });
    assert_eq!(generate_schedule(&input).unwrap(), generate_schedule(&base).unwrap());
}

#[test]
fn test_biweekly_monthly_extra_fires_every_third_payment() {
    let mut input = loan(dec!(300000), dec!(0.055), dec!(30), PaymentFrequency::Biweekly);
    input.extra_payment = Some(ExtraPaymentPolicy {
        enabled: true,
        amount: dec!(100),
        frequency: ExtraPaymentFrequency::Monthly,
    });
    let schedule = generate_schedule(&input).unwrap();
    let with_extra: Vec<u32> = schedule
        .iter()
        .take(9)
        .filter(|r| r.extra_payment_applied > Decimal::ZERO)
        .map(|r| r.payment_number)
        .collect();
    assert_eq!(with_extra, vec![3, 6, 9]);
    assert_eq!(schedule.len(), 706);
}

// ===========================================================================
// Summary
// ===========================================================================

#[test]
fn test_summary_matches_schedule() {
    for input in sample_inputs() {
        let out = build_amortization(&input).unwrap();
        let schedule = &out.result.schedule;
        let summary = &out.result.summary;
        let final_record = last(schedule);

        assert_eq!(summary.number_of_payments as usize, schedule.len());
        assert_eq!(summary.total_interest, final_record.cumulative_interest);
        assert_eq!(summary.total_principal, final_record.cumulative_principal);
        assert_eq!(
            summary.total_paid,
            summary.total_interest + summary.total_principal
        );
        assert_eq!(summary.payoff_date, Some(final_record.date));
        assert!(!summary.hit_safety_cap);

        if input.extras_enabled() || input.offset_enabled() {
            assert!(summary.baseline_payments >= summary.number_of_payments);
            assert_eq!(
                summary.payments_saved,
                summary.baseline_payments - summary.number_of_payments
            );
            assert!(summary.interest_saved_vs_baseline >= Decimal::ZERO);
        } else {
            assert_eq!(summary.baseline_payments, summary.number_of_payments);
            assert_eq!(summary.payments_saved, 0);
            assert_eq!(summary.interest_saved_vs_baseline, Decimal::ZERO);
        }
    }
}

#[test]
fn test_offset_account_saves_interest() {
    let mut input = loan(dec!(300000), dec!(0.055), dec!(30), PaymentFrequency::Monthly);
    input.offset_account = Some(OffsetAccount {
        enabled: true,
        initial_balance: dec!(50000),
        monthly_contribution: dec!(1000),
    });
    let out = build_amortization(&input).unwrap();
    let summary = &out.result.summary;
    assert_eq!(summary.baseline_payments, 360);
    assert_eq!(summary.number_of_payments, 221);
    assert!(summary.total_interest_saved > Decimal::ZERO);
    // 50000 + 221 monthly contributions
    assert_eq!(summary.final_offset_balance, dec!(271000));
}

#[test]
fn test_rate_changes_apply_in_date_order() {
    let mut input = loan(dec!(300000), dec!(0.055), dec!(30), PaymentFrequency::Monthly);
    input.rate_changes = vec![
        RateChange {
            effective_date: date(2027, 1, 1),
            new_rate_percent: dec!(5.75),
        },
        RateChange {
            effective_date: date(2026, 1, 1),
            new_rate_percent: dec!(4.5),
        },
    ];
    let out = build_amortization(&input).unwrap();
    let schedule = &out.result.schedule;
    let changed: Vec<(u32, Decimal)> = schedule
        .iter()
        .filter(|r| r.rate_changed_this_period)
        .map(|r| (r.payment_number, r.current_annual_rate_percent))
        .collect();
    // Periods 13 and 25 fall on 2026-01-01 and 2027-01-01
    assert_eq!(changed, vec![(13, dec!(4.5)), (25, dec!(5.75))]);
    assert!(!out.result.summary.hit_safety_cap);
    assert_eq!(out.result.schedule.len(), 374);
    assert_eq!(out.result.summary.rate_changes_applied, 2);
    assert_eq!(schedule[0].current_annual_rate_percent, dec!(5.5));
}

// ===========================================================================
// Reference loan
// ===========================================================================

#[test]
fn test_thirty_year_monthly_reference_loan() {
    let input = loan(dec!(500000), dec!(0.06), dec!(30), PaymentFrequency::Monthly);
    let out = build_amortization(&input).unwrap();
    let result = &out.result;

    // Standard annuity payment: 500000 * 0.005 / (1 - 1.005^-360)
    assert!((result.scheduled_payment - dec!(2997.75)).abs() < dec!(0.01));
    assert_eq!(result.schedule.len(), 360);
    // 360 * payment - principal
    assert!((result.summary.total_interest - dec!(579190.95)).abs() < dec!(1));
    assert!(out.warnings.is_empty());
}

#[test]
fn test_boundary_json_input() {
    let input: AmortizationInput = serde_json::from_str(
        r#"{
            "loan": {
                "principal": 250000,
                "annual_rate": 0.05,
                "term_years": 25,
                "payments_per_year": 12,
                "start_date": "2025-03-01",
                "loan_type": "variable"
            },
            "rate_changes": [{"date": "2026-03-01", "rate": 5.75}],
            "extra_payment": {"enabled": true, "amount": 250, "frequency": "everyPayment"},
            "offset_account": {"enabled": false, "initial_balance": 0, "monthly_contribution": 0}
        }"#,
    )
    .unwrap();
    let out = build_amortization(&input).unwrap();
    assert_eq!(out.result.summary.rate_changes_applied, 1);
    assert!(out.result.summary.payments_saved > 0);

    let json = serde_json::to_value(&out).unwrap();
    let first = &json["result"]["schedule"][0];
    assert_eq!(first["payment_number"], 1);
    assert_eq!(first["date"], "2025-03-01");
}

#[test]
fn test_boundary_rate_changes_without_loan_type_rejected() {
    let input: AmortizationInput = serde_json::from_str(
        r#"{
            "loan": {
                "principal": 100000,
                "annual_rate": 0.05,
                "term_years": 5,
                "payments_per_year": 12,
                "start_date": "2025-01-01"
            },
            "rate_changes": [{"date": "2025-03-01", "rate": 9}]
        }"#,
    )
    .unwrap();
    let err = generate_schedule(&input).unwrap_err();
    assert!(err.is_invalid_argument(), "{err}");
    assert!(matches!(err, TvmError::InvalidInput { ref field, .. } if field == "rate_changes"));
}

#[test]
fn test_invalid_parameters_rejected() {
    let mut negative_rate_change = loan(dec!(1000), dec!(0.05), dec!(1), PaymentFrequency::Monthly);
    negative_rate_change.rate_changes = vec![RateChange {
        effective_date: date(2025, 6, 1),
        new_rate_percent: dec!(-100),
    }];
    let mut negative_extra = loan(dec!(1000), dec!(0.05), dec!(1), PaymentFrequency::Monthly);
    negative_extra.extra_payment = every_payment(dec!(-5));

    for input in [
        loan(dec!(-1), dec!(0.05), dec!(1), PaymentFrequency::Monthly),
        loan(dec!(1000), dec!(-1), dec!(1), PaymentFrequency::Monthly),
        loan(dec!(1000), dec!(0.05), dec!(-2), PaymentFrequency::Monthly),
        negative_rate_change,
        negative_extra,
    ] {
        let err = build_amortization(&input).unwrap_err();
        assert!(err.is_invalid_argument(), "{err}");
    }

    assert!(serde_json::from_str::<PaymentFrequency>("0").is_err());
}

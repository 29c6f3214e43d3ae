//! Loan amortization schedules with variable rates, extra principal
//! payments and an interest offset account.

pub mod schedule;

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::TvmError;
use crate::types::{Money, Percent, Rate, Years};

pub use schedule::{build_amortization, generate_schedule};

// ---------------------------------------------------------------------------
// Payment frequency
// ---------------------------------------------------------------------------

/// Supported payment frequencies.
///
/// Serialized as the number of payments per year. Deserializes from either
/// that number or a name such as `"monthly"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawFrequency", into = "u32")]
pub enum PaymentFrequency {
    Annual,
    SemiAnnual,
    Quarterly,
    Monthly,
    Biweekly,
    Weekly,
}

impl PaymentFrequency {
    pub const ALL: [PaymentFrequency; 6] = [
        PaymentFrequency::Annual,
        PaymentFrequency::SemiAnnual,
        PaymentFrequency::Quarterly,
        PaymentFrequency::Monthly,
        PaymentFrequency::Biweekly,
        PaymentFrequency::Weekly,
    ];

    pub fn periods_per_year(&self) -> u32 {
        match self {
            PaymentFrequency::Annual => 1,
            PaymentFrequency::SemiAnnual => 2,
            PaymentFrequency::Quarterly => 4,
            PaymentFrequency::Monthly => 12,
            PaymentFrequency::Biweekly => 26,
            PaymentFrequency::Weekly => 52,
        }
    }

    /// Calendar-approximate length of one period in days.
    pub fn day_increment(&self) -> Decimal {
        match self {
            PaymentFrequency::Annual => dec!(365.25),
            PaymentFrequency::SemiAnnual => dec!(182.625),
            PaymentFrequency::Quarterly => dec!(91.3125),
            PaymentFrequency::Monthly => dec!(30.4167),
            PaymentFrequency::Biweekly => dec!(14),
            PaymentFrequency::Weekly => dec!(7),
        }
    }

    pub fn from_periods(periods_per_year: u32) -> Result<Self, TvmError> {
        PaymentFrequency::ALL
            .iter()
            .copied()
            .find(|f| f.periods_per_year() == periods_per_year)
            .ok_or_else(|| {
                TvmError::invalid(
                    "payments_per_year",
                    format!("{periods_per_year} is not one of 1, 2, 4, 12, 26, 52"),
                )
            })
    }

    pub fn name(&self) -> &'static str {
        match self {
            PaymentFrequency::Annual => "annual",
            PaymentFrequency::SemiAnnual => "semi_annual",
            PaymentFrequency::Quarterly => "quarterly",
            PaymentFrequency::Monthly => "monthly",
            PaymentFrequency::Biweekly => "biweekly",
            PaymentFrequency::Weekly => "weekly",
        }
    }
}

impl fmt::Display for PaymentFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for PaymentFrequency {
    type Err = TvmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "annual" | "annually" | "yearly" => Ok(PaymentFrequency::Annual),
            "semi_annual" | "semiannual" | "semi_annually" => Ok(PaymentFrequency::SemiAnnual),
            "quarterly" => Ok(PaymentFrequency::Quarterly),
            "monthly" => Ok(PaymentFrequency::Monthly),
            "biweekly" | "bi_weekly" | "fortnightly" => Ok(PaymentFrequency::Biweekly),
            "weekly" => Ok(PaymentFrequency::Weekly),
            other => match other.parse::<u32>() {
                Ok(n) => PaymentFrequency::from_periods(n),
                Err(_) => Err(TvmError::invalid(
                    "payments_per_year",
                    format!("unknown payment frequency '{s}'"),
                )),
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFrequency {
    Count(u32),
    Name(String),
}

impl TryFrom<RawFrequency> for PaymentFrequency {
    type Error = TvmError;

    fn try_from(raw: RawFrequency) -> Result<Self, Self::Error> {
        match raw {
            RawFrequency::Count(n) => PaymentFrequency::from_periods(n),
            RawFrequency::Name(name) => name.parse(),
        }
    }
}

impl From<PaymentFrequency> for u32 {
    fn from(frequency: PaymentFrequency) -> u32 {
        frequency.periods_per_year()
    }
}

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanType {
    /// Rate changes are ignored.
    #[default]
    Fixed,
    Variable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanParameters {
    pub principal: Money,
    /// Initial annual rate as a decimal fraction (0.06 = 6%).
    pub annual_rate: Rate,
    pub term_years: Years,
    pub payments_per_year: PaymentFrequency,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub loan_type: LoanType,
}

/// A new annual rate, in percent, effective from `effective_date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateChange {
    #[serde(alias = "date")]
    pub effective_date: NaiveDate,
    #[serde(alias = "rate")]
    pub new_rate_percent: Percent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraPaymentFrequency {
    #[serde(alias = "everyPayment")]
    EveryPayment,
    Monthly,
    Annually,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraPaymentPolicy {
    pub enabled: bool,
    pub amount: Money,
    pub frequency: ExtraPaymentFrequency,
}

impl ExtraPaymentPolicy {
    /// Extra principal offered on `payment_number`, before capping at the balance.
    ///
    /// Monthly and annual policies use plain modulo tests on the payment
    /// number, so on biweekly or weekly schedules they fire on approximate
    /// month and year boundaries.
    pub fn amount_for(&self, payment_number: u32, frequency: PaymentFrequency) -> Money {
        if !self.enabled {
            return Decimal::ZERO;
        }
        let ppy = frequency.periods_per_year();
        let applies = match self.frequency {
            ExtraPaymentFrequency::EveryPayment => true,
            ExtraPaymentFrequency::Monthly => payment_number % ppy.div_ceil(12) == 0,
            ExtraPaymentFrequency::Annually => payment_number % ppy == 0,
        };
        if applies {
            self.amount
        } else {
            Decimal::ZERO
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffsetAccount {
    pub enabled: bool,
    pub initial_balance: Money,
    pub monthly_contribution: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationInput {
    pub loan: LoanParameters,
    #[serde(default)]
    pub rate_changes: Vec<RateChange>,
    #[serde(default)]
    pub extra_payment: Option<ExtraPaymentPolicy>,
    #[serde(default)]
    pub offset_account: Option<OffsetAccount>,
}

impl AmortizationInput {
    pub fn new(loan: LoanParameters) -> Self {
        Self {
            loan,
            rate_changes: Vec::new(),
            extra_payment: None,
            offset_account: None,
        }
    }

    pub fn extras_enabled(&self) -> bool {
        self.extra_payment
            .as_ref()
            .is_some_and(|p| p.enabled && p.amount > Decimal::ZERO)
    }

    pub fn offset_enabled(&self) -> bool {
        self.offset_account.as_ref().is_some_and(|o| o.enabled)
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// One generated period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_number: u32,
    pub date: NaiveDate,
    pub scheduled_payment: Money,
    /// Extra principal actually applied this period.
    pub extra_payment_applied: Money,
    pub interest_payment: Money,
    /// Scheduled plus extra principal.
    pub principal_payment: Money,
    pub remaining_balance: Money,
    pub current_annual_rate_percent: Percent,
    /// Offset balance after this period's contribution.
    pub offset_balance: Money,
    pub interest_saved: Money,
    pub cumulative_interest: Money,
    pub cumulative_principal: Money,
    pub cumulative_interest_saved: Money,
    pub effective_balance: Money,
    pub rate_changed_this_period: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub number_of_payments: u32,
    pub total_interest: Money,
    pub total_principal: Money,
    pub total_extra_payments: Money,
    pub total_paid: Money,
    pub total_interest_saved: Money,
    pub final_offset_balance: Money,
    /// `None` when the safety cap stopped the schedule first.
    pub payoff_date: Option<NaiveDate>,
    pub rate_changes_applied: u32,
    pub hit_safety_cap: bool,
    /// Payments for the same loan without extras or offset.
    pub baseline_payments: u32,
    pub payments_saved: u32,
    pub interest_saved_vs_baseline: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationOutput {
    pub scheduled_payment: Money,
    pub schedule: Vec<PaymentRecord>,
    pub summary: ScheduleSummary,
}

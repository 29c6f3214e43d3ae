use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use tvm_core::amortization::{
    self, AmortizationInput, ExtraPaymentFrequency, ExtraPaymentPolicy, LoanParameters,
    LoanType, OffsetAccount, PaymentFrequency,
};

use crate::input;

/// Arguments for an amortization schedule
#[derive(Args)]
pub struct AmortizeArgs {
    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Loan principal
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Initial annual rate as a decimal (e.g. 0.06 for 6%)
    #[arg(long)]
    pub annual_rate: Option<Decimal>,

    /// Loan term in years
    #[arg(long)]
    pub term_years: Option<Decimal>,

    /// Payments per year (1, 2, 4, 12, 26, 52) or a name such as "monthly"
    #[arg(long, default_value = "monthly")]
    pub frequency: PaymentFrequency,

    /// First payment date (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Treat the loan as variable-rate
    #[arg(long)]
    pub variable: bool,

    /// Extra principal paid on top of the scheduled payment
    #[arg(long)]
    pub extra_amount: Option<Decimal>,

    /// How often the extra payment is made
    #[arg(long, value_enum, default_value = "every-payment")]
    pub extra_frequency: ExtraFrequencyArg,

    /// Opening offset account balance
    #[arg(long)]
    pub offset_balance: Option<Decimal>,

    /// Monthly contribution to the offset account
    #[arg(long)]
    pub offset_contribution: Option<Decimal>,

    /// Return only the schedule records
    #[arg(long)]
    pub schedule_only: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ExtraFrequencyArg {
    EveryPayment,
    Monthly,
    Annually,
}

impl From<ExtraFrequencyArg> for ExtraPaymentFrequency {
    fn from(arg: ExtraFrequencyArg) -> Self {
        match arg {
            ExtraFrequencyArg::EveryPayment => ExtraPaymentFrequency::EveryPayment,
            ExtraFrequencyArg::Monthly => ExtraPaymentFrequency::Monthly,
            ExtraFrequencyArg::Annually => ExtraPaymentFrequency::Annually,
        }
    }
}

fn input_from_flags(args: &AmortizeArgs) -> Result<AmortizationInput, Box<dyn std::error::Error>> {
    let principal = args
        .principal
        .ok_or("--principal is required (or provide --input)")?;
    let annual_rate = args
        .annual_rate
        .ok_or("--annual-rate is required (or provide --input)")?;
    let term_years = args
        .term_years
        .ok_or("--term-years is required (or provide --input)")?;
    let start_date = args
        .start_date
        .ok_or("--start-date is required (or provide --input)")?;

    let mut request = AmortizationInput::new(LoanParameters {
        principal,
        annual_rate,
        term_years,
        payments_per_year: args.frequency,
        start_date,
        loan_type: if args.variable {
            LoanType::Variable
        } else {
            LoanType::Fixed
        },
    });

    if let Some(amount) = args.extra_amount {
        request.extra_payment = Some(ExtraPaymentPolicy {
            enabled: true,
            amount,
            frequency: args.extra_frequency.into(),
        });
    }

    if args.offset_balance.is_some() || args.offset_contribution.is_some() {
        request.offset_account = Some(OffsetAccount {
            enabled: true,
            initial_balance: args.offset_balance.unwrap_or(Decimal::ZERO),
            monthly_contribution: args.offset_contribution.unwrap_or(Decimal::ZERO),
        });
    }

    Ok(request)
}

pub fn run_amortize(args: AmortizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: AmortizationInput = match input::read_request(args.input.as_deref())? {
        Some(request) => request,
        None => input_from_flags(&args)?,
    };

    if args.schedule_only {
        let schedule = amortization::generate_schedule(&request)?;
        return Ok(serde_json::to_value(schedule)?);
    }

    let result = amortization::build_amortization(&request)?;
    Ok(serde_json::to_value(result)?)
}

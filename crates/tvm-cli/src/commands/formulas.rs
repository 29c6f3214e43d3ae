use std::collections::BTreeMap;

use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use tvm_core::formulas::registry::FormulaRequest;
use tvm_core::formulas::{self, FormulaInputs, FormulaSummary};

use crate::input;

/// Parse a `SYMBOL=VALUE` pair.
fn parse_assignment(raw: &str) -> Result<(String, Decimal), String> {
    let (symbol, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SYMBOL=VALUE, got '{raw}'"))?;
    let value: Decimal = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value for {}: {e}", symbol.trim()))?;
    Ok((symbol.trim().to_string(), value))
}

/// Known inputs from `--set`, optionally on top of the family's defaults.
fn collect_inputs(
    family: &str,
    assignments: &[(String, Decimal)],
    with_defaults: bool,
) -> Result<BTreeMap<String, Decimal>, Box<dyn std::error::Error>> {
    let mut inputs = BTreeMap::new();
    if with_defaults {
        let spec = formulas::find_formula(family)?;
        for (symbol, value) in spec.defaults {
            inputs.insert(symbol.to_string(), *value);
        }
    }
    for (symbol, value) in assignments {
        inputs.insert(symbol.clone(), *value);
    }
    Ok(inputs)
}

/// Arguments for solving a formula
#[derive(Args)]
pub struct EvaluateArgs {
    /// Path to JSON/YAML request file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Formula family id or key (e.g. "cim", "growing_annuity_pv")
    #[arg(long)]
    pub family: Option<String>,

    /// Symbol to solve for (PV, FV, PMT, r, g, n, t, m, EAR)
    #[arg(long)]
    pub solve_for: Option<String>,

    /// Known input, repeatable (e.g. --set PV=1000 --set r=5)
    #[arg(long = "set", value_parser = parse_assignment, allow_hyphen_values = true)]
    pub set: Vec<(String, Decimal)>,

    /// Fill inputs not given with --set from the family's defaults
    #[arg(long)]
    pub defaults: bool,
}

pub fn run_evaluate(args: EvaluateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: FormulaRequest = match input::read_request(args.input.as_deref())? {
        Some(request) => request,
        None => {
            let family = args
                .family
                .ok_or("--family is required (or provide --input)")?;
            let solve_for = match args.solve_for {
                Some(symbol) => symbol,
                None => formulas::find_formula(&family)?
                    .primary()
                    .unknown
                    .to_string(),
            };
            let inputs = collect_inputs(&family, &args.set, args.defaults)?;
            FormulaRequest {
                family,
                solve_for,
                inputs,
            }
        }
    };

    let result = formulas::evaluate_formula(&request)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for listing formula families
#[derive(Args)]
pub struct FormulasArgs {
    /// Show a single family instead of the whole catalog
    #[arg(long)]
    pub family: Option<String>,
}

pub fn run_formulas(args: FormulasArgs) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(family) = args.family {
        let spec = formulas::find_formula(&family)?;
        return Ok(serde_json::to_value(spec.summary())?);
    }

    // One row per family for the catalog view
    let rows: Vec<Value> = formulas::registry()
        .iter()
        .map(|spec| {
            let summary: FormulaSummary = spec.summary();
            let unknowns: Vec<String> = summary
                .variations
                .iter()
                .map(|v| v.unknown.to_string())
                .collect();
            serde_json::json!({
                "id": summary.id,
                "key": summary.key,
                "name": summary.name,
                "expression": summary.expression,
                "solve_for": unknowns.join(", "),
                "timeline": summary.timeline,
            })
        })
        .collect();
    Ok(Value::Array(rows))
}

#[derive(Deserialize)]
struct TimelineRequest {
    family: String,
    inputs: BTreeMap<String, Decimal>,
}

/// Arguments for a growth timeline
#[derive(Args)]
pub struct TimelineArgs {
    /// Path to JSON/YAML file with `family` and `inputs`
    #[arg(long)]
    pub input: Option<String>,

    /// Formula family id or key
    #[arg(long)]
    pub family: Option<String>,

    /// Known input, repeatable (e.g. --set PV=1000 --set r=5)
    #[arg(long = "set", value_parser = parse_assignment, allow_hyphen_values = true)]
    pub set: Vec<(String, Decimal)>,

    /// Fill inputs not given with --set from the family's defaults
    #[arg(long)]
    pub defaults: bool,
}

pub fn run_timeline(args: TimelineArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: TimelineRequest = match input::read_request(args.input.as_deref())? {
        Some(request) => request,
        None => {
            let family = args
                .family
                .ok_or("--family is required (or provide --input)")?;
            let inputs = collect_inputs(&family, &args.set, args.defaults)?;
            TimelineRequest { family, inputs }
        }
    };

    let inputs = FormulaInputs::from_named(&request.inputs)?;
    let points = formulas::growth_timeline(&request.family, &inputs)?;
    Ok(serde_json::to_value(points)?)
}

/// Arguments for the compounding-frequency comparison
#[derive(Args)]
pub struct CompoundingArgs {
    /// Present value
    #[arg(long, default_value = "10000")]
    pub pv: Decimal,

    /// Annual rate in percent (e.g. 6 for 6%)
    #[arg(long, default_value = "6", allow_hyphen_values = true)]
    pub rate: Decimal,

    /// Horizon in years
    #[arg(long, default_value = "10")]
    pub years: Decimal,
}

pub fn run_compounding(args: CompoundingArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let points = formulas::compounding_comparison(args.pv, args.rate, args.years)?;
    Ok(serde_json::to_value(points)?)
}

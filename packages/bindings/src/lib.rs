use std::collections::BTreeMap;

use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use tvm_core::amortization::{self, AmortizationInput};
use tvm_core::formulas::{self, registry::FormulaRequest, FormulaInputs, FormulaSummary};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Formulas
// ---------------------------------------------------------------------------

/// Plain numeric surface: `inputs_json` maps symbols to numbers, rates in percent.
#[napi]
pub fn evaluate(family: String, variation: String, inputs_json: String) -> NapiResult<f64> {
    let inputs: BTreeMap<String, Decimal> =
        serde_json::from_str(&inputs_json).map_err(to_napi_error)?;
    let value = formulas::evaluate(&family, &variation, &inputs).map_err(to_napi_error)?;
    value
        .to_f64()
        .ok_or_else(|| to_napi_error(format!("{value} is not representable as f64")))
}

#[napi]
pub fn evaluate_formula(input_json: String) -> NapiResult<String> {
    let input: FormulaRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = formulas::evaluate_formula(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn list_formulas() -> NapiResult<String> {
    let summaries: Vec<FormulaSummary> = formulas::registry().iter().map(|s| s.summary()).collect();
    serde_json::to_string(&summaries).map_err(to_napi_error)
}

#[napi]
pub fn growth_timeline(family: String, inputs_json: String) -> NapiResult<String> {
    let named: BTreeMap<String, Decimal> =
        serde_json::from_str(&inputs_json).map_err(to_napi_error)?;
    let inputs = FormulaInputs::from_named(&named).map_err(to_napi_error)?;
    let points = formulas::growth_timeline(&family, &inputs).map_err(to_napi_error)?;
    serde_json::to_string(&points).map_err(to_napi_error)
}

#[derive(Deserialize)]
struct CompoundingRequest {
    pv: Decimal,
    rate: Decimal,
    years: Decimal,
}

#[napi]
pub fn compounding_comparison(input_json: String) -> NapiResult<String> {
    let input: CompoundingRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let points = formulas::compounding_comparison(input.pv, input.rate, input.years)
        .map_err(to_napi_error)?;
    serde_json::to_string(&points).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Amortization
// ---------------------------------------------------------------------------

/// Schedule records only.
#[napi]
pub fn generate_amortization_schedule(input_json: String) -> NapiResult<String> {
    let input: AmortizationInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let schedule = amortization::generate_schedule(&input).map_err(to_napi_error)?;
    serde_json::to_string(&schedule).map_err(to_napi_error)
}

/// Schedule plus summary, baseline comparison and warnings.
#[napi]
pub fn build_amortization(input_json: String) -> NapiResult<String> {
    let input: AmortizationInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = amortization::build_amortization(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

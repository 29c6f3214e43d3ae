//! Static formula registry and the evaluation entry points.

use std::collections::BTreeMap;
use std::time::Instant;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::annuity::{self, DUE, FUTURE, ORDINARY, PRESENT};
use super::growing;
use super::interest;
use super::{Calculation, FormulaInputs, FormulaSpec, SolveMethod, Symbol, VariationSpec};
use crate::error::TvmError;
use crate::solver::SolverConfig;
use crate::types::{with_metadata, ComputationOutput};
use crate::TvmResult;

use super::Symbol::{
    EffectiveRate as EAR, Frequency as M, FutureValue as FV, Growth as G, Payment as PMT,
    Periods as N, PresentValue as PV, Rate as R, Years as T,
};

// ---------------------------------------------------------------------------
// Solver presets
// ---------------------------------------------------------------------------

const RATE_GUESS_5: SolverConfig = SolverConfig {
    initial_guess: dec!(0.05),
    ..SolverConfig::rate()
};
const RATE_GUESS_10: SolverConfig = SolverConfig::rate();
const PERIODS_GUESS_10: SolverConfig = SolverConfig::variable();
const FREQUENCY_GUESS_12: SolverConfig = SolverConfig {
    initial_guess: dec!(12),
    ..SolverConfig::variable()
};
const GROWTH_GUESS_3: SolverConfig = SolverConfig {
    initial_guess: dec!(3),
    ..SolverConfig::variable()
};

const fn closed(
    unknown: Symbol,
    requires: &'static [Symbol],
    f: fn(&FormulaInputs) -> TvmResult<Decimal>,
) -> VariationSpec {
    VariationSpec {
        unknown,
        requires,
        calculation: Calculation::ClosedForm(f),
    }
}

const fn numerical(
    unknown: Symbol,
    requires: &'static [Symbol],
    solve: fn(&FormulaInputs, &SolverConfig) -> TvmResult<crate::solver::SolverResult>,
    config: SolverConfig,
) -> VariationSpec {
    VariationSpec {
        unknown,
        requires,
        calculation: Calculation::Numerical { solve, config },
    }
}

// ---------------------------------------------------------------------------
// Families
// ---------------------------------------------------------------------------

static REGISTRY: [FormulaSpec; 15] = [
    FormulaSpec {
        id: "si",
        key: "simple_interest",
        name: "Simple Interest",
        expression: "FV = PV(1 + r·t)",
        symbols: &[PV, FV, R, T],
        variations: &[
            closed(FV, &[PV, R, T], interest::simple_fv),
            closed(PV, &[FV, R, T], interest::simple_pv),
            closed(R, &[PV, FV, T], interest::simple_rate),
            closed(T, &[PV, FV, R], interest::simple_years),
        ],
        timeline: true,
        defaults: &[(PV, dec!(1000)), (R, dec!(5)), (T, dec!(10))],
    },
    FormulaSpec {
        id: "ci",
        key: "compound_interest",
        name: "Compound Interest (Annual)",
        expression: "FV = PV(1 + r)^n",
        symbols: &[PV, FV, R, N],
        variations: &[
            closed(FV, &[PV, R, N], interest::compound_fv),
            closed(PV, &[FV, R, N], interest::compound_pv),
            closed(R, &[PV, FV, N], interest::compound_rate),
            closed(N, &[PV, FV, R], interest::compound_periods),
        ],
        timeline: true,
        defaults: &[(PV, dec!(1000)), (R, dec!(5)), (N, dec!(10))],
    },
    FormulaSpec {
        id: "cim",
        key: "compound_interest_periodic",
        name: "Compound Interest (m Periods per Year)",
        expression: "FV = PV(1 + r/m)^(n·m)",
        symbols: &[PV, FV, R, N, M],
        variations: &[
            closed(FV, &[PV, R, N, M], interest::periodic_compound_fv),
            closed(PV, &[FV, R, N, M], interest::periodic_compound_pv),
            closed(R, &[PV, FV, N, M], interest::periodic_compound_rate),
            closed(N, &[PV, FV, R, M], interest::periodic_compound_periods),
            numerical(
                M,
                &[PV, FV, R, N],
                interest::periodic_compound_frequency,
                FREQUENCY_GUESS_12,
            ),
        ],
        timeline: true,
        defaults: &[(PV, dec!(1000)), (R, dec!(5)), (N, dec!(10)), (M, dec!(12))],
    },
    FormulaSpec {
        id: "cc",
        key: "continuous_compounding",
        name: "Continuous Compounding",
        expression: "FV = PV·e^(r·t)",
        symbols: &[PV, FV, R, T],
        variations: &[
            closed(FV, &[PV, R, T], interest::continuous_fv),
            closed(PV, &[FV, R, T], interest::continuous_pv),
            closed(R, &[PV, FV, T], interest::continuous_rate),
            closed(T, &[PV, FV, R], interest::continuous_years),
        ],
        timeline: true,
        defaults: &[(PV, dec!(1000)), (R, dec!(5)), (T, dec!(10))],
    },
    FormulaSpec {
        id: "ear",
        key: "effective_annual_rate",
        name: "Effective Annual Rate",
        expression: "EAR = (1 + r/m)^m - 1",
        symbols: &[EAR, R, M],
        variations: &[
            closed(EAR, &[R, M], interest::effective_rate),
            closed(R, &[EAR, M], interest::nominal_rate),
            numerical(
                M,
                &[EAR, R],
                interest::effective_rate_frequency,
                FREQUENCY_GUESS_12,
            ),
        ],
        timeline: false,
        defaults: &[(R, dec!(12)), (M, dec!(12))],
    },
    FormulaSpec {
        id: "pva",
        key: "annuity_pv",
        name: "Present Value of an Ordinary Annuity",
        expression: "PV = PMT·(1 - (1 + r/m)^-(n·m)) / (r/m)",
        symbols: &[PV, PMT, R, N, M],
        variations: &[
            closed(PV, &[PMT, R, N, M], annuity::value::<ORDINARY, PRESENT>),
            closed(PMT, &[PV, R, N, M], annuity::payment::<ORDINARY, PRESENT>),
            numerical(R, &[PV, PMT, N, M], annuity::rate::<ORDINARY, PRESENT>, RATE_GUESS_5),
            numerical(
                N,
                &[PV, PMT, R, M],
                annuity::periods::<ORDINARY, PRESENT>,
                PERIODS_GUESS_10,
            ),
            numerical(
                M,
                &[PV, PMT, R, N],
                annuity::frequency::<ORDINARY, PRESENT>,
                FREQUENCY_GUESS_12,
            ),
        ],
        timeline: false,
        defaults: &[(PMT, dec!(100)), (R, dec!(6)), (N, dec!(10)), (M, dec!(12))],
    },
    FormulaSpec {
        id: "fva",
        key: "annuity_fv",
        name: "Future Value of an Ordinary Annuity",
        expression: "FV = PMT·((1 + r/m)^(n·m) - 1) / (r/m)",
        symbols: &[FV, PMT, R, N, M],
        variations: &[
            closed(FV, &[PMT, R, N, M], annuity::value::<ORDINARY, FUTURE>),
            closed(PMT, &[FV, R, N, M], annuity::payment::<ORDINARY, FUTURE>),
            numerical(R, &[FV, PMT, N, M], annuity::rate::<ORDINARY, FUTURE>, RATE_GUESS_5),
            numerical(
                N,
                &[FV, PMT, R, M],
                annuity::periods::<ORDINARY, FUTURE>,
                PERIODS_GUESS_10,
            ),
            numerical(
                M,
                &[FV, PMT, R, N],
                annuity::frequency::<ORDINARY, FUTURE>,
                FREQUENCY_GUESS_12,
            ),
        ],
        timeline: true,
        defaults: &[(PMT, dec!(100)), (R, dec!(6)), (N, dec!(10)), (M, dec!(12))],
    },
    FormulaSpec {
        id: "pvad",
        key: "annuity_due_pv",
        name: "Present Value of an Annuity Due",
        expression: "PV = PMT·(1 - (1 + r/m)^-(n·m)) / (r/m)·(1 + r/m)",
        symbols: &[PV, PMT, R, N, M],
        variations: &[
            closed(PV, &[PMT, R, N, M], annuity::value::<DUE, PRESENT>),
            closed(PMT, &[PV, R, N, M], annuity::payment::<DUE, PRESENT>),
            numerical(R, &[PV, PMT, N, M], annuity::rate::<DUE, PRESENT>, RATE_GUESS_10),
            numerical(
                N,
                &[PV, PMT, R, M],
                annuity::periods::<DUE, PRESENT>,
                PERIODS_GUESS_10,
            ),
            numerical(
                M,
                &[PV, PMT, R, N],
                annuity::frequency::<DUE, PRESENT>,
                FREQUENCY_GUESS_12,
            ),
        ],
        timeline: false,
        defaults: &[(PMT, dec!(100)), (R, dec!(6)), (N, dec!(10)), (M, dec!(12))],
    },
    FormulaSpec {
        id: "fvad",
        key: "annuity_due_fv",
        name: "Future Value of an Annuity Due",
        expression: "FV = PMT·((1 + r/m)^(n·m) - 1) / (r/m)·(1 + r/m)",
        symbols: &[FV, PMT, R, N, M],
        variations: &[
            closed(FV, &[PMT, R, N, M], annuity::value::<DUE, FUTURE>),
            closed(PMT, &[FV, R, N, M], annuity::payment::<DUE, FUTURE>),
            numerical(R, &[FV, PMT, N, M], annuity::rate::<DUE, FUTURE>, RATE_GUESS_10),
            numerical(
                N,
                &[FV, PMT, R, M],
                annuity::periods::<DUE, FUTURE>,
                PERIODS_GUESS_10,
            ),
            numerical(
                M,
                &[FV, PMT, R, N],
                annuity::frequency::<DUE, FUTURE>,
                FREQUENCY_GUESS_12,
            ),
        ],
        timeline: true,
        defaults: &[(PMT, dec!(100)), (R, dec!(6)), (N, dec!(10)), (M, dec!(12))],
    },
    FormulaSpec {
        id: "perp",
        key: "perpetuity",
        name: "Perpetuity",
        expression: "PV = PMT / r",
        symbols: &[PV, PMT, R],
        variations: &[
            closed(PV, &[PMT, R], annuity::perpetuity_pv),
            closed(PMT, &[PV, R], annuity::perpetuity_payment),
            closed(R, &[PV, PMT], annuity::perpetuity_rate),
        ],
        timeline: false,
        defaults: &[(PMT, dec!(100)), (R, dec!(5))],
    },
    FormulaSpec {
        id: "gperp",
        key: "growing_perpetuity",
        name: "Growing Perpetuity",
        expression: "PV = PMT / (r - g)",
        symbols: &[PV, PMT, R, G],
        variations: &[
            closed(PV, &[PMT, R, G], growing::perpetuity_pv),
            closed(PMT, &[PV, R, G], growing::perpetuity_payment),
            closed(R, &[PV, PMT, G], growing::perpetuity_rate),
            closed(G, &[PV, PMT, R], growing::perpetuity_growth),
        ],
        timeline: false,
        defaults: &[(PMT, dec!(100)), (R, dec!(8)), (G, dec!(3))],
    },
    FormulaSpec {
        id: "gpva",
        key: "growing_annuity_pv",
        name: "Present Value of a Growing Annuity",
        expression: "PV = PMT / (r - g)·(1 - ((1 + g)/(1 + r))^n)",
        symbols: &[PV, PMT, R, G, N],
        variations: &[
            closed(PV, &[PMT, R, G, N], growing::value::<ORDINARY, PRESENT>),
            closed(PMT, &[PV, R, G, N], growing::payment::<ORDINARY, PRESENT>),
            numerical(R, &[PV, PMT, G, N], growing::rate::<ORDINARY, PRESENT>, RATE_GUESS_10),
            numerical(G, &[PV, PMT, R, N], growing::growth::<ORDINARY, PRESENT>, GROWTH_GUESS_3),
            numerical(
                N,
                &[PV, PMT, R, G],
                growing::periods::<ORDINARY, PRESENT>,
                PERIODS_GUESS_10,
            ),
        ],
        timeline: false,
        defaults: &[(PMT, dec!(100)), (R, dec!(8)), (G, dec!(3)), (N, dec!(10))],
    },
    FormulaSpec {
        id: "gfva",
        key: "growing_annuity_fv",
        name: "Future Value of a Growing Annuity",
        expression: "FV = PMT·((1 + r)^n - (1 + g)^n) / (r - g)",
        symbols: &[FV, PMT, R, G, N],
        variations: &[
            closed(FV, &[PMT, R, G, N], growing::value::<ORDINARY, FUTURE>),
            closed(PMT, &[FV, R, G, N], growing::payment::<ORDINARY, FUTURE>),
            numerical(R, &[FV, PMT, G, N], growing::rate::<ORDINARY, FUTURE>, RATE_GUESS_10),
            numerical(G, &[FV, PMT, R, N], growing::growth::<ORDINARY, FUTURE>, GROWTH_GUESS_3),
            numerical(
                N,
                &[FV, PMT, R, G],
                growing::periods::<ORDINARY, FUTURE>,
                PERIODS_GUESS_10,
            ),
        ],
        timeline: true,
        defaults: &[(PMT, dec!(100)), (R, dec!(8)), (G, dec!(3)), (N, dec!(10))],
    },
    FormulaSpec {
        id: "gpvad",
        key: "growing_annuity_due_pv",
        name: "Present Value of a Growing Annuity Due",
        expression: "PV = PMT / (r - g)·(1 - ((1 + g)/(1 + r))^n)·(1 + r)",
        symbols: &[PV, PMT, R, G, N],
        variations: &[
            closed(PV, &[PMT, R, G, N], growing::value::<DUE, PRESENT>),
            closed(PMT, &[PV, R, G, N], growing::payment::<DUE, PRESENT>),
            numerical(R, &[PV, PMT, G, N], growing::rate::<DUE, PRESENT>, RATE_GUESS_10),
            numerical(G, &[PV, PMT, R, N], growing::growth::<DUE, PRESENT>, GROWTH_GUESS_3),
            numerical(
                N,
                &[PV, PMT, R, G],
                growing::periods::<DUE, PRESENT>,
                PERIODS_GUESS_10,
            ),
        ],
        timeline: false,
        defaults: &[(PMT, dec!(100)), (R, dec!(8)), (G, dec!(3)), (N, dec!(10))],
    },
    FormulaSpec {
        id: "gfvad",
        key: "growing_annuity_due_fv",
        name: "Future Value of a Growing Annuity Due",
        expression: "FV = PMT·((1 + r)^n - (1 + g)^n) / (r - g)·(1 + r)",
        symbols: &[FV, PMT, R, G, N],
        variations: &[
            closed(FV, &[PMT, R, G, N], growing::value::<DUE, FUTURE>),
            closed(PMT, &[FV, R, G, N], growing::payment::<DUE, FUTURE>),
            numerical(R, &[FV, PMT, G, N], growing::rate::<DUE, FUTURE>, RATE_GUESS_10),
            numerical(G, &[FV, PMT, R, N], growing::growth::<DUE, FUTURE>, GROWTH_GUESS_3),
            numerical(
                N,
                &[FV, PMT, R, G],
                growing::periods::<DUE, FUTURE>,
                PERIODS_GUESS_10,
            ),
        ],
        timeline: true,
        defaults: &[(PMT, dec!(100)), (R, dec!(8)), (G, dec!(3)), (N, dec!(10))],
    },
];

/// Every formula family, in catalog order.
pub fn registry() -> &'static [FormulaSpec] {
    &REGISTRY
}

/// Look up a family by short id (`cim`) or long key (`compound_interest_periodic`).
pub fn find_formula(family: &str) -> TvmResult<&'static FormulaSpec> {
    let wanted = family.trim();
    REGISTRY
        .iter()
        .find(|spec| spec.id.eq_ignore_ascii_case(wanted) || spec.key.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| TvmError::UnknownFormula(wanted.to_string()))
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Value of a solved unknown plus how it was obtained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormulaResult {
    pub family: String,
    pub unknown: Symbol,
    /// Percent when `unknown` is a rate symbol.
    pub value: Decimal,
    pub method: SolveMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converged: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub residual: Option<Decimal>,
}

/// A boundary request: family id, the unknown, and named inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormulaRequest {
    pub family: String,
    #[serde(alias = "variation")]
    pub solve_for: String,
    pub inputs: BTreeMap<String, Decimal>,
}

fn check_required(variation: &VariationSpec, inputs: &FormulaInputs) -> TvmResult<()> {
    for symbol in variation.requires {
        if !inputs.contains(*symbol) {
            return Err(TvmError::MissingInput {
                symbol: symbol.to_string(),
            });
        }
    }
    Ok(())
}

fn solve(spec: &FormulaSpec, variation: &VariationSpec, inputs: &FormulaInputs) -> TvmResult<FormulaResult> {
    check_required(variation, inputs)?;

    let result = match variation.calculation {
        Calculation::ClosedForm(f) => FormulaResult {
            family: spec.id.to_string(),
            unknown: variation.unknown,
            value: f(inputs)?,
            method: SolveMethod::ClosedForm,
            iterations: None,
            converged: None,
            residual: None,
        },
        Calculation::Numerical { solve, config } => {
            let solved = solve(inputs, &config)?;
            FormulaResult {
                family: spec.id.to_string(),
                unknown: variation.unknown,
                value: solved.value,
                method: SolveMethod::Numerical,
                iterations: Some(solved.iterations),
                converged: Some(solved.converged),
                residual: Some(solved.residual),
            }
        }
    };

    debug!(
        family = spec.id,
        unknown = %variation.unknown,
        value = %result.value,
        method = ?result.method,
        "formula evaluated"
    );
    Ok(result)
}

/// Solve `family` for `variation` from already-typed inputs.
///
/// A numerical variation that runs out of iterations is an error here; use
/// [`evaluate_formula`] to inspect the unconverged iterate instead.
pub fn evaluate_inputs(family: &str, variation: Symbol, inputs: &FormulaInputs) -> TvmResult<Decimal> {
    let spec = find_formula(family)?;
    let variation_spec = spec.variation(variation)?;
    let result = solve(spec, variation_spec, inputs)?;
    match result.converged {
        Some(false) => Err(TvmError::ConvergenceFailure {
            function: format!("{}:{}", spec.id, variation),
            iterations: result.iterations.unwrap_or_default(),
            last_delta: result.residual.unwrap_or_default(),
        }),
        _ => Ok(result.value),
    }
}

/// `evaluate(familyId, variation, inputs)`: the plain numeric call surface.
pub fn evaluate(
    family: &str,
    variation: &str,
    inputs: &BTreeMap<String, Decimal>,
) -> TvmResult<Decimal> {
    let unknown: Symbol = variation.parse()?;
    let typed = FormulaInputs::from_named(inputs)?;
    evaluate_inputs(family, unknown, &typed)
}

/// Evaluate a request and wrap the result in the standard envelope.
pub fn evaluate_formula(
    request: &FormulaRequest,
) -> TvmResult<ComputationOutput<FormulaResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let spec = find_formula(&request.family)?;
    let unknown: Symbol = request.solve_for.parse()?;
    let variation = spec.variation(unknown)?;
    let inputs = FormulaInputs::from_named(&request.inputs)?;

    for symbol in inputs.symbols() {
        if !variation.requires.contains(&symbol) {
            warnings.push(format!(
                "Input {symbol} is not used when solving {} for {unknown}",
                spec.id
            ));
        }
    }

    let result = solve(spec, variation, &inputs)?;

    if let Some(iterations) = result.iterations {
        if result.converged == Some(false) {
            warnings.push(format!(
                "Newton-Raphson did not converge within {iterations} iterations; value is the last iterate"
            ));
        } else {
            warnings.push(format!(
                "{unknown} has no closed form; solved numerically in {iterations} iterations"
            ));
        }
    }

    let methodology = format!("{} ({})", spec.name, spec.expression);
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(&methodology, request, warnings, elapsed, result))
}

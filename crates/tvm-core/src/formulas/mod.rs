//! Closed-form time-value-of-money formulas and their inverses.
//!
//! Every formula family is a static [`FormulaSpec`] in the [`registry`]. A
//! family lists the symbols it uses and one [`VariationSpec`] per symbol
//! that can be the unknown. Each variation is a closed form, or a
//! Newton-Raphson solve with a family-specific initial guess.
//!
//! Rate-type symbols (`r`, `g`, `EAR`) are percentages at this boundary and
//! decimal fractions inside the formulas.

pub mod annuity;
pub mod growing;
pub mod interest;
pub mod registry;
pub mod timeline;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::TvmError;
use crate::math;
use crate::solver::{SolverConfig, SolverResult};
use crate::types::{percent_to_rate, Rate};
use crate::TvmResult;

pub use registry::{evaluate, evaluate_formula, find_formula, registry};
pub use timeline::{compounding_comparison, growth_timeline};

/// A variable that can appear in a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Symbol {
    #[serde(rename = "PV")]
    PresentValue,
    #[serde(rename = "FV")]
    FutureValue,
    #[serde(rename = "PMT")]
    Payment,
    #[serde(rename = "r")]
    Rate,
    #[serde(rename = "g")]
    Growth,
    #[serde(rename = "n")]
    Periods,
    #[serde(rename = "t")]
    Years,
    #[serde(rename = "m")]
    Frequency,
    #[serde(rename = "EAR")]
    EffectiveRate,
}

impl Symbol {
    pub const ALL: [Symbol; 9] = [
        Symbol::PresentValue,
        Symbol::FutureValue,
        Symbol::Payment,
        Symbol::Rate,
        Symbol::Growth,
        Symbol::Periods,
        Symbol::Years,
        Symbol::Frequency,
        Symbol::EffectiveRate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Symbol::PresentValue => "PV",
            Symbol::FutureValue => "FV",
            Symbol::Payment => "PMT",
            Symbol::Rate => "r",
            Symbol::Growth => "g",
            Symbol::Periods => "n",
            Symbol::Years => "t",
            Symbol::Frequency => "m",
            Symbol::EffectiveRate => "EAR",
        }
    }

    /// Percent at the boundary, decimal internally.
    pub fn is_rate(&self) -> bool {
        matches!(
            self,
            Symbol::Rate | Symbol::Growth | Symbol::EffectiveRate
        )
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Symbol {
    type Err = TvmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Symbol::ALL
            .iter()
            .copied()
            .find(|sym| sym.as_str() == trimmed)
            .or_else(|| {
                // Case-insensitive match on the money symbols only: "r" and
                // "n" must stay distinct from anything upper-cased.
                Symbol::ALL
                    .iter()
                    .copied()
                    .find(|sym| sym.as_str().len() > 1 && sym.as_str().eq_ignore_ascii_case(trimmed))
            })
            .ok_or_else(|| TvmError::InvalidInput {
                field: "symbol".into(),
                reason: format!("unknown symbol '{trimmed}'"),
            })
    }
}

/// Known values for one evaluation, keyed by symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormulaInputs {
    values: BTreeMap<Symbol, Decimal>,
}

impl FormulaInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from symbol names, e.g. `{"PV": 1000, "r": 5}`.
    pub fn from_named(named: &BTreeMap<String, Decimal>) -> TvmResult<Self> {
        let mut inputs = Self::new();
        for (name, value) in named {
            inputs.insert(name.parse()?, *value);
        }
        Ok(inputs)
    }

    pub fn from_pairs(pairs: &[(Symbol, Decimal)]) -> Self {
        Self {
            values: pairs.iter().copied().collect(),
        }
    }

    pub fn insert(&mut self, symbol: Symbol, value: Decimal) {
        self.values.insert(symbol, value);
    }

    pub fn remove(&mut self, symbol: Symbol) -> Option<Decimal> {
        self.values.remove(&symbol)
    }

    /// Copy with `symbol` set to `value`.
    #[must_use]
    pub fn with(&self, symbol: Symbol, value: Decimal) -> Self {
        let mut next = self.clone();
        next.insert(symbol, value);
        next
    }

    pub fn contains(&self, symbol: Symbol) -> bool {
        self.values.contains_key(&symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.values.keys().copied()
    }

    /// Raw boundary value (percent for rate symbols).
    pub fn get(&self, symbol: Symbol) -> TvmResult<Decimal> {
        self.values
            .get(&symbol)
            .copied()
            .ok_or_else(|| TvmError::MissingInput {
                symbol: symbol.to_string(),
            })
    }

    /// Rate symbol converted from percent to a decimal fraction.
    pub fn rate(&self, symbol: Symbol) -> TvmResult<Rate> {
        Ok(percent_to_rate(self.get(symbol)?))
    }

    /// Value that must be strictly positive (frequencies, horizons used as divisors).
    pub fn positive(&self, symbol: Symbol) -> TvmResult<Decimal> {
        let value = self.get(symbol)?;
        if value <= Decimal::ZERO {
            return Err(TvmError::domain(
                symbol.as_str(),
                format!("{symbol} must be > 0"),
            ));
        }
        Ok(value)
    }

    /// FV / PV style ratio that feeds a logarithm or fractional power.
    pub fn positive_ratio(&self, numerator: Symbol, denominator: Symbol) -> TvmResult<Decimal> {
        let num = self.get(numerator)?;
        let den = self.get(denominator)?;
        let ratio = math::try_div(num, den, denominator.as_str())?;
        if ratio <= Decimal::ZERO {
            return Err(TvmError::domain(
                numerator.as_str(),
                format!("{numerator}/{denominator} must be > 0"),
            ));
        }
        Ok(ratio)
    }
}

/// How a variation produces its unknown.
#[derive(Clone, Copy)]
pub enum Calculation {
    ClosedForm(fn(&FormulaInputs) -> TvmResult<Decimal>),
    Numerical {
        solve: fn(&FormulaInputs, &SolverConfig) -> TvmResult<SolverResult>,
        config: SolverConfig,
    },
}

impl fmt::Debug for Calculation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Calculation::ClosedForm(_) => f.write_str("ClosedForm"),
            Calculation::Numerical { config, .. } => {
                f.debug_struct("Numerical").field("config", config).finish()
            }
        }
    }
}

/// One "solve for X" entry of a family.
#[derive(Debug, Clone, Copy)]
pub struct VariationSpec {
    pub unknown: Symbol,
    pub requires: &'static [Symbol],
    pub calculation: Calculation,
}

impl VariationSpec {
    pub fn is_numerical(&self) -> bool {
        matches!(self.calculation, Calculation::Numerical { .. })
    }
}

/// A formula family: its symbols, variations and pre-filled inputs.
#[derive(Debug, Clone, Copy)]
pub struct FormulaSpec {
    /// Short id, e.g. `cim`.
    pub id: &'static str,
    /// Long snake-case name, accepted as an alias of `id`.
    pub key: &'static str,
    pub name: &'static str,
    pub expression: &'static str,
    pub symbols: &'static [Symbol],
    /// First entry is the family's primary unknown.
    pub variations: &'static [VariationSpec],
    /// Whether a year-by-year growth timeline makes sense for this family.
    pub timeline: bool,
    /// Pre-filled inputs for the primary variation.
    pub defaults: &'static [(Symbol, Decimal)],
}

impl FormulaSpec {
    pub fn variation(&self, unknown: Symbol) -> TvmResult<&VariationSpec> {
        self.variations
            .iter()
            .find(|v| v.unknown == unknown)
            .ok_or_else(|| TvmError::UnknownVariation {
                family: self.id.to_string(),
                variation: unknown.to_string(),
            })
    }

    pub fn primary(&self) -> &VariationSpec {
        &self.variations[0]
    }

    pub fn default_inputs(&self) -> FormulaInputs {
        FormulaInputs::from_pairs(self.defaults)
    }

    pub fn summary(&self) -> FormulaSummary {
        FormulaSummary {
            id: self.id.to_string(),
            key: self.key.to_string(),
            name: self.name.to_string(),
            expression: self.expression.to_string(),
            symbols: self.symbols.to_vec(),
            timeline: self.timeline,
            defaults: self.defaults.iter().copied().collect(),
            variations: self
                .variations
                .iter()
                .map(|v| VariationSummary {
                    unknown: v.unknown,
                    requires: v.requires.to_vec(),
                    method: SolveMethod::of(v),
                    initial_guess: match v.calculation {
                        Calculation::Numerical { config, .. } => Some(config.initial_guess),
                        Calculation::ClosedForm(_) => None,
                    },
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveMethod {
    ClosedForm,
    Numerical,
}

impl SolveMethod {
    fn of(variation: &VariationSpec) -> Self {
        if variation.is_numerical() {
            SolveMethod::Numerical
        } else {
            SolveMethod::ClosedForm
        }
    }
}

/// Serializable view of a [`FormulaSpec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormulaSummary {
    pub id: String,
    pub key: String,
    pub name: String,
    pub expression: String,
    pub symbols: Vec<Symbol>,
    pub timeline: bool,
    pub defaults: BTreeMap<Symbol, Decimal>,
    pub variations: Vec<VariationSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariationSummary {
    pub unknown: Symbol,
    pub requires: Vec<Symbol>,
    pub method: SolveMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_guess: Option<Decimal>,
}

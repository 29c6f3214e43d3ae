//! Newton-Raphson inversion for formulas with no closed-form inverse.
//!
//! Two entry points share one iteration:
//!
//! - [`solve_rate`] works in decimal-rate space and reports a percentage.
//! - [`solve_for_variable`] works on raw scalars (period counts, compounding
//!   frequencies, percentages) and reports the raw value.
//!
//! The derivative is a forward finite difference whose step equals the
//! tolerance. Running out of iterations is not an error: the caller gets the
//! last iterate with `converged == false`. A flat derivative, or an iterate
//! that leaves the function's domain or overflows Decimal, is a
//! [`TvmError::ConvergenceFailure`].

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::TvmError;
use crate::math;
use crate::TvmResult;

/// Derivative estimates smaller than this are treated as a flat region.
const MIN_DERIVATIVE: Decimal = dec!(0.000000000001);

/// Iteration settings for one solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    pub initial_guess: Decimal,
    pub max_iterations: u32,
    pub tolerance: Decimal,
}

impl SolverConfig {
    /// Defaults for rate unknowns: guess 10%, 100 iterations, 1e-4.
    pub const fn rate() -> Self {
        Self {
            initial_guess: dec!(0.10),
            max_iterations: 100,
            tolerance: dec!(0.0001),
        }
    }

    /// Defaults for period/frequency unknowns: guess 10, 100 iterations, 1e-3.
    pub const fn variable() -> Self {
        Self {
            initial_guess: dec!(10),
            max_iterations: 100,
            tolerance: dec!(0.001),
        }
    }

    #[must_use]
    pub fn with_initial_guess(mut self, initial_guess: Decimal) -> Self {
        self.initial_guess = initial_guess;
        self
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance: Decimal) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// Outcome of a solve. `value` is the last iterate whether or not it converged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverResult {
    pub value: Decimal,
    pub converged: bool,
    pub iterations: u32,
    /// f(value) - target at the returned value.
    pub residual: Decimal,
}

impl SolverResult {
    /// The value, or a `ConvergenceFailure` if the iteration cap was hit.
    pub fn into_converged(self, function: &str) -> TvmResult<Decimal> {
        if self.converged {
            Ok(self.value)
        } else {
            Err(TvmError::ConvergenceFailure {
                function: function.to_string(),
                iterations: self.iterations,
                last_delta: self.residual,
            })
        }
    }
}

/// Find a decimal rate with `f(rate) ≈ target`; the result is a percentage.
pub fn solve_rate<F>(target: Decimal, f: F, config: &SolverConfig) -> TvmResult<SolverResult>
where
    F: Fn(Decimal) -> TvmResult<Decimal>,
{
    let mut result = newton_raphson("solve_rate", target, f, config)?;
    result.value = math::try_percent(result.value, "rate")?;
    Ok(result)
}

/// Find `x` with `f(x) ≈ target`; the result is returned as-is.
pub fn solve_for_variable<F>(
    target: Decimal,
    f: F,
    config: &SolverConfig,
) -> TvmResult<SolverResult>
where
    F: Fn(Decimal) -> TvmResult<Decimal>,
{
    newton_raphson("solve_for_variable", target, f, config)
}

fn newton_raphson<F>(
    function: &str,
    target: Decimal,
    f: F,
    config: &SolverConfig,
) -> TvmResult<SolverResult>
where
    F: Fn(Decimal) -> TvmResult<Decimal>,
{
    if config.tolerance <= Decimal::ZERO {
        return Err(TvmError::InvalidInput {
            field: "tolerance".into(),
            reason: "Solver tolerance must be > 0".into(),
        });
    }

    let h = config.tolerance;
    let mut x = config.initial_guess;
    let mut last_step = Decimal::ZERO;

    let failure = |iterations: u32, last_delta: Decimal| TvmError::ConvergenceFailure {
        function: function.to_string(),
        iterations,
        last_delta,
    };

    for i in 0..config.max_iterations {
        let fx = f(x).map_err(|_| failure(i, last_step))?;
        let fx_h = x
            .checked_add(h)
            .ok_or_else(|| failure(i, last_step))
            .and_then(|x_h| f(x_h).map_err(|_| failure(i, last_step)))?;

        let derivative = fx_h
            .checked_sub(fx)
            .and_then(|d| d.checked_div(h))
            .ok_or_else(|| failure(i, last_step))?;

        if derivative.abs() < MIN_DERIVATIVE {
            warn!(function, iteration = i, %x, "flat derivative, stopping");
            return Err(failure(i, last_step));
        }

        let offset = fx.checked_sub(target).ok_or_else(|| failure(i, last_step))?;
        let step = offset
            .checked_div(derivative)
            .ok_or_else(|| failure(i, last_step))?;

        x = x.checked_sub(step).ok_or_else(|| failure(i, step))?;
        last_step = step;

        if step.abs() < config.tolerance {
            let residual = residual_at(&f, x, target).unwrap_or(offset);
            debug!(function, iterations = i + 1, %x, "converged");
            return Ok(SolverResult {
                value: x,
                converged: true,
                iterations: i + 1,
                residual,
            });
        }
    }

    let residual = residual_at(&f, x, target).unwrap_or(last_step);
    warn!(
        function,
        iterations = config.max_iterations,
        %x,
        "iteration cap reached without convergence"
    );
    Ok(SolverResult {
        value: x,
        converged: false,
        iterations: config.max_iterations,
        residual,
    })
}

fn residual_at<F>(f: &F, x: Decimal, target: Decimal) -> Option<Decimal>
where
    F: Fn(Decimal) -> TvmResult<Decimal>,
{
    f(x).ok().and_then(|v| v.checked_sub(target))
}

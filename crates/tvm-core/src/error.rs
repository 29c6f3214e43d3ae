use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TvmError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Domain error on {symbol}: {reason}")]
    Domain { symbol: String, reason: String },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Unknown formula family: {0}")]
    UnknownFormula(String),

    #[error("Formula {family} cannot be solved for {variation}")]
    UnknownVariation { family: String, variation: String },

    #[error("Missing input: {symbol}")]
    MissingInput { symbol: String },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl TvmError {
    /// Shorthand for a domain violation on `symbol`.
    pub fn domain(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        TvmError::Domain {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a structurally invalid field.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        TvmError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Mathematically invalid input to a closed form.
    pub fn is_domain(&self) -> bool {
        matches!(self, TvmError::Domain { .. } | TvmError::DivisionByZero { .. })
    }

    /// Structurally invalid parameters, rejected before any computation.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            TvmError::InvalidInput { .. }
                | TvmError::UnknownFormula(_)
                | TvmError::UnknownVariation { .. }
                | TvmError::MissingInput { .. }
                | TvmError::DateError(_)
        )
    }

    pub fn is_convergence_failure(&self) -> bool {
        matches!(self, TvmError::ConvergenceFailure { .. })
    }
}

impl From<serde_json::Error> for TvmError {
    fn from(e: serde_json::Error) -> Self {
        TvmError::SerializationError(e.to_string())
    }
}

impl From<chrono::ParseError> for TvmError {
    fn from(e: chrono::ParseError) -> Self {
        TvmError::DateError(e.to_string())
    }
}

pub mod error;
pub mod math;
pub mod solver;
pub mod time_value;
pub mod types;

#[cfg(feature = "formulas")]
pub mod formulas;

#[cfg(feature = "amortization")]
pub mod amortization;

pub use error::TvmError;
pub use types::*;

/// Standard result type for all time-value operations
pub type TvmResult<T> = Result<T, TvmError>;

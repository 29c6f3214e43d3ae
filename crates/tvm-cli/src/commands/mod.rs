pub mod amortization;
pub mod formulas;

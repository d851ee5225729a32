//! Mathematical utilities: logistic link, log loss, and column standardization.

pub mod logistic;
pub mod scaler;

pub use logistic::*;
pub use scaler::*;

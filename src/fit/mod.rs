//! Training-time helpers.
//!
//! Responsibilities:
//!
//! - stratified train/test split
//! - class balancing (training rows only)
//! - holdout metrics

pub mod balance;
pub mod metrics;
pub mod split;

pub use balance::*;
pub use metrics::*;
pub use split::*;

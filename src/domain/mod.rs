//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the raw applicant record and its validation (`ApplicantRecord`)
//! - labeled training/evaluation data (`LabeledDataset`)
//! - training configuration (`TrainConfig`, `BalanceMethod`)

pub mod types;

pub use types::*;

//! Input/output helpers.
//!
//! - CSV ingest + schema validation (`ingest`)
//! - dataset and decision exports (`export`)
//! - pipeline artifact read/write (`artifact`)

pub mod artifact;
pub mod export;
pub mod ingest;

pub use artifact::*;
pub use export::*;
pub use ingest::*;

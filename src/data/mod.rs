//! Data sources: seeded synthetic applicants.

pub mod sample;

pub use sample::*;

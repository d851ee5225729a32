//! `credit-risk` library crate.
//!
//! The binary (`credit-risk`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the scoring service can be embedded behind another front-end
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod decision;
pub mod domain;
pub mod error;
pub mod features;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod scoring;
pub mod service;

//! Command-line parsing for the credit-risk scorer.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the scoring/training code.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::data::{DEFAULT_ROWS, DEFAULT_SEED};
use crate::domain::BalanceMethod;
use crate::fit::{DEFAULT_SMOTE_K, DEFAULT_TEST_FRACTION};

pub const DEFAULT_ARTIFACT: &str = "credit_risk_pipeline.json";

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "credit-risk",
    version,
    about = "Credit-risk scoring: train a boosted-tree pipeline and render approve/reject decisions"
)]
pub struct Cli {
    /// Configuration file (TOML). `credit-risk.toml` is used when present.
    #[arg(long, global = true, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write a synthetic labeled applicant dataset.
    Generate(GenerateArgs),
    /// Print shape, target distribution and column statistics of a labeled CSV.
    Describe(DescribeArgs),
    /// Fit the scoring pipeline, evaluate it on a holdout and write the artifact.
    Train(TrainArgs),
    /// Evaluate an artifact on a labeled CSV (no balancing).
    Evaluate(EvaluateArgs),
    /// Score one applicant and print the decision.
    Score(ScoreArgs),
    /// Score every applicant in a CSV and write one decision per row.
    ScoreBatch(ScoreBatchArgs),
}

#[derive(Debug, Args, Clone)]
pub struct GenerateArgs {
    /// Number of applicants.
    #[arg(short = 'n', long, default_value_t = DEFAULT_ROWS)]
    pub rows: usize,

    /// Random seed.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Output CSV path.
    #[arg(short, long, value_name = "CSV")]
    pub output: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct DescribeArgs {
    /// Labeled CSV (applicant columns plus `risk`).
    #[arg(long, value_name = "CSV")]
    pub data: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct TrainArgs {
    /// Labeled CSV (applicant columns plus `risk`).
    #[arg(long, value_name = "CSV")]
    pub data: PathBuf,

    /// Where to write the trained pipeline.
    #[arg(long, value_name = "JSON", default_value = DEFAULT_ARTIFACT)]
    pub artifact: PathBuf,

    /// Fraction of rows held out for evaluation (stratified).
    #[arg(long, default_value_t = DEFAULT_TEST_FRACTION)]
    pub test_fraction: f64,

    /// Seed for the split, the balancer and the booster.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// How to balance the training classes.
    #[arg(long, value_enum, default_value_t = BalanceMethod::Smote)]
    pub balance: BalanceMethod,

    /// Nearest neighbours used by SMOTE.
    #[arg(long, default_value_t = DEFAULT_SMOTE_K)]
    pub smote_k: usize,

    /// Number of boosting rounds.
    #[arg(long, default_value_t = 100)]
    pub n_trees: usize,

    /// Maximum tree depth.
    #[arg(long, default_value_t = 6)]
    pub max_depth: usize,

    /// Shrinkage applied to each tree.
    #[arg(long, default_value_t = 0.3)]
    pub learning_rate: f64,

    /// L2 regularization on leaf weights.
    #[arg(long, default_value_t = 1.0)]
    pub lambda: f64,

    /// Minimum loss reduction required to split.
    #[arg(long, default_value_t = 0.0)]
    pub gamma: f64,

    /// Minimum hessian sum per child.
    #[arg(long, default_value_t = 1.0)]
    pub min_child_weight: f64,

    /// Row fraction sampled per tree.
    #[arg(long, default_value_t = 1.0)]
    pub subsample: f64,

    /// Column fraction sampled per tree.
    #[arg(long, default_value_t = 1.0)]
    pub colsample: f64,
}

#[derive(Debug, Args, Clone)]
pub struct EvaluateArgs {
    /// Labeled CSV (applicant columns plus `risk`).
    #[arg(long, value_name = "CSV")]
    pub data: PathBuf,

    /// Trained pipeline artifact.
    #[arg(long, value_name = "JSON", default_value = DEFAULT_ARTIFACT)]
    pub artifact: PathBuf,

    /// Print metrics as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Applicant attributes given as flags.
#[derive(Debug, Args, Clone, Default)]
pub struct ApplicantArgs {
    #[arg(long, required_unless_present = "record")]
    pub age: Option<u32>,

    /// Annual income (> 0).
    #[arg(long, required_unless_present = "record")]
    pub income: Option<f64>,

    #[arg(long, required_unless_present = "record")]
    pub employment_years: Option<u32>,

    #[arg(long, required_unless_present = "record")]
    pub credit_score: Option<u32>,

    #[arg(long, required_unless_present = "record")]
    pub existing_loans: Option<u32>,

    /// Requested credit amount.
    #[arg(long, required_unless_present = "record")]
    pub loan_amount: Option<f64>,

    /// Revolving utilization in [0, 1].
    #[arg(long, required_unless_present = "record")]
    pub utilization_ratio: Option<f64>,

    #[arg(long, required_unless_present = "record")]
    pub late_payments: Option<u32>,

    /// Defaults to `loan_amount / income`.
    #[arg(long)]
    pub debt_to_income: Option<f64>,
}

#[derive(Debug, Args, Clone)]
pub struct ScoreArgs {
    /// Trained pipeline artifact.
    #[arg(long, value_name = "JSON", default_value = DEFAULT_ARTIFACT)]
    pub artifact: PathBuf,

    /// Read the applicant from a JSON object instead of flags.
    #[arg(long, value_name = "JSON")]
    pub record: Option<PathBuf>,

    #[command(flatten)]
    pub applicant: ApplicantArgs,

    /// Print the decision as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ScoreBatchArgs {
    /// Trained pipeline artifact.
    #[arg(long, value_name = "JSON", default_value = DEFAULT_ARTIFACT)]
    pub artifact: PathBuf,

    /// Applicant CSV (exactly the nine applicant columns).
    #[arg(long, value_name = "CSV")]
    pub input: PathBuf,

    /// Output CSV; stdout when omitted.
    #[arg(long, value_name = "CSV")]
    pub output: Option<PathBuf>,
}

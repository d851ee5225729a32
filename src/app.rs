//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and loads settings
//! - initialises logging
//! - generates, describes and trains on labeled data
//! - scores applicants and prints or writes decisions

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{
    ApplicantArgs, Cli, Command, DescribeArgs, EvaluateArgs, GenerateArgs, ScoreArgs, ScoreBatchArgs,
    TrainArgs,
};
use crate::config::{LogFormat, LoggingConfig, Settings};
use crate::data::{GenerateConfig, generate_dataset};
use crate::decision::DecisionEngine;
use crate::domain::{ApplicantRecord, TrainConfig};
use crate::error::AppError;
use crate::io::{load_applicant_csv, load_labeled_csv, read_artifact, write_artifact, write_dataset_csv, write_decisions_csv};
use crate::models::BoosterParams;
use crate::report::{format_dataset_summary, format_decision, format_evaluation, format_training_report, summarize_dataset};
use crate::service::RiskAssessor;

pub mod pipeline;

/// Entry point for the `credit-risk` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())?;
    init_tracing(&settings.logging, cli.verbose)?;
    debug!(?settings, "settings loaded");

    match cli.command {
        Command::Generate(args) => handle_generate(&args),
        Command::Describe(args) => handle_describe(&args),
        Command::Train(args) => handle_train(&args, &settings),
        Command::Evaluate(args) => handle_evaluate(&args, &settings),
        Command::Score(args) => handle_score(&args, &settings),
        Command::ScoreBatch(args) => handle_score_batch(&args, &settings),
    }
}

/// `RUST_LOG` wins, then `-v`, then the configured level.
fn init_tracing(logging: &LoggingConfig, verbose: u8) -> Result<(), AppError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let directive = match verbose {
                0 => logging.level.as_str(),
                1 => "debug",
                _ => "trace",
            };
            EnvFilter::try_new(directive)
                .map_err(|e| AppError::config(format!("Invalid log level `{directive}`: {e}")))?
        }
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false);
    let result = match logging.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| AppError::config(format!("Failed to initialise logging: {e}")))
}

fn handle_generate(args: &GenerateArgs) -> Result<(), AppError> {
    let data = generate_dataset(&GenerateConfig {
        rows: args.rows,
        seed: args.seed,
    })?;
    write_dataset_csv(&args.output, &data)?;

    println!(
        "Wrote {} rows to {} (positive rate {:.4})",
        data.len(),
        args.output.display(),
        data.positive_rate()
    );
    Ok(())
}

fn handle_describe(args: &DescribeArgs) -> Result<(), AppError> {
    let data = load_labeled_csv(&args.data)?;
    print!("{}", format_dataset_summary(&summarize_dataset(&data)));
    Ok(())
}

fn handle_train(args: &TrainArgs, settings: &Settings) -> Result<(), AppError> {
    let config = train_config_from_args(args);
    let run = pipeline::run_training(&config, settings.decision.threshold)?;
    write_artifact(&config.artifact_path, &run.artifact)?;

    print!(
        "{}",
        format_training_report(&run.artifact.training, &config.booster, &run.evaluation)
    );
    println!("\nArtifact written to {}", config.artifact_path.display());
    Ok(())
}

fn handle_evaluate(args: &EvaluateArgs, settings: &Settings) -> Result<(), AppError> {
    let artifact = read_artifact(&args.artifact)?;
    let data = load_labeled_csv(&args.data)?;
    let report = pipeline::evaluate_pipeline(&artifact.pipeline, &data, settings.decision.threshold)?;

    if args.json {
        println!("{}", to_json(&report)?);
    } else {
        print!("{}", format_evaluation(&report));
    }
    Ok(())
}

fn handle_score(args: &ScoreArgs, settings: &Settings) -> Result<(), AppError> {
    let record = match &args.record {
        Some(path) => read_record_json(path)?,
        None => record_from_args(&args.applicant)?,
    };

    let assessor = load_assessor(&args.artifact, settings)?;
    let decision = assessor.assess(&record)?;
    info!(
        outcome = decision.outcome(),
        probability = decision.probability(),
        "applicant scored"
    );

    if args.json {
        println!("{}", to_json(&decision)?);
    } else {
        print!("{}", format_decision(&decision));
    }
    Ok(())
}

fn handle_score_batch(args: &ScoreBatchArgs, settings: &Settings) -> Result<(), AppError> {
    let assessor = load_assessor(&args.artifact, settings)?;
    let parsed = load_applicant_csv(&args.input)?;

    // Score the rows that parsed; keep parse failures in their original slots.
    let valid: Vec<ApplicantRecord> = parsed.iter().filter_map(|r| r.as_ref().ok().cloned()).collect();
    let mut scored = assessor.assess_batch(&valid).into_iter();
    let results: Vec<_> = parsed
        .into_iter()
        .map(|row| match row {
            Ok(_) => scored
                .next()
                .unwrap_or_else(|| Err(AppError::value("Missing decision for a parsed row."))),
            Err(e) => Err(e),
        })
        .collect();

    let approved = results.iter().filter(|r| matches!(r, Ok(d) if d.is_approved())).count();
    let failed = results.iter().filter(|r| r.is_err()).count();
    info!(
        rows = results.len(),
        approved,
        rejected = results.len() - approved - failed,
        failed,
        "batch scored"
    );
    if failed > 0 {
        warn!(failed, "some rows could not be scored; see the error column");
    }

    match &args.output {
        Some(path) => {
            let file = fs::File::create(path)
                .map_err(|e| AppError::io(format!("Failed to create '{}': {e}", path.display())))?;
            write_decisions_csv(BufWriter::new(file), &results)?;
            println!("Wrote {} decisions to {}", results.len(), path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            write_decisions_csv(&mut lock, &results)?;
            lock.flush()
                .map_err(|e| AppError::io(format!("Failed to write decisions: {e}")))?;
        }
    }
    Ok(())
}

fn load_assessor(artifact: &Path, settings: &Settings) -> Result<RiskAssessor, AppError> {
    let artifact = read_artifact(artifact)?;
    let engine = DecisionEngine::new(settings.decision.clone())?;
    Ok(RiskAssessor::new(Arc::new(artifact.pipeline), engine))
}

fn read_record_json(path: &Path) -> Result<ApplicantRecord, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read '{}': {e}", path.display())))?;
    ApplicantRecord::from_json(&text)
}

/// Build a record from flags, deriving `debt_to_income` when it is not given.
fn record_from_args(args: &ApplicantArgs) -> Result<ApplicantRecord, AppError> {
    fn required<T: Copy>(value: Option<T>, flag: &str) -> Result<T, AppError> {
        value.ok_or_else(|| AppError::schema(format!("Missing required flag `--{flag}`.")))
    }

    let income = required(args.income, "income")?;
    let loan_amount = required(args.loan_amount, "loan-amount")?;
    let debt_to_income = match args.debt_to_income {
        Some(dti) => dti,
        None => {
            if !(income.is_finite() && income > 0.0) {
                return Err(AppError::value(format!(
                    "`income` must be finite and > 0 to derive debt_to_income, got {income}."
                )));
            }
            loan_amount / income
        }
    };

    Ok(ApplicantRecord {
        age: required(args.age, "age")?,
        income,
        employment_years: required(args.employment_years, "employment-years")?,
        credit_score: required(args.credit_score, "credit-score")?,
        existing_loans: required(args.existing_loans, "existing-loans")?,
        loan_amount,
        utilization_ratio: required(args.utilization_ratio, "utilization-ratio")?,
        late_payments: required(args.late_payments, "late-payments")?,
        debt_to_income,
    })
}

/// Map CLI args into the internal training configuration.
fn train_config_from_args(args: &TrainArgs) -> TrainConfig {
    TrainConfig {
        data_path: args.data.clone(),
        artifact_path: args.artifact.clone(),
        test_fraction: args.test_fraction,
        seed: args.seed,
        balance: args.balance,
        smote_k: args.smote_k,
        booster: BoosterParams {
            n_trees: args.n_trees,
            max_depth: args.max_depth,
            learning_rate: args.learning_rate,
            lambda: args.lambda,
            gamma: args.gamma,
            min_child_weight: args.min_child_weight,
            subsample: args.subsample,
            colsample: args.colsample,
            seed: args.seed,
        },
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string_pretty(value).map_err(|e| AppError::io(format!("Failed to serialize output: {e}")))
}

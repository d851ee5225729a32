use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;

fn credit_risk(dir: &Path) -> Command {
    let mut cmd = Command::new(cargo_bin!("credit-risk"));
    cmd.current_dir(dir).env_remove("RUST_LOG").env("CREDIT_RISK_LOGGING__LEVEL", "warn");
    cmd
}

fn generate_and_train(dir: &Path) {
    credit_risk(dir)
        .args(["generate", "--rows", "1500", "--seed", "7", "--output", "data.csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 1500 rows to data.csv"));

    credit_risk(dir)
        .args([
            "train",
            "--data",
            "data.csv",
            "--artifact",
            "model.json",
            "--n-trees",
            "40",
            "--max-depth",
            "4",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Holdout evaluation (unbalanced)"))
        .stdout(predicate::str::contains("Artifact written to model.json"));
}

#[test]
fn generate_train_score_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    generate_and_train(dir.path());

    credit_risk(dir.path())
        .args(["describe", "--data", "data.csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dataset shape: (1500, 10)"))
        .stdout(predicate::str::contains("credit_score"));

    credit_risk(dir.path())
        .args([
            "score",
            "--artifact",
            "model.json",
            "--age",
            "30",
            "--income",
            "50000",
            "--employment-years",
            "5",
            "--credit-score",
            "700",
            "--existing-loans",
            "1",
            "--loan-amount",
            "15000",
            "--utilization-ratio",
            "0.3",
            "--late-payments",
            "0",
        ])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("APPROVED | risk probability:"));

    fs::write(
        dir.path().join("risky.json"),
        r#"{"age":45,"income":40000,"employment_years":2,"credit_score":450,"existing_loans":3,
            "loan_amount":30000,"utilization_ratio":0.95,"late_payments":5,"debt_to_income":0.75}"#,
    )?;
    credit_risk(dir.path())
        .args(["score", "--artifact", "model.json", "--record", "risky.json", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""outcome": "reject""#))
        .stdout(predicate::str::contains("Low credit bureau score"));

    credit_risk(dir.path())
        .args(["evaluate", "--data", "data.csv", "--artifact", "model.json", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""rows": 1500"#));

    Ok(())
}

#[test]
fn score_batch_keeps_row_order_and_reports_bad_rows() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    generate_and_train(dir.path());

    fs::write(
        dir.path().join("applicants.csv"),
        "age,income,employment_years,credit_score,existing_loans,loan_amount,utilization_ratio,late_payments,debt_to_income\n\
         30,50000,5,700,1,15000,0.3,0,0.3\n\
         30,0,5,700,1,15000,0.3,0,0.3\n\
         45,40000,2,450,3,30000,0.95,5,0.75\n",
    )?;

    credit_risk(dir.path())
        .args(["score-batch", "--artifact", "model.json", "--input", "applicants.csv", "--output", "out.csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 3 decisions to out.csv"));

    let out = fs::read_to_string(dir.path().join("out.csv"))?;
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 4, "{out}");
    assert_eq!(lines[0], "index,probability,outcome,reasons,error");
    assert!(lines[1].starts_with("0,") && lines[1].contains(",approve,"), "{out}");
    assert!(lines[2].starts_with("1,,,,") && lines[2].contains("income"), "{out}");
    assert!(lines[3].starts_with("2,") && lines[3].contains(",reject,"), "{out}");

    credit_risk(dir.path())
        .args(["score-batch", "--artifact", "model.json", "--input", "applicants.csv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("index,probability,outcome,reasons,error"));

    Ok(())
}

#[test]
fn missing_column_exits_with_code_2() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    fs::write(
        dir.path().join("data.csv"),
        "age,income,employment_years,credit_score,existing_loans,loan_amount,utilization_ratio,late_payments,risk\n\
         30,50000,5,700,1,15000,0.3,0,0\n",
    )?;

    credit_risk(dir.path())
        .args(["train", "--data", "data.csv"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("schema error"))
        .stderr(predicate::str::contains("debt_to_income"));
    Ok(())
}

#[test]
fn corrupt_artifact_exits_with_code_3() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("model.json"), "{ not json")?;

    credit_risk(dir.path())
        .args(["score", "--artifact", "model.json", "--record", "missing.json"])
        .assert()
        .failure();

    fs::write(
        dir.path().join("applicant.json"),
        r#"{"age":30,"income":50000,"employment_years":5,"credit_score":700,"existing_loans":1,
            "loan_amount":15000,"utilization_ratio":0.3,"late_payments":0,"debt_to_income":0.3}"#,
    )?;
    credit_risk(dir.path())
        .args(["score", "--artifact", "model.json", "--record", "applicant.json"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("artifact load error"));
    Ok(())
}

#[test]
fn invalid_threshold_in_config_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("credit-risk.toml"), "[decision]\nthreshold = 1.5\n")?;

    credit_risk(dir.path())
        .args(["describe", "--data", "data.csv"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("config error"));
    Ok(())
}

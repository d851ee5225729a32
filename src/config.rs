//! Runtime configuration.
//!
//! Sources, later ones win:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config`, or `credit-risk.toml` in the working directory if present)
//! 3. environment variables prefixed `CREDIT_RISK_`, nested keys split by `__`
//!    (`CREDIT_RISK_DECISION__THRESHOLD=0.4`, `CREDIT_RISK_LOGGING__FORMAT=json`)
//!
//! A `.env` file is loaded into the environment before any of this runs.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::decision::DecisionPolicy;
use crate::error::AppError;

pub const DEFAULT_CONFIG_FILE: &str = "credit-risk.toml";
pub const ENV_PREFIX: &str = "CREDIT_RISK";

/// Log line format on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` and `-v` are absent.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub decision: DecisionPolicy,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load from the default sources. An explicit `path` must exist; the
    /// default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let (file, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        Self::from_sources(&file, required, env_source())
    }

    fn from_sources(file: &Path, required: bool, env: Environment) -> Result<Self, AppError> {
        let settings: Settings = Config::builder()
            .add_source(File::from(file).required(required))
            .add_source(env)
            .build()
            .map_err(|e| AppError::config(format!("Failed to read configuration: {e}")))?
            .try_deserialize()
            .map_err(|e| AppError::config(format!("Invalid configuration: {e}")))?;

        settings.decision.validate()?;
        Ok(settings)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;
    use crate::error::ErrorKind;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        env_source().source(Some(map))
    }

    fn toml_file(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[test]
    fn missing_optional_file_gives_defaults() {
        let s = Settings::from_sources(Path::new("does-not-exist.toml"), false, env(&[])).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.decision.threshold, 0.35);
        assert_eq!(s.decision.reasons.low_credit_score_below, 600);
    }

    #[test]
    fn file_overrides_defaults_per_field() {
        let f = toml_file(
            r#"
[decision]
threshold = 0.5

[decision.reasons]
max_late_payments = 2

[logging]
format = "json"
"#,
        );
        let s = Settings::from_sources(f.path(), true, env(&[])).unwrap();
        assert_eq!(s.decision.threshold, 0.5);
        assert_eq!(s.decision.reasons.max_late_payments, 2);
        assert_eq!(s.decision.reasons.high_utilization_above, 0.8);
        assert_eq!(s.logging.format, LogFormat::Json);
        assert_eq!(s.logging.level, "info");
    }

    #[test]
    fn environment_overrides_file() {
        let f = toml_file("[decision]\nthreshold = 0.5\n");
        let s = Settings::from_sources(
            f.path(),
            true,
            env(&[("CREDIT_RISK_DECISION__THRESHOLD", "0.42"), ("CREDIT_RISK_LOGGING__LEVEL", "debug")]),
        )
        .unwrap();
        assert_eq!(s.decision.threshold, 0.42);
        assert_eq!(s.logging.level, "debug");
    }

    #[test]
    fn invalid_threshold_is_config_error() {
        let f = toml_file("[decision]\nthreshold = 1.5\n");
        let err = Settings::from_sources(f.path(), true, env(&[])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn explicit_missing_file_is_config_error() {
        let err = Settings::from_sources(Path::new("nope/credit-risk.toml"), true, env(&[])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}

use thiserror::Error;

/// Broad category of a failure.
///
/// The kind decides the process exit code and lets callers tell a bad request
/// (schema/value) apart from a broken deployment (artifact) or a failed
/// training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Columns missing, extra, or of the wrong type.
    Schema,
    /// Out-of-domain or non-finite numeric input.
    Value,
    /// Invalid configuration or CLI settings.
    Config,
    /// Reading or writing a data file failed.
    Io,
    /// Artifact missing, corrupt, or built by a different feature-set definition.
    ArtifactLoad,
    /// Training aborted.
    Training,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Schema | ErrorKind::Value | ErrorKind::Config | ErrorKind::Io => 2,
            ErrorKind::ArtifactLoad => 3,
            ErrorKind::Training => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Schema => "schema error",
            ErrorKind::Value => "value error",
            ErrorKind::Config => "config error",
            ErrorKind::Io => "io error",
            ErrorKind::ArtifactLoad => "artifact load error",
            ErrorKind::Training => "training error",
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{}: {message}", .kind.label())]
pub struct AppError {
    kind: ErrorKind,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Schema, message)
    }

    pub fn value(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Value, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn artifact(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ArtifactLoad, message)
    }

    pub fn training(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Training, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn exit_code(&self) -> u8 {
        self.kind.exit_code()
    }
}

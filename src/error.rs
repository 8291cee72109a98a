use crate::models::Method;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BenchError>;

/// Boxed underlying cause carried by load failures.
pub type Underlying = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Could not connect to {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: Underlying,
    },

    #[error("{method} failed during {phase}: {source}")]
    Load {
        method: Method,
        phase: LoadPhase,
        #[source]
        source: Underlying,
    },

    #[error("{program} exited with {status}")]
    ExternalTool { program: String, status: String },

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Benchmark run cancelled")]
    Cancelled,

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// The step of a strategy invocation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Prepare,
    Serialize,
    Insert,
    Copy,
    Commit,
    Execute,
    MissingInput,
}

impl std::fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LoadPhase::Prepare => "prepare",
            LoadPhase::Serialize => "serialize",
            LoadPhase::Insert => "insert",
            LoadPhase::Copy => "copy",
            LoadPhase::Commit => "commit",
            LoadPhase::Execute => "execute",
            LoadPhase::MissingInput => "input lookup",
        };
        f.write_str(name)
    }
}

/// How a failed job is reported in the benchmark log `status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ConnectionError,
    LoadError,
    ConfigError,
    ExternalToolError,
    Cancelled,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ConnectionError => "ConnectionError",
            FailureKind::LoadError => "LoadError",
            FailureKind::ConfigError => "ConfigError",
            FailureKind::ExternalToolError => "ExternalToolError",
            FailureKind::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BenchError {
    pub fn load(
        method: Method,
        phase: LoadPhase,
        source: impl Into<Underlying>,
    ) -> Self {
        BenchError::Load {
            method,
            phase,
            source: source.into(),
        }
    }

    pub fn connection(target: impl Into<String>, source: impl Into<Underlying>) -> Self {
        BenchError::Connection {
            target: target.into(),
            source: source.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            BenchError::Connection { .. } => FailureKind::ConnectionError,
            BenchError::ExternalTool { .. } => FailureKind::ExternalToolError,
            BenchError::Config(_)
            | BenchError::ConfigSource(_)
            | BenchError::Validation(_) => FailureKind::ConfigError,
            BenchError::Cancelled => FailureKind::Cancelled,
            _ => FailureKind::LoadError,
        }
    }
}

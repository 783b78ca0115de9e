//! Error types for phased-bench-core

use thiserror::Error;

use crate::config::ConfigError;
use crate::orchestrator::PhaseNumber;

/// Core error type
#[derive(Error, Debug)]
pub enum BenchError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A required builder/setup field was not provided
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    /// No producer is registered for the requested actor type
    #[error("unable to construct actors: no producer for '{0}'")]
    UnknownActorType(String),

    /// A producer was registered twice under the same type name
    #[error("actor type '{0}' is already registered")]
    DuplicateActorType(String),

    /// The orchestrator refused a setup call
    #[error("orchestration error: {0}")]
    Orchestration(String),

    /// An actor failed and aborted the workload
    #[error("actor '{actor_name}' (id {actor_id}) failed in phase {phase}: {message}")]
    ActorFailed {
        /// Id of the failing actor
        actor_id: u64,
        /// Name of the failing actor
        actor_name: String,
        /// Phase the failure happened in
        phase: PhaseNumber,
        /// Last error observed
        message: String,
    },

    /// Metrics error
    #[error("metrics error: {0}")]
    Metrics(String),

    /// Workload file could not be parsed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchError {
    /// Error for a missing builder field
    pub fn missing_config(field: &'static str) -> Self {
        Self::MissingConfig(field)
    }

    /// Error raised by orchestration setup or supervision
    pub fn orchestration(message: impl Into<String>) -> Self {
        Self::Orchestration(message.into())
    }

    /// Metrics error
    pub fn metrics(message: impl Into<String>) -> Self {
        Self::Metrics(message.into())
    }
}

/// Result type alias
pub type BenchResult<T> = std::result::Result<T, BenchError>;

/// Failure of a single unit of work.
///
/// `Transient` failures are retried by the execution strategy; `Fatal`
/// failures are not and always abort the workload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// A failure worth retrying (timeouts, write conflicts, ...)
    #[error("{0}")]
    Transient(String),

    /// A failure that retrying cannot fix
    #[error("fatal: {0}")]
    Fatal(String),
}

impl OperationError {
    /// Create a retryable error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Create a non-retryable error
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

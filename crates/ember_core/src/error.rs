//! Error types for the core module.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type alias for stage operations.
pub type StageResult<T> = Result<T, StageError>;

/// Result type alias for resource fetching.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors that can occur during registration and orchestration.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Duplicate registration in {domain} registry: {name}")]
    DuplicateRegistration { domain: String, name: String },

    #[error("Unknown stage: {name} (registered: {})", .known.join(", "))]
    UnknownStage { name: String, known: Vec<String> },

    #[error("Creator '{expected}' produced a stage named '{actual}'")]
    StageNameMismatch { expected: String, actual: String },

    #[error("Stage '{stage}' rejected configuration: {source}")]
    ApplyFailed {
        stage: String,
        #[source]
        source: StageError,
    },

    #[error("Stage '{stage}' failed: {source}")]
    RunFailed {
        stage: String,
        #[source]
        source: StageError,
    },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CoreError {
    /// Name of the stage this error is attributed to, if any.
    pub fn stage(&self) -> Option<&str> {
        match self {
            CoreError::ApplyFailed { stage, .. } | CoreError::RunFailed { stage, .. } => {
                Some(stage)
            }
            CoreError::StageNameMismatch { expected, .. } => Some(expected),
            _ => None,
        }
    }
}

/// Errors returned by a stage's `apply` or `run`.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("unsupported {entry}: {reason}")]
    Unsupported { entry: String, reason: String },

    #[error("invalid {entry}: {reason}")]
    Invalid { entry: String, reason: String },

    #[error("run called before the configuration was applied")]
    NotApplied,

    #[error("refusing to overwrite existing {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("{0}")]
    Failed(String),
}

impl StageError {
    /// Wrap an IO error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| StageError::Io { path, source }
    }
}

/// Errors that can occur while fetching a referenced resource.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Unsupported scheme in source: {0}")]
    UnsupportedScheme(String),

    #[error("Malformed source: {0}")]
    Malformed(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("HTTP {status} fetching {url}")]
    Http { status: u16, url: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

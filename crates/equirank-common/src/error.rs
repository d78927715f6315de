use thiserror::Error;

#[derive(Debug, Error)]
pub enum EquirankError {
    #[error("Unknown cohort kind: {0}")]
    UnknownCohort(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Data provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EquirankError>;

/// Failures reported by the external market-data collaborators.
///
/// These never escape a cohort pipeline: the affected candidate is
/// neutralised and the batch carries on.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    #[error("No data for {0}")]
    NotFound(String),

    #[error("Data source unreachable: {0}")]
    Unreachable(String),

    #[error("Malformed data: {0}")]
    Malformed(String),
}

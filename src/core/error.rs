use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Could not parse plan: {0}")]
    Parse(String),

    #[error("No handler for action '{0}'")]
    Resolution(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Approval window expired")]
    ApprovalTimeout,

    #[error("Plan rejected by requester")]
    ApprovalRejected,

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl PipelineError {
    /// Whether the generator should try the backend again after this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Generation(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

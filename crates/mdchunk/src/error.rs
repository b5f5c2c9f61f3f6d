use thiserror::Error;

/// Result type for chunker operations
pub type Result<T> = std::result::Result<T, ChunkerError>;

/// Errors that can occur during Markdown chunking
#[derive(Error, Debug)]
pub enum ChunkerError {
    /// Input could not be accepted (e.g. invalid UTF-8)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Explicit strategy name is not registered
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    /// A strategy with the same name is already registered
    #[error("Strategy already registered: {0}")]
    DuplicateStrategy(String),

    /// No registered strategy accepted the document
    #[error("Strategy selection failed: {0}")]
    SelectionFailed(String),

    /// A strategy errored while splitting
    #[error("Strategy '{strategy}' failed: {reason}")]
    StrategyFailed { strategy: String, reason: String },

    /// Source content was lost or over-duplicated beyond tolerance
    #[error("Completeness violation: {0}")]
    CompletenessViolation(String),

    /// Serialization of results or configuration failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ChunkerError {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a strategy failure for the named strategy
    pub fn strategy_failed(strategy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StrategyFailed {
            strategy: strategy.into(),
            reason: reason.into(),
        }
    }
}

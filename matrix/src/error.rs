use thiserror::Error;

#[derive(Error, Debug)]
pub enum HeatmapError {
    /// Distribution statistics were requested for an empty sample.
    #[error("Empty input: cannot compute distribution statistics over zero values")]
    EmptyInput,

    #[error("Non-finite value {value} at index {index}")]
    NonFiniteValue { index: usize, value: f64 },

    #[error("Invalid record at index {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("Invalid tier: {0}")]
    InvalidTier(String),

    #[error("Unknown tier: {0}")]
    UnknownTier(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The run was cancelled or superseded by a newer request.
    #[error("Pipeline run was cancelled")]
    Cancelled,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HeatmapError {
    /// Create an InvalidRecord error
    pub fn invalid_record(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            index,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HeatmapError>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("View '{0}' returned no rows")]
    EmptyDataset(String),

    #[error("Timed out after {seconds}s while fetching view '{view}'")]
    FetchTimeout { view: String, seconds: u64 },

    #[error("Failed to fetch view '{view}': {details}")]
    FetchFailed { view: String, details: String },

    #[error("Invalid thresholds: green ({green}) must be finite and not below yellow ({yellow})")]
    InvalidThresholds { green: f64, yellow: f64 },

    #[error("Reduction {reduction} cannot be applied to field {field}")]
    InvalidReduction { field: String, reduction: String },

    #[error("Invalid month {0}: must be between 1 and 12")]
    InvalidMonth(u32),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DashboardError {
    /// Whether a render pass should fall back to an empty state instead of
    /// reporting a failure.
    pub fn is_empty_state(&self) -> bool {
        matches!(self, DashboardError::EmptyDataset(_))
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;

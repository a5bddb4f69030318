use thiserror::Error;

/// Core error types for claimscope operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid timestamp: {0}")]
    InvalidDateTime(String),

    #[error("Invalid beneficiary id: {0}")]
    InvalidBeneficiaryId(String),

    #[error("Unknown claim category: {0}")]
    UnknownCategory(String),

    #[error("No claim source registered for category {0}")]
    MissingSource(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    /// Create a new InvalidDateTime error
    pub fn invalid_date_time(datetime: impl Into<String>) -> Self {
        Self::InvalidDateTime(datetime.into())
    }

    /// Create a new InvalidBeneficiaryId error
    pub fn invalid_beneficiary_id(id: impl Into<String>) -> Self {
        Self::InvalidBeneficiaryId(id.into())
    }

    /// Create a new UnknownCategory error
    pub fn unknown_category(tag: impl Into<String>) -> Self {
        Self::UnknownCategory(tag.into())
    }

    /// Create a new Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Check if this error is a client error (4xx category)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidDateTime(_)
                | Self::InvalidBeneficiaryId(_)
                | Self::UnknownCategory(_)
                | Self::JsonError(_)
        )
    }

    /// Check if this error is a server error (5xx category)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::MissingSource(_))
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidDateTime(_)
            | Self::InvalidBeneficiaryId(_)
            | Self::UnknownCategory(_) => ErrorCategory::Validation,
            Self::JsonError(_) => ErrorCategory::Serialization,
            Self::MissingSource(_) | Self::Configuration(_) => ErrorCategory::Configuration,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Serialization,
    Configuration,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Serialization => write!(f, "serialization"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

use claimscope_search::RangeError;
use thiserror::Error;

/// Errors raised by the filter index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    InvalidQuery(#[from] RangeError),

    #[error("Invalid beneficiary id: '{0}'")]
    InvalidBeneficiaryId(String),

    #[error("Invalid load batch: {0}")]
    InvalidBatch(String),

    #[error("Filter refresh failed: {0}")]
    RefreshFailure(String),

    #[error("Batch catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl IndexError {
    pub fn invalid_batch(message: impl Into<String>) -> Self {
        Self::InvalidBatch(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Whether the caller supplied something malformed.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidQuery(_) | Self::InvalidBeneficiaryId(_))
    }
}

/// Errors reading the batch catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Catalog entry {id} is invalid: {message}")]
    InvalidEntry { id: u64, message: String },

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors from ledger store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A key read by the transaction changed before it could commit.
    #[error("transaction conflict on {key}")]
    Conflict { key: String },

    /// The backend cannot serve requests right now (poisoned lock, failed
    /// snapshot write, lost connection).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A unique field collided with a committed record.
    #[error("unique constraint violated: {field} = {value}")]
    UniqueViolation { field: &'static str, value: String },

    /// A write referenced a record that does not exist.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether re-running the whole transaction may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Unavailable(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

//! Error types for catalog operations.

use thiserror::Error;

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The title produces an empty slug.
    #[error("invalid task title: {title:?}")]
    InvalidTitle { title: String },

    /// A task with this slug already exists.
    #[error("task already exists: {slug}")]
    DuplicateSlug { slug: String },

    /// No task with this slug exists.
    #[error("task not found: {slug}")]
    NotFound { slug: String },

    /// Storage failure.
    #[error("store error: {0}")]
    Store(#[from] tally_store::StoreError),
}

impl CatalogError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_retryable())
    }
}

/// Convenience type alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

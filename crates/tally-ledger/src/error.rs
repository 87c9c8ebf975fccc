use std::fmt;

use tally_store::StoreError;
use tally_types::TypeError;

/// The record a lookup failed to find.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    User,
    Task,
    Points,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Task => write!(f, "task"),
            Self::Points => write!(f, "points"),
        }
    }
}

/// How a caller should treat a [`LedgerError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced record is missing.
    NotFound,
    /// The request is well-formed but a rule forbids it. Nothing was written
    /// and the message is safe to show to the end user.
    BusinessRule,
    /// The transaction could not commit; the whole flow may be retried.
    Transient,
    /// Broken data or configuration. Not retried.
    Fatal,
}

/// Errors produced by ledger flows.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: Entity, key: String },

    #[error("task {task} already completed by {username}")]
    AlreadyCompleted { username: String, task: String },

    #[error("daily bonus already collected by {username}")]
    BonusAlreadyCollected { username: String },

    #[error("transient store failure: {0}")]
    Transient(#[source] StoreError),

    #[error("store error: {0}")]
    Store(#[source] StoreError),

    #[error("could not allocate a unique referral code after {attempts} attempts")]
    ReferralCodeExhausted { attempts: u32 },

    #[error("invalid record: {0}")]
    InvalidRecord(#[from] TypeError),
}

impl LedgerError {
    pub(crate) fn not_found(entity: Entity, key: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyCompleted { .. } | Self::BonusAlreadyCollected { .. } => {
                ErrorKind::BusinessRule
            }
            Self::Transient(_) => ErrorKind::Transient,
            Self::Store(_) | Self::ReferralCodeExhausted { .. } | Self::InvalidRecord(_) => {
                ErrorKind::Fatal
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        if e.is_retryable() {
            Self::Transient(e)
        } else {
            Self::Store(e)
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

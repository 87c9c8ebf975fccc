use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("balance overflow: {balance} + {amount}")]
    BalanceOverflow { balance: u64, amount: u64 },
}

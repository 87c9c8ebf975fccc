//! Transactional rewards ledger for Tally.
//!
//! This crate is the heart of Tally. It provides:
//! - [`RewardLedger`], the three reward flows (task completion, daily bonus,
//!   referral registration) plus the bonus-status and balance reads
//! - Daily-bonus eligibility ([`BonusWindow`]) shared by reads and writes
//! - The reward formula ([`daily_bonus_reward`]) and referral-code generation
//! - [`LedgerError`] with its [`ErrorKind`] taxonomy for API layers
//!
//! Every write flow runs as exactly one store transaction. Business-rule and
//! not-found checks happen before any write; a failing flow aborts its
//! transaction, and a transient commit failure re-runs the flow from scratch.

pub mod config;
pub mod error;
pub mod ledger;
pub mod outcome;
pub mod referral;
pub mod streak;

pub use config::LedgerConfig;
pub use error::{Entity, ErrorKind, LedgerError, LedgerResult};
pub use ledger::RewardLedger;
pub use outcome::{
    BonusCollection, BonusStatus, Registration, RegistrationOutcome, TaskCompletion,
};
pub use referral::generate_referral_code;
pub use streak::{daily_bonus_reward, BonusWindow};

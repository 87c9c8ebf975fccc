//! Foundation types for the Tally rewards ledger.
//!
//! This crate provides the identifiers, persisted records, and the clock
//! abstraction shared by every other Tally crate.
//!
//! # Key Types
//!
//! - [`UserId`] / [`TaskId`] — UUID v7 record identifiers
//! - [`User`] — identity, referral code, referrals, completed-task set
//! - [`Points`] — a user's balance, kept as a separate record for update isolation
//! - [`Bonus`] — daily-bonus streak state, created lazily
//! - [`Task`] — catalog entry with a unique slug and a reward value
//! - [`Clock`] — injected source of "now" ([`SystemClock`], [`ManualClock`])

pub mod clock;
pub mod error;
pub mod identity;
pub mod records;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::TypeError;
pub use identity::{TaskId, UserId};
pub use records::{Bonus, Points, Profile, Task, User};

//! Transactional record storage for the Tally rewards ledger.
//!
//! The ledger's consistency rests entirely on this crate: every flow opens one
//! transaction, performs all of its reads and writes through it, and then
//! commits or aborts. There is no application-level locking above it.
//!
//! # Storage Backends
//!
//! All backends implement the [`LedgerStore`] / [`LedgerTransaction`] pair:
//!
//! - [`InMemoryLedgerStore`] -- optimistic concurrency over in-memory tables,
//!   optionally persisted as a JSON snapshot after every commit
//!
//! # Design Rules
//!
//! 1. Reads inside a transaction see that transaction's own pending writes.
//! 2. Writes are buffered and become visible only on commit, all at once.
//! 3. Every key read (including absent keys and secondary-index keys) is
//!    validated at commit; a concurrent change fails the commit with
//!    [`StoreError::Conflict`], which callers may retry.
//! 4. Dropping a transaction without committing discards its writes.
//! 5. Usernames, referral codes and task slugs are unique at commit.

pub mod error;
pub mod key;
pub mod memory;
pub mod snapshot;
pub mod tables;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use key::RecordKey;
pub use memory::{InMemoryLedgerStore, InMemoryTransaction};
pub use traits::{LedgerStore, LedgerTransaction};

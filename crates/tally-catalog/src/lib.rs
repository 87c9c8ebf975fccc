//! Task catalog for the Tally rewards ledger.
//!
//! Tasks are the things users complete to earn points. Each task is
//! addressed by a slug derived from its title; the derivation lives here and
//! is used both when a task is created and when a completion request looks
//! one up, so the two always agree.
//!
//! # Modules
//!
//! - [`error`] — Error types for catalog operations
//! - [`slug`] — Title-to-slug derivation
//! - [`registry`] — [`TaskRegistry`], transactional create / find / list

pub mod error;
pub mod registry;
pub mod slug;

pub use error::{CatalogError, Result};
pub use registry::{NewTask, TaskRegistry};
pub use slug::slugify;

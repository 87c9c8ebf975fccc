//! HTTP server for Tally.
//!
//! A thin JSON layer over the rewards ledger and task catalog. Handlers do
//! no business logic; each ledger error kind maps to one status class.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use router::build_router;
pub use server::TallyServer;

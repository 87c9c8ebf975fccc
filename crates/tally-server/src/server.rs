use std::sync::Arc;

use tally_store::InMemoryLedgerStore;
use tally_types::SystemClock;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Tally HTTP server.
pub struct TallyServer {
    config: ServerConfig,
}

impl TallyServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open the store, reloading the snapshot when one is configured.
    pub fn open_store(&self) -> ServerResult<Arc<InMemoryLedgerStore>> {
        let store = match &self.config.snapshot_path {
            Some(path) => InMemoryLedgerStore::open(path)?,
            None => {
                tracing::warn!("no snapshot_path configured; ledger state lives in memory only");
                InMemoryLedgerStore::new()
            }
        };
        Ok(Arc::new(store))
    }

    /// Build the router over a freshly opened store.
    pub fn router(&self) -> ServerResult<axum::Router> {
        let state = AppState::new(
            self.open_store()?,
            Arc::new(SystemClock),
            self.config.ledger.clone(),
        );
        Ok(build_router(state))
    }

    /// Serve until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router()?;
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!("Tally server listening on {}", self.config.bind_addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "failed to listen for shutdown signal");
                }
                tracing::info!("shutting down");
            })
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

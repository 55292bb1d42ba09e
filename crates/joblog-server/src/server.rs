//! Log server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use joblog::JobCatalog;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::render::SnippetRenderer;
use crate::routes::create_router;
use crate::state::AppState;

/// HTTP server for job logs.
#[derive(Debug, Clone)]
pub struct LogServer {
    state: Arc<AppState>,
}

impl LogServer {
    /// Create a new server backed by `catalog`.
    #[must_use]
    pub fn new(config: ServerConfig, catalog: Arc<dyn JobCatalog>) -> Self {
        Self {
            state: Arc::new(AppState::new(config, catalog)),
        }
    }

    /// Create a new server with a custom snippet renderer.
    #[must_use]
    pub fn with_renderer(
        config: ServerConfig,
        catalog: Arc<dyn JobCatalog>,
        renderer: Arc<dyn SnippetRenderer>,
    ) -> Self {
        Self {
            state: Arc::new(AppState::new(config, catalog).with_renderer(renderer)),
        }
    }

    /// Get the server state.
    #[must_use]
    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Start the server and listen for connections.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn serve(&self, addr: SocketAddr) -> ServerResult<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(addr, e))?;

        info!(addr = %addr, "Log server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        Ok(())
    }

    /// Start the server; it stops accepting connections when `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn serve_with_shutdown<F>(&self, addr: SocketAddr, shutdown: F) -> ServerResult<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(addr, e))?;

        info!(addr = %addr, "Log server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        info!("Log server shut down");
        Ok(())
    }

    /// Create the router without starting the server.
    pub fn router(&self) -> axum::Router {
        create_router(self.state.clone())
    }
}

//! # joblog-server
//!
//! HTTP surface for job logs.
//!
//! Routes, all under the configured prefix (default `/api`):
//!
//! - `GET /health`: liveness and uptime
//! - `GET /jobs/{id}/logs`: log names of a job visible to the caller
//! - `GET /jobs/{id}/log/{*log_name}?offset=&format=raw`: raw download or rendered snippet
//! - `GET /jobs/{id}/log-json/{*log_name}?offset=`: incremental JSON poll
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use joblog::FsJobCatalog;
//! use joblog_server::{LogServer, ServerConfig};
//!
//! # async fn run() -> joblog_server::ServerResult<()> {
//! let config = ServerConfig::default();
//! let catalog = Arc::new(FsJobCatalog::new(&config.log.root_dir, &config.log.compressed_suffix));
//! let server = LogServer::new(config.clone(), catalog);
//! server.serve(config.bind_addr).await
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod principal;
pub mod render;
pub mod routes;
pub mod server;
pub mod state;

pub use cli::{Cli, LogFormat};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use principal::CurrentPrincipal;
pub use render::{JsonSnippetRenderer, SnippetContext, SnippetRenderer};
pub use routes::create_router;
pub use server::LogServer;
pub use state::AppState;

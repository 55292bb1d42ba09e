//! Shared application state for the log server.

use std::sync::Arc;
use std::time::Instant;

use joblog::{JobCatalog, JobId, LogEndpoint};
use url::Url;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::render::{JsonSnippetRenderer, SnippetRenderer};

/// Shared state passed to every handler.
pub struct AppState {
    config: ServerConfig,
    endpoint: LogEndpoint,
    renderer: Arc<dyn SnippetRenderer>,
    start_time: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("endpoint", &self.endpoint)
            .field("start_time", &self.start_time)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create state backed by `catalog`, rendering snippets as JSON.
    #[must_use]
    pub fn new(config: ServerConfig, catalog: Arc<dyn JobCatalog>) -> Self {
        let endpoint = LogEndpoint::new(&config.log, catalog);
        Self {
            config,
            endpoint,
            renderer: Arc::new(JsonSnippetRenderer),
            start_time: Instant::now(),
        }
    }

    /// Replace the snippet renderer.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn SnippetRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Get the server configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the log endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &LogEndpoint {
        &self.endpoint
    }

    /// Get the snippet renderer.
    #[must_use]
    pub fn renderer(&self) -> &dyn SnippetRenderer {
        self.renderer.as_ref()
    }

    /// Seconds since the state was created.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Path of the JSON poll endpoint for a log.
    ///
    /// Each segment of the log name is percent-encoded, so the path routes
    /// back to the same log.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the path cannot be assembled.
    pub fn poll_url(&self, job_id: JobId, log_name: &str) -> ServerResult<String> {
        let mut url =
            Url::parse("http://localhost/").map_err(|e| ServerError::Internal(e.to_string()))?;
        let id = job_id.to_string();

        url.path_segments_mut()
            .map_err(|()| ServerError::Internal("poll URL has no path".to_string()))?
            .clear()
            .extend(
                self.config
                    .api_prefix
                    .split('/')
                    .chain(["jobs", id.as_str(), "log-json"])
                    .chain(log_name.split('/'))
                    .filter(|segment| !segment.is_empty()),
            );

        Ok(url.path().to_string())
    }
}

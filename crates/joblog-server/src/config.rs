//! Log server configuration.

use std::net::SocketAddr;

use joblog::LogConfig;

/// Configuration for the log server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to.
    pub bind_addr: SocketAddr,
    /// Log subsystem configuration.
    pub log: LogConfig,
    /// CORS allowed origins (empty means all).
    pub cors_origins: Vec<String>,
    /// Path prefix the API is mounted under.
    pub api_prefix: String,
    /// Chunks buffered between the file reader and a slow client.
    pub stream_buffer_chunks: usize,
    /// Take the principal from `X-Remote-User` / `X-Remote-Superuser` headers
    /// set by an authenticating proxy.
    pub trust_proxy_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log: LogConfig::default(),
            cors_origins: Vec::new(),
            api_prefix: "/api".to_string(),
            stream_buffer_chunks: 2,
            trust_proxy_headers: false,
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with the specified bind address.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Self::default()
        }
    }

    /// Set the log subsystem configuration.
    #[must_use]
    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Add a CORS allowed origin.
    #[must_use]
    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origins.push(origin.into());
        self
    }

    /// Set the API prefix. A leading slash is added and a trailing one removed.
    #[must_use]
    pub fn with_api_prefix(mut self, prefix: &str) -> Self {
        let trimmed = prefix.trim_matches('/');
        self.api_prefix = if trimmed.is_empty() {
            "/api".to_string()
        } else {
            format!("/{trimmed}")
        };
        self
    }

    /// Set how many chunks may be buffered per streamed response.
    #[must_use]
    pub fn with_stream_buffer_chunks(mut self, chunks: usize) -> Self {
        self.stream_buffer_chunks = chunks.max(1);
        self
    }

    /// Trust proxy-supplied identity headers.
    #[must_use]
    pub const fn with_trust_proxy_headers(mut self, enabled: bool) -> Self {
        self.trust_proxy_headers = enabled;
        self
    }
}

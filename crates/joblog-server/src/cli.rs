//! Command-line argument parsing with clap.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use joblog::{FormatConfig, LogConfig, DEFAULT_CHUNK_SIZE};

use crate::config::ServerConfig;

/// Job log server - serves, tails and downloads background job logs.
#[derive(Parser, Debug, Clone)]
#[command(name = "joblog-server")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Address to listen on.
    #[arg(short, long, env = "JOBLOG_BIND", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Directory holding one subdirectory per job.
    #[arg(short, long, env = "JOBLOG_ROOT", default_value = "logs")]
    pub root: PathBuf,

    /// Extensions displayable as text (repeatable or comma-separated).
    #[arg(
        long = "allowed-extension",
        env = "JOBLOG_ALLOWED_EXTENSIONS",
        value_delimiter = ','
    )]
    pub allowed_extensions: Vec<String>,

    /// Maximum bytes read per chunk.
    #[arg(long, env = "JOBLOG_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Report snippet offsets one past the bytes read.
    #[arg(long, env = "JOBLOG_LEGACY_SNIPPET_OFFSET")]
    pub legacy_snippet_offset: bool,

    /// Allowed CORS origins (all when unset).
    #[arg(long = "cors-origin", env = "JOBLOG_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Read the principal from X-Remote-User / X-Remote-Superuser headers.
    #[arg(long, env = "JOBLOG_TRUST_PROXY_HEADERS")]
    pub trust_proxy_headers: bool,

    /// Diagnostic log output format.
    #[arg(long, value_enum, env = "JOBLOG_LOG_FORMAT", default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Diagnostic log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl Cli {
    /// Build the server configuration from the parsed arguments.
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        let format = if self.allowed_extensions.is_empty() {
            FormatConfig::default()
        } else {
            FormatConfig::with_extensions(&self.allowed_extensions)
        }
        .with_legacy_snippet_offset(self.legacy_snippet_offset);

        let log = LogConfig::new(&self.root)
            .with_chunk_size(self.chunk_size)
            .with_format(format);

        self.cors_origins.iter().fold(
            ServerConfig::new(self.bind)
                .with_log(log)
                .with_trust_proxy_headers(self.trust_proxy_headers),
            |config, origin| config.with_cors_origin(origin.as_str()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["joblog-server"]).unwrap();
        let config = cli.server_config();

        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.log.root_dir, PathBuf::from("logs"));
        assert_eq!(config.log.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(config.log.format.allowed_log_extensions.contains(".log"));
        assert!(!config.log.format.legacy_snippet_offset);
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn test_full_arguments() {
        let cli = Cli::try_parse_from([
            "joblog-server",
            "--bind",
            "127.0.0.1:9000",
            "--root",
            "/srv/jobs",
            "--allowed-extension",
            "log,txt",
            "--allowed-extension",
            ".out",
            "--chunk-size",
            "4096",
            "--legacy-snippet-offset",
            "--cors-origin",
            "http://localhost:3000",
            "--trust-proxy-headers",
            "--log-format",
            "json",
        ])
        .unwrap();
        let config = cli.server_config();

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.log.root_dir, PathBuf::from("/srv/jobs"));
        assert_eq!(config.log.chunk_size, 4096);
        let allowed: Vec<_> = config.log.format.allowed_log_extensions.iter().cloned().collect();
        assert_eq!(allowed, vec![".log", ".out", ".txt"]);
        assert!(config.log.format.legacy_snippet_offset);
        assert_eq!(config.cors_origins, vec!["http://localhost:3000"]);
        assert!(config.trust_proxy_headers);
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn test_rejects_bad_bind() {
        assert!(Cli::try_parse_from(["joblog-server", "--bind", "nowhere"]).is_err());
    }
}

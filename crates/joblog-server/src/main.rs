//! Job log server binary.

use std::sync::Arc;

use clap::Parser;
use joblog::FsJobCatalog;
use joblog_server::{Cli, LogFormat, LogServer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = cli.server_config();
    let bind_addr = config.bind_addr;

    info!(
        root = %config.log.root_dir.display(),
        chunk_size = config.log.chunk_size,
        "Starting job log server on {}",
        bind_addr
    );

    let catalog = Arc::new(FsJobCatalog::new(
        &config.log.root_dir,
        &config.log.compressed_suffix,
    ));
    let server = LogServer::new(config, catalog);

    if let Err(e) = server.serve_with_shutdown(bind_addr, shutdown_signal()).await {
        error!("Log server error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

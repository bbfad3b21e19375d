//! Sonde daemon binary
//!
//! Serves reachability probes for databases, LDAP directories, sockets and
//! URLs over HTTP.

use clap::Parser;
use daemon::{Daemon, DaemonConfig};
use sonde_core::Settings;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "sonde")]
#[command(about = "HTTP reachability probes for databases, directories, sockets and URLs")]
#[command(version)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "SONDE_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "SONDE_PORT", default_value_t = 3000)]
    port: u16,

    /// Log level or filter directive (RUST_LOG takes precedence)
    #[arg(long, env = "SONDE_LOG", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> daemon::Result<()> {
    let cli = Cli::parse();
    sonde_core::utils::init_tracing(&cli.log_level)?;

    info!("Starting Sonde {}", env!("CARGO_PKG_VERSION"));

    // settings are re-read per request; this only reports problems early
    match Settings::from_env() {
        Ok(settings) => info!(
            "network timeout {}, test url {}, directory {}",
            humantime::format_duration(settings.network_timeout),
            settings.test_url,
            settings.directory.url
        ),
        Err(e) => warn!("probe settings are invalid, affected routes will fail: {}", e),
    }

    let daemon = Daemon::new(DaemonConfig {
        host: cli.host,
        port: cli.port,
    });
    daemon.start(shutdown_signal()).await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

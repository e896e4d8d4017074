use anyhow::{Context, Result};
use clap::Parser;
use mqtt_authd::config::Config;
use mqtt_authd::server;
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// HTTP auth backend for MQTT broker auth plugins
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to config file (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address from the config file
    #[arg(short, long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting mqtt-authd {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_REVISION")
    );

    let server = server::start(config).await?;

    // Handle UNIX signals
    tokio::select! {
        // SIGINT (Ctrl+C) - graceful shutdown
        _ = signal::ctrl_c() => {
            info!("Received SIGINT, initiating graceful shutdown...");
            server.stop().await?;
            info!("Graceful shutdown completed");
        }

        // SIGTERM - immediate quit
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        warn!("Failed to install SIGTERM handler: {e}");
                        std::future::pending::<()>().await
                    }
                }
            }
            #[cfg(not(unix))]
            {
                // On non-Unix systems, just wait forever (SIGTERM not available)
                std::future::pending::<()>().await
            }
        } => {
            warn!("Received SIGTERM, quitting immediately");
            std::process::exit(0);
        }

        // Server task exited on its own
        _ = server.finished() => {
            anyhow::bail!("Server stopped unexpectedly");
        }
    }

    Ok(())
}

mod handlers;

pub use handlers::{router, AclPacket, SuperuserPacket, UserPacket};

use crate::auth::{self, Gatekeeper};
use crate::config::Config;
use crate::storage::DirectoryError;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Server failed to start: {0}")]
    StartupFailed(String),
    #[error("Server is already running")]
    AlreadyRunning,
    #[error("Server is not running")]
    NotRunning,
    #[error("Tenant directory error: {0}")]
    Directory(#[from] DirectoryError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Static function to start a server with the given configuration
pub async fn start(config: Config) -> Result<Server> {
    let server = Server::new(config)?;
    server.start().await?;
    Ok(server)
}

pub struct Server {
    config: Config,
    gatekeeper: Gatekeeper,
    shutdown_token: CancellationToken,
    finished_token: CancellationToken,
    running: AtomicBool,
    server_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    address: RwLock<Option<String>>,
}

impl Server {
    /// Build the server, opening the configured tenant directory
    pub fn new(config: Config) -> Result<Self> {
        let gatekeeper = auth::new(&config)?;
        Ok(Self::with_gatekeeper(config, gatekeeper))
    }

    pub fn with_gatekeeper(config: Config, gatekeeper: Gatekeeper) -> Self {
        Self {
            config,
            gatekeeper,
            shutdown_token: CancellationToken::new(),
            finished_token: CancellationToken::new(),
            running: AtomicBool::new(false),
            server_handle: Mutex::new(None),
            address: RwLock::new(None),
        }
    }

    pub fn gatekeeper(&self) -> &Gatekeeper {
        &self.gatekeeper
    }

    pub async fn start(&self) -> Result<()> {
        if self.running.load(Ordering::Acquire) {
            return Err(ServerError::AlreadyRunning);
        }

        info!("Starting Server");

        let listener = TcpListener::bind(&self.config.listen).await.map_err(|e| {
            ServerError::StartupFailed(format!("Failed to bind to {}: {e}", self.config.listen))
        })?;

        // Get the actual bound address (useful for port 0)
        let bound_addr = listener
            .local_addr()
            .map_err(|e| ServerError::StartupFailed(format!("Failed to get local address: {e}")))?;

        *self.address.write().await = Some(bound_addr.to_string());

        info!("Server listening on {}", bound_addr);

        let shutdown_token = self.shutdown_token.clone();
        let finished_token = self.finished_token.clone();
        let app = router(self.gatekeeper.clone());
        let handle = tokio::spawn(async move {
            Self::run_server(listener, app, shutdown_token).await;
            finished_token.cancel();
        });

        *self.server_handle.lock().await = Some(handle);

        self.running.store(true, Ordering::Release);
        info!("Server started successfully");
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        if !self.running.load(Ordering::Acquire) {
            return Err(ServerError::NotRunning);
        }

        info!("Stopping server");

        self.shutdown_token.cancel();

        // In-flight requests finish before the task completes
        if let Some(handle) = self.server_handle.lock().await.take() {
            handle.await.unwrap_or_else(|e| {
                error!("Error in waiting for server task {e}");
            });
        }

        self.running.store(false, Ordering::Release);

        info!("Server stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub async fn address(&self) -> Option<String> {
        self.address.read().await.clone()
    }

    /// Resolves once the server task has exited, whether stopped or failed
    pub async fn finished(&self) {
        self.finished_token.cancelled().await
    }

    async fn run_server(
        listener: TcpListener,
        app: axum::Router,
        shutdown_token: CancellationToken,
    ) {
        let shutdown = async move { shutdown_token.cancelled().await };

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("HTTP server error: {e}");
        }

        info!("Server loop completed");
    }
}

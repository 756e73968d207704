//! HTTP listener with graceful shutdown.

use axum::Router;
use gateway_config::ServerConfig;
use gateway_core::{GatewayError, GatewayResult};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

/// Serves a router until a shutdown signal arrives
#[derive(Debug, Clone)]
pub struct Server {
    host: String,
    port: u16,
    request_timeout: Duration,
}

impl Server {
    /// Create a server from listener settings
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            request_timeout: config.request_timeout,
        }
    }

    /// Address to bind
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Bind and serve until SIGINT/SIGTERM
    ///
    /// # Errors
    /// Returns error if the address cannot be bound or serving fails
    pub async fn run(self, router: Router) -> GatewayResult<()> {
        let listener = TcpListener::bind(self.address())
            .await
            .map_err(|e| GatewayError::configuration(format!("Failed to bind {}: {e}", self.address())))?;
        self.serve(listener, router, shutdown_signal()).await
    }

    /// Serve on an existing listener until `shutdown` resolves
    ///
    /// # Errors
    /// Returns error if serving fails
    pub async fn serve<F>(self, listener: TcpListener, router: Router, shutdown: F) -> GatewayResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener
            .local_addr()
            .map_err(|e| GatewayError::internal(e.to_string()))?;
        info!(address = %local, "Server listening");

        let app = router.layer(TimeoutLayer::new(self.request_timeout));
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| GatewayError::internal(format!("Server error: {e}")))?;

        info!("Server stopped");
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM
///
/// # Panics
/// Panics if signal handlers cannot be installed
#[allow(clippy::expect_used)]
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        "ctrl+c"
    };

    #[cfg(unix)]
    let sigterm = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
        "sigterm"
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<&str>();

    let signal_name = tokio::select! {
        name = ctrl_c => name,
        name = sigterm => name,
    };

    info!(signal = signal_name, "Received shutdown signal");
}

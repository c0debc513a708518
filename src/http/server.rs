//! HTTP server setup.
//!
//! # Responsibilities
//! - Mount a [`Supervisor`] as the service for every path
//! - Provide the remote address to the supervisor via `ConnectInfo`
//! - Run until a shutdown signal, draining in-flight requests
//!
//! # Design Decisions
//! - The supervisor is the fallback service, so routing inside the handler
//!   is the handler's business
//! - `TraceLayer` sits outside the supervisor for diagnostics spans; the
//!   access log is written by the supervisor itself

use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::supervisor::Supervisor;

/// HTTP server fronting a single supervised handler.
pub struct SupervisedServer {
    router: Router,
    supervisor: Supervisor,
}

impl SupervisedServer {
    pub fn new(supervisor: Supervisor) -> Self {
        let router = Self::build_router(&supervisor);
        Self { router, supervisor }
    }

    fn build_router(supervisor: &Supervisor) -> Router {
        Router::new()
            .fallback_service(supervisor.clone())
            .layer(TraceLayer::new_for_http())
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Run until Ctrl+C.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        self.run_until(listener, shutdown_signal()).await
    }

    /// Run until `shutdown` resolves, then wait for in-flight requests.
    pub async fn run_until<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

//! HTTP server bootstrap and background task lifecycle.

use tokio_util::sync::CancellationToken;

use crate::core::{Config, ServerState};
use crate::notifications::{OutboxDispatcher, StaleOrderSweep};
use crate::routes;
use crate::utils::AppError;

pub struct Server {
    config: Config,
    state: ServerState,
}

impl Server {
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self { config, state }
    }

    /// Run until ctrl-c: spawns the outbox dispatcher and the stale-order
    /// sweep, then serves the HTTP API. Background tasks stop through the
    /// shared cancellation token on shutdown.
    pub async fn run(self) -> Result<(), AppError> {
        let shutdown = CancellationToken::new();

        let dispatcher = OutboxDispatcher::new(self.state.clone(), shutdown.clone());
        tokio::spawn(dispatcher.run());

        let sweep = StaleOrderSweep::new(self.state.clone(), shutdown.clone());
        tokio::spawn(sweep.run());

        let app = routes::build_app(&self.state).with_state(self.state.clone());

        let addr = format!("0.0.0.0:{}", self.config.http_port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;
        tracing::info!("Comanda server listening on http://{addr}");

        let serve_shutdown = shutdown.clone();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Shutdown signal received");
                    }
                    _ = serve_shutdown.cancelled() => {}
                }
            })
            .await;

        shutdown.cancel();
        result.map_err(|e| AppError::internal(format!("Server error: {e}")))
    }
}

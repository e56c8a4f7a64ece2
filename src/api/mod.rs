//! HTTP API server for the Parkin gateway

pub mod health;
pub mod lamps;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::dispatch::Dispatcher;
use crate::fleet::FleetOps;
use crate::nodes::NodeRegistry;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<NodeRegistry>,
    pub dispatcher: Dispatcher,
    pub fleet: FleetOps,
}

impl ApiState {
    /// Build handler state around a dispatcher
    #[must_use]
    pub fn new(dispatcher: Dispatcher, bulk_concurrency: usize) -> Self {
        Self {
            registry: Arc::clone(dispatcher.registry()),
            fleet: FleetOps::new(dispatcher.clone(), bulk_concurrency),
            dispatcher,
        }
    }
}

/// Build the router with all routes
pub fn router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/lamp", lamps::router(state))
        .merge(health::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    addr: String,
}

impl ApiServer {
    /// Create a server for `state` listening on `addr` (e.g. `0.0.0.0:5000`)
    #[must_use]
    pub fn new(state: ApiState, addr: impl Into<String>) -> Self {
        Self {
            state: Arc::new(state),
            addr: addr.into(),
        }
    }

    /// Run the API server until `shutdown` flips to `true` or its sender is dropped
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let listener = TcpListener::bind(&self.addr)
            .await
            .map_err(|e| crate::Error::Server(format!("failed to bind {}: {e}", self.addr)))?;

        tracing::info!(addr = %self.addr, "API server listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async move {
                while shutdown.changed().await.is_ok() {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            })
            .await
            .map_err(|e| crate::Error::Server(format!("API server error: {e}")))?;

        tracing::info!("API server stopped");
        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}

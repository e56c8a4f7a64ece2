//! Daemon - the main gateway service
//!
//! Owns the node registry and wires the dispatcher, health monitor and HTTP
//! API around it. Everything stops together on a single shutdown signal.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;

use crate::api::{ApiServer, ApiState};
use crate::config::FleetConfig;
use crate::config::fleet::FleetFile;
use crate::dispatch::Dispatcher;
use crate::monitor::HealthMonitor;
use crate::nodes::NodeRegistry;
use crate::transport::{MeshTransport, MeshctlTransport};
use crate::{Config, Error, Result};

/// Build the registry from the fleet file, synthesizing the default fleet if absent
///
/// # Errors
///
/// Returns error if the fleet file exists but is unreadable or invalid
pub fn load_registry(fleet: &FleetConfig) -> Result<NodeRegistry> {
    let file = FleetFile::load_or_default(&fleet.path, fleet.default_size)?;
    NodeRegistry::from_fleet(&file, Utc::now())
}

/// Build the registry from the fleet file without writing anything to disk
///
/// The default fleet is synthesized in memory if the file is absent.
///
/// # Errors
///
/// Returns error if the fleet file exists but is unreadable or invalid
pub fn peek_registry(fleet: &FleetConfig) -> Result<NodeRegistry> {
    let file = FleetFile::load(&fleet.path)?
        .unwrap_or_else(|| FleetFile::default_fleet(fleet.default_size));
    NodeRegistry::from_fleet(&file, Utc::now())
}

/// Build the transport described by the configuration
#[must_use]
pub fn mesh_transport(config: &Config) -> MeshctlTransport {
    let transport = MeshctlTransport::new(&config.mesh.command);
    match transport.resolve() {
        Some(path) => tracing::debug!(path = %path.display(), "mesh command found"),
        None => tracing::warn!(
            command = %transport.program().display(),
            "mesh command not found, every dispatch will mark its node offline"
        ),
    }
    transport
}

/// The Parkin daemon
pub struct Daemon {
    config: Config,
    dispatcher: Dispatcher,
}

impl Daemon {
    /// Create a daemon using the configured `meshctl` transport
    ///
    /// # Errors
    ///
    /// Returns error if the fleet cannot be loaded
    pub fn new(config: Config) -> Result<Self> {
        let transport = Arc::new(mesh_transport(&config));
        Self::with_transport(config, transport)
    }

    /// Create a daemon with an explicit transport
    ///
    /// # Errors
    ///
    /// Returns error if the fleet cannot be loaded
    pub fn with_transport(config: Config, transport: Arc<dyn MeshTransport>) -> Result<Self> {
        let registry = Arc::new(load_registry(&config.fleet)?);
        tracing::info!(lamps = registry.len(), "fleet initialized");

        let dispatcher = Dispatcher::new(registry, transport, config.mesh.timeout);
        Ok(Self { config, dispatcher })
    }

    /// Registry of managed lamps
    #[must_use]
    pub const fn registry(&self) -> &Arc<NodeRegistry> {
        self.dispatcher.registry()
    }

    /// Run the daemon until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns error if the API server fails
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown requested");
        })
        .await
    }

    /// Run the daemon until `shutdown` completes
    ///
    /// # Errors
    ///
    /// Returns error if the API server fails
    pub async fn run_until(self, shutdown: impl Future<Output = ()> + Send) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let monitor = HealthMonitor::new(
            Arc::clone(self.dispatcher.registry()),
            self.config.health.stale_after,
            self.config.health.sweep_interval,
        );
        let monitor_handle = monitor.spawn(shutdown_rx.clone());

        let state = ApiState::new(self.dispatcher, self.config.fleet.bulk_concurrency);
        let mut api_handle = ApiServer::new(state, self.config.bind_addr()).spawn(shutdown_rx);

        let api_result = tokio::select! {
            () = shutdown => None,
            result = &mut api_handle => Some(result),
        };

        let _ = shutdown_tx.send(true);
        let api_result = match api_result {
            Some(result) => result,
            None => api_handle.await,
        };
        if let Err(e) = monitor_handle.await {
            tracing::warn!(error = %e, "health monitor task failed");
        }

        tracing::info!("daemon stopped");
        api_result.map_err(|e| Error::Server(format!("API server task failed: {e}")))?
    }
}

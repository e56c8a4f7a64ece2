//! Command dispatch
//!
//! Turns a color intent for one node into a mesh command and records the
//! outcome in the registry:
//!
//! | transport outcome | `color` / `last_updated` | `health`   |
//! |-------------------|--------------------------|------------|
//! | accepted          | updated                  | `online`   |
//! | rejected          | unchanged                | `degraded` |
//! | unavailable       | unchanged                | `offline`  |

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::nodes::{Color, Health, NodeId, NodeRegistry};
use crate::transport::{MeshCommand, MeshTransport, TransportError};

/// Why a dispatch failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// Node is not part of the fleet
    #[error("node not found: {0}")]
    NotFound(NodeId),

    /// Color is not one of the supported colors
    #[error("invalid color: {0:?}")]
    InvalidColor(String),

    /// The mesh rejected the command; the node is now degraded
    #[error("node {node_id} rejected command: {reason}")]
    TransportRejected { node_id: NodeId, reason: String },

    /// The command could not be delivered; the node is now offline
    #[error("node {node_id} unreachable: {reason}")]
    TransportUnavailable { node_id: NodeId, reason: String },
}

impl DispatchError {
    /// Whether the request was refused before reaching the transport
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::InvalidColor(_))
    }
}

/// Acknowledged color change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub node_id: NodeId,
    pub color: Color,
    pub updated_at: DateTime<Utc>,
}

/// Dispatches color commands and records their outcomes
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<NodeRegistry>,
    transport: Arc<dyn MeshTransport>,
    timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher over `registry`, bounding each command by `timeout`
    pub fn new(
        registry: Arc<NodeRegistry>,
        transport: Arc<dyn MeshTransport>,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            transport,
            timeout,
        }
    }

    /// Registry this dispatcher updates
    #[must_use]
    pub const fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Set a node to the color named by `color`
    ///
    /// The node and color are validated before anything is sent.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `InvalidColor` without side effects, or a
    /// transport error after recording the node's new health
    pub async fn dispatch(&self, node_id: NodeId, color: &str) -> Result<Ack, DispatchError> {
        if !self.registry.contains(node_id) {
            return Err(DispatchError::NotFound(node_id));
        }
        let color: Color = color
            .parse()
            .map_err(|_| DispatchError::InvalidColor(color.to_string()))?;
        self.send(node_id, color).await
    }

    /// Set a node to `color`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` without side effects, or a transport error after
    /// recording the node's new health
    pub async fn send(&self, node_id: NodeId, color: Color) -> Result<Ack, DispatchError> {
        if !self.registry.contains(node_id) {
            return Err(DispatchError::NotFound(node_id));
        }

        let command = MeshCommand::set_color(node_id, color.rgb());
        let outcome = tokio::time::timeout(
            self.timeout,
            self.transport.run_command(&command, self.timeout),
        )
        .await
        .unwrap_or_else(|_| {
            Err(TransportError::Unavailable(format!(
                "no response within {:?}",
                self.timeout
            )))
        });

        match outcome {
            Ok(()) => {
                let updated_at = self
                    .registry
                    .upsert(node_id, |state| {
                        state.acknowledge(color, Utc::now());
                        state.last_updated
                    })
                    .map_err(|_| DispatchError::NotFound(node_id))?;
                tracing::info!(node_id, %color, "color applied");
                Ok(Ack {
                    node_id,
                    color,
                    updated_at,
                })
            }
            Err(TransportError::Rejected(reason)) => {
                self.mark(node_id, Health::Degraded);
                tracing::warn!(node_id, %color, %reason, "mesh rejected command");
                Err(DispatchError::TransportRejected { node_id, reason })
            }
            Err(TransportError::Unavailable(reason)) => {
                self.mark(node_id, Health::Offline);
                tracing::warn!(node_id, %color, %reason, "mesh command failed");
                Err(DispatchError::TransportUnavailable { node_id, reason })
            }
        }
    }

    fn mark(&self, node_id: NodeId, health: Health) {
        // Membership was checked before sending and the identity set is fixed
        let _ = self.registry.upsert(node_id, |state| state.health = health);
    }
}

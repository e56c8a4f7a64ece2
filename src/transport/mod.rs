//! Mesh transport adapter
//!
//! The gateway never talks to the mesh directly. Every command goes through
//! a [`MeshTransport`], which runs it once within the caller's timeout and
//! reports whether the network accepted it. Transports hold no node state
//! and never retry.

pub mod meshctl;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::nodes::{NodeId, Rgb};

pub use meshctl::MeshctlTransport;

/// Kind of command sent to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    SetColor,
}

impl CommandKind {
    /// Vendor opcode understood by the lamp firmware
    #[must_use]
    pub const fn opcode(self) -> u8 {
        match self {
            Self::SetColor => 0x01,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetColor => f.write_str("set-color"),
        }
    }
}

/// A single command addressed to one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshCommand {
    pub node_id: NodeId,
    pub kind: CommandKind,
    pub rgb: Rgb,
}

impl MeshCommand {
    /// Command setting a node's RGB output
    #[must_use]
    pub const fn set_color(node_id: NodeId, rgb: Rgb) -> Self {
        Self {
            node_id,
            kind: CommandKind::SetColor,
            rgb,
        }
    }
}

/// Why a mesh command did not succeed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The command ran but the network rejected it
    #[error("command rejected: {0}")]
    Rejected(String),

    /// The command could not be run to completion (timeout, launch failure, crash)
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Executes mesh commands
#[async_trait]
pub trait MeshTransport: Send + Sync {
    /// Run `command` once, giving up after `timeout`
    ///
    /// # Errors
    ///
    /// Returns `Rejected` for a non-zero exit and `Unavailable` for anything
    /// that prevented the command from completing
    async fn run_command(
        &self,
        command: &MeshCommand,
        timeout: Duration,
    ) -> Result<(), TransportError>;
}

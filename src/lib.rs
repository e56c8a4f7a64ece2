//! Parkin Gateway - control gateway for Bluetooth mesh lamp fleets
//!
//! This library provides the core functionality for the Parkin gateway:
//! - Node registry holding the last known state of every lamp
//! - Command dispatch to the mesh with health tracking
//! - Staleness-based health monitoring
//! - Bulk and reset operations over the fleet
//! - HTTP API for lamp control
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     HTTP API                         │
//! │   update  │  bulk  │  reset  │  status  │  health   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │  Fleet Ops ─► Dispatcher ─► Node Registry ◄─ Monitor │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │           Mesh Transport (meshctl)                   │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod error;
pub mod fleet;
pub mod monitor;
pub mod nodes;
pub mod transport;

pub use config::Config;
pub use daemon::Daemon;
pub use dispatch::{Ack, DispatchError, Dispatcher};
pub use error::{Error, Result};
pub use fleet::{BulkOutcome, BulkStatus, BulkUpdate, FleetOps, ResetReport};
pub use monitor::HealthMonitor;
pub use nodes::{Color, Health, HealthSummary, NodeId, NodeRegistry, NodeState};
pub use transport::{MeshCommand, MeshTransport, MeshctlTransport, TransportError};

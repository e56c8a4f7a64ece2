//! Lamp node registry
//!
//! Every managed lamp has exactly one [`NodeState`], owned by the
//! [`NodeRegistry`] and mutated only through its per-node `upsert`

pub mod registry;
pub mod types;

pub use registry::NodeRegistry;
pub use types::{Color, Health, HealthSummary, NodeId, NodeState, Rgb, UnknownColor};

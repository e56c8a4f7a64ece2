//! Error types for the Parkin gateway

use thiserror::Error;

use crate::dispatch::DispatchError;
use crate::nodes::NodeId;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Parkin gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Fleet file is present but describes an unusable fleet
    #[error("fleet file error: {0}")]
    Fleet(String),

    /// Node is not part of the managed fleet
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// Command dispatch failed
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// HTTP server error
    #[error("server error: {0}")]
    Server(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

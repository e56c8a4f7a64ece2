//! Shared test utilities

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parkin_gateway::api::ApiState;
use parkin_gateway::{
    Dispatcher, MeshCommand, MeshTransport, NodeId, NodeRegistry, TransportError,
};

/// How the fake mesh answers commands for a node
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Accept,
    Reject,
    Unreachable,
}

/// In-memory mesh transport with per-node replies, accepting by default
#[derive(Default)]
pub struct FakeMesh {
    replies: Mutex<HashMap<NodeId, Reply>>,
    calls: AtomicUsize,
    sent: Mutex<Vec<MeshCommand>>,
}

impl FakeMesh {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, node_id: NodeId, reply: Reply) {
        self.replies.lock().unwrap().insert(node_id, reply);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<MeshCommand> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MeshTransport for FakeMesh {
    async fn run_command(
        &self,
        command: &MeshCommand,
        _timeout: Duration,
    ) -> Result<(), TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(*command);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(&command.node_id)
            .copied()
            .unwrap_or(Reply::Accept);
        match reply {
            Reply::Accept => Ok(()),
            Reply::Reject => Err(TransportError::Rejected("exit code 1".to_string())),
            Reply::Unreachable => Err(TransportError::Unavailable("timed out".to_string())),
        }
    }
}

/// Default fleet of `size` lamps behind a fake mesh
pub fn setup_fleet(size: u32) -> (Arc<NodeRegistry>, Arc<FakeMesh>, Dispatcher) {
    let registry = Arc::new(NodeRegistry::with_default_fleet(size, Utc::now()));
    let mesh = FakeMesh::new();
    let dispatcher = Dispatcher::new(Arc::clone(&registry), mesh.clone(), Duration::from_secs(5));
    (registry, mesh, dispatcher)
}

/// API router over a default fleet of `size` lamps
pub fn setup_api(size: u32) -> (axum::Router, Arc<NodeRegistry>, Arc<FakeMesh>) {
    let (registry, mesh, dispatcher) = setup_fleet(size);
    let state = Arc::new(ApiState::new(dispatcher, 1));
    (parkin_gateway::api::router(state), registry, mesh)
}

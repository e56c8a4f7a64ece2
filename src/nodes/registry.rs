//! Node registry holding the last known state of every lamp

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use super::types::{HealthSummary, NodeId, NodeState};
use crate::config::fleet::FleetFile;
use crate::{Error, Result};

/// One managed lamp: opaque slot addresses plus its guarded state
#[derive(Debug)]
struct NodeEntry {
    slots: Vec<u32>,
    state: Mutex<NodeState>,
}

impl NodeEntry {
    fn lock(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registry of managed lamp nodes
///
/// The identity set is fixed at construction. Each node has its own lock,
/// so updates to different nodes never contend and every update to the
/// same node is a single read-modify-write.
#[derive(Debug)]
pub struct NodeRegistry {
    nodes: BTreeMap<NodeId, NodeEntry>,
}

impl NodeRegistry {
    /// Build a registry from a fleet description, all nodes green and online
    ///
    /// # Errors
    ///
    /// Returns error if a node ID is zero or appears more than once
    pub fn from_fleet(fleet: &FleetFile, now: DateTime<Utc>) -> Result<Self> {
        let mut nodes = BTreeMap::new();
        for lamp in &fleet.lamps {
            if lamp.node_id == 0 {
                return Err(Error::Fleet("node_id 0 is not a valid mesh address".to_string()));
            }
            let entry = NodeEntry {
                slots: lamp.slots.clone(),
                state: Mutex::new(NodeState::initial(lamp.node_id, now)),
            };
            if nodes.insert(lamp.node_id, entry).is_some() {
                return Err(Error::Fleet(format!("duplicate node_id {}", lamp.node_id)));
            }
        }
        Ok(Self { nodes })
    }

    /// Build the default fleet of `size` nodes numbered from 1
    #[must_use]
    pub fn with_default_fleet(size: u32, now: DateTime<Utc>) -> Self {
        let nodes = (1..=size)
            .map(|id| {
                let entry = NodeEntry {
                    slots: FleetFile::default_slots(id),
                    state: Mutex::new(NodeState::initial(id, now)),
                };
                (id, entry)
            })
            .collect();
        Self { nodes }
    }

    /// Current state of a node
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` if the node is not managed
    pub fn get(&self, id: NodeId) -> Result<NodeState> {
        self.entry(id).map(|e| e.lock().clone())
    }

    /// Apply `mutator` to one node's state while holding that node's lock
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` if the node is not managed; `mutator` is not called
    pub fn upsert<R>(&self, id: NodeId, mutator: impl FnOnce(&mut NodeState) -> R) -> Result<R> {
        let entry = self.entry(id)?;
        let mut state = entry.lock();
        Ok(mutator(&mut *state))
    }

    /// Copy of every node's state, ordered by node ID
    #[must_use]
    pub fn snapshot_all(&self) -> Vec<NodeState> {
        self.nodes.values().map(|e| e.lock().clone()).collect()
    }

    /// Slot addresses configured for a node
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` if the node is not managed
    pub fn slots(&self, id: NodeId) -> Result<&[u32]> {
        self.entry(id).map(|e| e.slots.as_slice())
    }

    /// All managed node IDs in ascending order
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Whether the node is managed
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Count nodes per health category
    #[must_use]
    pub fn summary(&self) -> HealthSummary {
        let mut summary = HealthSummary::default();
        for entry in self.nodes.values() {
            summary.record(entry.lock().health);
        }
        summary
    }

    /// Number of managed nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn entry(&self, id: NodeId) -> Result<&NodeEntry> {
        self.nodes.get(&id).ok_or(Error::NodeNotFound(id))
    }
}

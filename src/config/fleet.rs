//! Fleet file loading
//!
//! The fleet file (`lamp_config.json` by default) lists the managed node IDs
//! and the light slot addresses wired to each node:
//!
//! ```json
//! { "lamps": [ { "node_id": 1, "slots": [1, 2, 3, 4, 5, 6] } ] }
//! ```
//!
//! When the file is absent a default fleet is synthesized and written back.

use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::nodes::NodeId;
use crate::{Error, Result};

/// Number of light slots wired to each node in the default layout
pub const SLOTS_PER_NODE: u32 = 6;

/// Fleet file schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetFile {
    pub lamps: Vec<LampEntry>,
}

/// One lamp in the fleet file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LampEntry {
    pub node_id: NodeId,
    #[serde(default)]
    pub slots: Vec<u32>,
}

impl FleetFile {
    /// Fleet of `size` nodes numbered from 1 with the default slot layout
    #[must_use]
    pub fn default_fleet(size: u32) -> Self {
        Self {
            lamps: (1..=size)
                .map(|node_id| LampEntry {
                    node_id,
                    slots: Self::default_slots(node_id),
                })
                .collect(),
        }
    }

    /// Default slot addresses for a node: `(id-1)*6+1 ..= id*6`
    #[must_use]
    pub fn default_slots(node_id: NodeId) -> Vec<u32> {
        let last = node_id.saturating_mul(SLOTS_PER_NODE);
        let first = last.saturating_sub(SLOTS_PER_NODE - 1);
        (first..=last).collect()
    }

    /// Read a fleet file, returning `None` if it does not exist
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let fleet: Self = serde_json::from_str(&content).map_err(|e| {
            Error::Fleet(format!("failed to parse {}: {e}", path.display()))
        })?;
        tracing::info!(path = %path.display(), lamps = fleet.lamps.len(), "loaded fleet file");
        Ok(Some(fleet))
    }

    /// Read a fleet file, or synthesize the default fleet and try to save it
    ///
    /// A failed save is logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load_or_default(path: &Path, default_size: u32) -> Result<Self> {
        if let Some(fleet) = Self::load(path)? {
            return Ok(fleet);
        }

        tracing::info!(
            path = %path.display(),
            size = default_size,
            "fleet file not found, using default fleet"
        );
        let fleet = Self::default_fleet(default_size);
        if let Err(e) = fleet.save(path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to write default fleet file");
        }
        Ok(fleet)
    }

    /// Write the fleet file as pretty-printed JSON
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::debug!(path = %path.display(), lamps = self.lamps.len(), "wrote fleet file");
        Ok(())
    }
}

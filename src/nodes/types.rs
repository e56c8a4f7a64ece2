//! Lamp node types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Mesh address of a lamp node, assigned at provisioning time
pub type NodeId = u32;

/// Colors a lamp can be commanded to show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Green,
    Purple,
}

impl Color {
    /// All supported colors
    pub const ALL: [Self; 3] = [Self::Red, Self::Green, Self::Purple];

    /// RGB parameters sent over the mesh for this color
    #[must_use]
    pub const fn rgb(self) -> Rgb {
        match self {
            Self::Red => Rgb::new(255, 0, 0),
            Self::Green => Rgb::new(0, 255, 0),
            Self::Purple => Rgb::new(128, 0, 128),
        }
    }

    /// Lowercase name, as used on the wire
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Purple => "purple",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when text does not name a supported color
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported color: {0}")]
pub struct UnknownColor(pub String);

impl FromStr for Color {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownColor(s.to_string()))
    }
}

/// 8-bit RGB triple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Liveness classification derived from command outcomes and staleness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Online,
    Degraded,
    Offline,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Online => "online",
            Self::Degraded => "degraded",
            Self::Offline => "offline",
        })
    }
}

/// Last known state of a lamp node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeState {
    pub node_id: NodeId,
    pub color: Color,
    pub last_updated: DateTime<Utc>,
    pub health: Health,
}

impl NodeState {
    /// Fresh state for a node joining the fleet: green and online
    #[must_use]
    pub const fn initial(node_id: NodeId, now: DateTime<Utc>) -> Self {
        Self {
            node_id,
            color: Color::Green,
            last_updated: now,
            health: Health::Online,
        }
    }

    /// Record an acknowledged color change
    ///
    /// `last_updated` always moves forward, even when `now` does not
    pub fn acknowledge(&mut self, color: Color, now: DateTime<Utc>) {
        let floor = self.last_updated + TimeDelta::nanoseconds(1);
        self.color = color;
        self.last_updated = now.max(floor);
        self.health = Health::Online;
    }

    /// Whether the last acknowledgment is older than `threshold` at `now`
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: TimeDelta) -> bool {
        now - self.last_updated > threshold
    }
}

/// Per-category node counts for the fleet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthSummary {
    pub total: usize,
    pub online: usize,
    pub degraded: usize,
    pub offline: usize,
}

impl HealthSummary {
    /// Count one node in its health category
    pub const fn record(&mut self, health: Health) {
        self.total += 1;
        match health {
            Health::Online => self.online += 1,
            Health::Degraded => self.degraded += 1,
            Health::Offline => self.offline += 1,
        }
    }
}

//! Staleness-based health monitor
//!
//! Periodically forces nodes whose last acknowledged command is too old to
//! `offline`. The monitor only ever demotes: a node returns to `online`
//! solely through a successful dispatch.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::nodes::{Health, NodeRegistry};

/// Shortest cadence the periodic sweep will run at
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Background sweeper demoting stale nodes
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    registry: Arc<NodeRegistry>,
    stale_after: TimeDelta,
    interval: Duration,
}

impl HealthMonitor {
    /// Create a monitor sweeping every `interval` for nodes idle longer than `stale_after`
    ///
    /// `interval` is raised to [`MIN_SWEEP_INTERVAL`] if shorter.
    #[must_use]
    pub fn new(registry: Arc<NodeRegistry>, stale_after: Duration, interval: Duration) -> Self {
        Self {
            registry,
            stale_after: TimeDelta::from_std(stale_after).unwrap_or(TimeDelta::MAX),
            interval: interval.max(MIN_SWEEP_INTERVAL),
        }
    }

    /// Sweep once using the current time
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    /// Sweep once as if the time were `now`, returning how many nodes went offline
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let ids: Vec<_> = self.registry.ids().collect();
        let mut demoted = 0;

        for node_id in ids {
            let changed = self
                .registry
                .upsert(node_id, |state| {
                    if state.is_stale(now, self.stale_after) && state.health != Health::Offline {
                        state.health = Health::Offline;
                        true
                    } else {
                        false
                    }
                })
                .unwrap_or(false);

            if changed {
                tracing::info!(node_id, "node stale, marked offline");
                demoted += 1;
            }
        }

        if demoted > 0 {
            tracing::debug!(demoted, "health sweep finished");
        }
        demoted
    }

    /// Run sweeps on a fixed cadence until `shutdown` flips to `true` or its sender is dropped
    ///
    /// The first sweep happens one interval after the task starts.
    #[must_use]
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                interval_secs = self.interval.as_secs(),
                stale_after_secs = self.stale_after.num_seconds(),
                "health monitor started"
            );

            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // Skip the first immediate tick
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.sweep();
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("health monitor stopped");
        })
    }
}

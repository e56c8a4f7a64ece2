//! Fleet-wide operations built on single-node dispatch

use futures::StreamExt;
use serde::Serialize;

use crate::dispatch::Dispatcher;
use crate::nodes::{Color, NodeId};

/// One requested change in a bulk update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkUpdate {
    pub node_id: NodeId,
    pub color: String,
}

impl BulkUpdate {
    pub fn new(node_id: NodeId, color: impl Into<String>) -> Self {
        Self {
            node_id,
            color: color.into(),
        }
    }
}

/// Whether a dispatched bulk item was acknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkStatus {
    Success,
    Failed,
}

/// Outcome of one dispatched bulk item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub node_id: NodeId,
    pub status: BulkStatus,
    pub color: Color,
}

/// Summary of a reset-all run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Bulk and reset operations over the whole fleet
#[derive(Clone)]
pub struct FleetOps {
    dispatcher: Dispatcher,
    concurrency: usize,
}

impl FleetOps {
    /// Create fleet operations keeping at most `concurrency` dispatches in flight
    ///
    /// A concurrency of 1 dispatches strictly one node after another.
    #[must_use]
    pub fn new(dispatcher: Dispatcher, concurrency: usize) -> Self {
        Self {
            dispatcher,
            concurrency: concurrency.max(1),
        }
    }

    /// Dispatch every valid update, returning outcomes in input order
    ///
    /// Updates naming an unknown node or an unsupported color are skipped and
    /// do not appear in the result. A failed item never undoes earlier ones.
    pub async fn bulk_update(&self, updates: Vec<BulkUpdate>) -> Vec<BulkOutcome> {
        let registry = self.dispatcher.registry();
        let valid: Vec<(NodeId, Color)> = updates
            .into_iter()
            .filter_map(|update| {
                if !registry.contains(update.node_id) {
                    tracing::debug!(node_id = update.node_id, "bulk item skipped: unknown node");
                    return None;
                }
                match update.color.parse::<Color>() {
                    Ok(color) => Some((update.node_id, color)),
                    Err(e) => {
                        tracing::debug!(node_id = update.node_id, error = %e, "bulk item skipped");
                        None
                    }
                }
            })
            .collect();

        let dispatcher = &self.dispatcher;
        let outcomes: Vec<BulkOutcome> = futures::stream::iter(valid)
            .map(move |(node_id, color)| async move {
                let status = match dispatcher.send(node_id, color).await {
                    Ok(_) => BulkStatus::Success,
                    Err(_) => BulkStatus::Failed,
                };
                BulkOutcome {
                    node_id,
                    status,
                    color,
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        tracing::info!(
            dispatched = outcomes.len(),
            failed = outcomes.iter().filter(|o| o.status == BulkStatus::Failed).count(),
            "bulk update finished"
        );
        outcomes
    }

    /// Set every node in the fleet to green, best effort
    pub async fn reset_all(&self) -> ResetReport {
        let ids: Vec<NodeId> = self.dispatcher.registry().ids().collect();
        let dispatcher = &self.dispatcher;

        let report = futures::stream::iter(ids)
            .map(move |node_id| async move { dispatcher.send(node_id, Color::Green).await.is_ok() })
            .buffer_unordered(self.concurrency)
            .fold(ResetReport::default(), |mut report, ok| async move {
                report.attempted += 1;
                if ok {
                    report.succeeded += 1;
                } else {
                    report.failed += 1;
                }
                report
            })
            .await;

        tracing::info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            "fleet reset finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::nodes::{Health, NodeRegistry};
    use crate::transport::{MeshCommand, MeshTransport, TransportError};

    /// Accepts every command except those for `rejecting` nodes, recording order
    #[derive(Default)]
    struct RecordingTransport {
        rejecting: HashSet<NodeId>,
        sent: Mutex<Vec<NodeId>>,
    }

    #[async_trait]
    impl MeshTransport for RecordingTransport {
        async fn run_command(
            &self,
            command: &MeshCommand,
            _timeout: Duration,
        ) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(command.node_id);
            if self.rejecting.contains(&command.node_id) {
                Err(TransportError::Rejected("exit code 1".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn ops(
        size: u32,
        rejecting: &[NodeId],
        concurrency: usize,
    ) -> (FleetOps, Arc<NodeRegistry>, Arc<RecordingTransport>) {
        let registry = Arc::new(NodeRegistry::with_default_fleet(size, Utc::now()));
        let transport = Arc::new(RecordingTransport {
            rejecting: rejecting.iter().copied().collect(),
            ..RecordingTransport::default()
        });
        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            transport.clone(),
            Duration::from_secs(1),
        );
        (FleetOps::new(dispatcher, concurrency), registry, transport)
    }

    #[tokio::test]
    async fn invalid_items_are_dropped() {
        let (ops, registry, transport) = ops(100, &[], 1);

        let outcomes = ops
            .bulk_update(vec![BulkUpdate::new(1, "red"), BulkUpdate::new(9999, "blue")])
            .await;

        assert_eq!(
            outcomes,
            vec![BulkOutcome {
                node_id: 1,
                status: BulkStatus::Success,
                color: Color::Red,
            }]
        );
        assert_eq!(registry.get(1).unwrap().color, Color::Red);
        assert_eq!(*transport.sent.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn known_node_with_bad_color_is_dropped() {
        let (ops, _registry, transport) = ops(5, &[], 1);

        let outcomes = ops
            .bulk_update(vec![BulkUpdate::new(2, "orange"), BulkUpdate::new(3, "GREEN")])
            .await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].node_id, 3);
        assert_eq!(outcomes[0].color, Color::Green);
        assert_eq!(*transport.sent.lock().unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn partial_failure_keeps_successes() {
        let (ops, registry, _transport) = ops(5, &[2], 1);

        let outcomes = ops
            .bulk_update(vec![
                BulkUpdate::new(1, "purple"),
                BulkUpdate::new(2, "purple"),
                BulkUpdate::new(3, "purple"),
            ])
            .await;

        let statuses: Vec<BulkStatus> = outcomes.iter().map(|o| o.status).collect();
        assert_eq!(
            statuses,
            vec![BulkStatus::Success, BulkStatus::Failed, BulkStatus::Success]
        );
        assert_eq!(registry.get(1).unwrap().color, Color::Purple);
        assert_eq!(registry.get(2).unwrap().color, Color::Green);
        assert_eq!(registry.get(2).unwrap().health, Health::Degraded);
        assert_eq!(registry.get(3).unwrap().color, Color::Purple);
    }

    #[tokio::test]
    async fn sequential_bulk_preserves_dispatch_order() {
        let (ops, _registry, transport) = ops(10, &[], 1);
        let order = [7, 3, 9, 1];

        let outcomes = ops
            .bulk_update(order.iter().map(|&id| BulkUpdate::new(id, "red")).collect())
            .await;

        let result_ids: Vec<NodeId> = outcomes.iter().map(|o| o.node_id).collect();
        assert_eq!(result_ids, order);
        assert_eq!(*transport.sent.lock().unwrap(), order);
    }

    #[tokio::test]
    async fn parallel_bulk_keeps_result_order() {
        let (ops, _registry, _transport) = ops(50, &[], 8);
        let ids: Vec<NodeId> = (1..=50).rev().collect();

        let outcomes = ops
            .bulk_update(ids.iter().map(|&id| BulkUpdate::new(id, "purple")).collect())
            .await;

        let result_ids: Vec<NodeId> = outcomes.iter().map(|o| o.node_id).collect();
        assert_eq!(result_ids, ids);
    }

    #[tokio::test]
    async fn reset_turns_every_node_green() {
        let (ops, registry, _transport) = ops(3, &[], 1);
        registry.upsert(1, |s| s.acknowledge(Color::Red, Utc::now())).unwrap();
        registry.upsert(2, |s| s.acknowledge(Color::Purple, Utc::now())).unwrap();

        let report = ops.reset_all().await;

        assert_eq!(
            report,
            ResetReport {
                attempted: 3,
                succeeded: 3,
                failed: 0,
            }
        );
        for state in registry.snapshot_all() {
            assert_eq!(state.color, Color::Green);
            assert_eq!(state.health, Health::Online);
        }
    }

    #[tokio::test]
    async fn reset_attempts_every_node_despite_failures() {
        let (ops, _registry, transport) = ops(4, &[1, 3], 2);

        let report = ops.reset_all().await;

        assert_eq!(report.attempted, 4);
        assert_eq!(report.failed, 2);
        let mut sent = transport.sent.lock().unwrap().clone();
        sent.sort_unstable();
        assert_eq!(sent, vec![1, 2, 3, 4]);
    }
}

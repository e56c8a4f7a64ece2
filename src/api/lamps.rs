//! Lamp control endpoints
//!
//! - `POST /api/lamp/{node_id}` set one lamp's color
//! - `GET  /api/lamp/{node_id}` last known state of one lamp
//! - `POST /api/lamp/bulk` set many lamps, reporting per-item outcomes
//! - `POST /api/lamp/reset` set every lamp to green
//! - `GET  /api/lamp/health` fleet health counts

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use serde_json::Value;

use super::ApiState;
use crate::dispatch::DispatchError;
use crate::fleet::{BulkOutcome, BulkUpdate};
use crate::nodes::{Color, Health, NodeId};

/// Generic status/message reply
#[derive(Debug, Serialize)]
pub struct StatusMessage {
    pub status: &'static str,
    pub message: String,
}

type ApiError = (StatusCode, Json<StatusMessage>);

fn error(code: StatusCode, message: impl Into<String>) -> ApiError {
    (
        code,
        Json(StatusMessage {
            status: "error",
            message: message.into(),
        }),
    )
}

fn invalid_node() -> ApiError {
    error(StatusCode::NOT_FOUND, "Invalid node ID")
}

/// Successful single-lamp update
#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub status: &'static str,
    pub node_id: NodeId,
    pub color: Color,
}

/// Bulk update reply
#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub status: &'static str,
    pub results: Vec<BulkOutcome>,
}

/// Last known state of one lamp
#[derive(Debug, Serialize)]
pub struct LampStatusResponse {
    pub node_id: NodeId,
    pub color: Color,
    pub last_updated: String,
    pub health: Health,
    pub slots: Vec<u32>,
}

/// Fleet health counts
#[derive(Debug, Serialize)]
pub struct FleetHealthResponse {
    pub total_lamps: usize,
    pub online: usize,
    pub offline: usize,
    pub degraded: usize,
}

/// Build lamp routes
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/bulk", post(bulk_update))
        .route("/reset", post(reset_all))
        .route("/health", get(fleet_health))
        .route("/{node_id}", get(get_lamp).post(update_lamp))
        .with_state(state)
}

/// Resolve a path segment to a managed node
///
/// Only plain decimal digits name a node; signs and whitespace do not.
fn managed_node(state: &ApiState, raw: &str) -> Result<NodeId, ApiError> {
    Some(raw)
        .filter(|r| !r.is_empty() && r.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|r| r.parse::<NodeId>().ok())
        .filter(|id| state.registry.contains(*id))
        .ok_or_else(invalid_node)
}

/// Set a single lamp's color
async fn update_lamp(
    State(state): State<Arc<ApiState>>,
    Path(node_id): Path<String>,
    body: Bytes,
) -> Result<Json<UpdateResponse>, ApiError> {
    let node_id = managed_node(&state, &node_id)?;

    let payload: Option<Value> = serde_json::from_slice(&body).ok();
    let Some(color) = payload
        .as_ref()
        .and_then(|v| v.get("color"))
        .and_then(Value::as_str)
    else {
        return Err(error(StatusCode::BAD_REQUEST, "Missing color parameter"));
    };

    let color: Color = color
        .parse()
        .map_err(|_| error(StatusCode::BAD_REQUEST, "Invalid color"))?;

    match state.dispatcher.send(node_id, color).await {
        Ok(ack) => Ok(Json(UpdateResponse {
            status: "success",
            node_id: ack.node_id,
            color: ack.color,
        })),
        Err(DispatchError::NotFound(_)) => Err(invalid_node()),
        Err(e) => {
            tracing::debug!(node_id, error = %e, "lamp update failed");
            Err(error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update lamp"))
        }
    }
}

/// Extract a bulk item, or `None` if it is malformed
fn parse_bulk_item(item: &Value) -> Option<BulkUpdate> {
    let node_id = item
        .get("node_id")
        .and_then(Value::as_u64)
        .and_then(|id| NodeId::try_from(id).ok())?;
    let color = item.get("color").and_then(Value::as_str)?;
    Some(BulkUpdate::new(node_id, color))
}

/// Set many lamps at once
async fn bulk_update(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<BulkResponse>, ApiError> {
    let payload: Option<Value> = serde_json::from_slice(&body).ok();
    let Some(items) = payload
        .as_ref()
        .and_then(|v| v.get("updates"))
        .and_then(Value::as_array)
    else {
        return Err(error(StatusCode::BAD_REQUEST, "Missing updates"));
    };

    let updates: Vec<BulkUpdate> = items.iter().filter_map(parse_bulk_item).collect();
    let results = state.fleet.bulk_update(updates).await;

    Ok(Json(BulkResponse {
        status: "completed",
        results,
    }))
}

/// Reset every lamp to green
async fn reset_all(State(state): State<Arc<ApiState>>) -> Json<StatusMessage> {
    state.fleet.reset_all().await;
    Json(StatusMessage {
        status: "success",
        message: "All lamps reset to green".to_string(),
    })
}

/// Get one lamp's last known state
async fn get_lamp(
    State(state): State<Arc<ApiState>>,
    Path(node_id): Path<String>,
) -> Result<Json<LampStatusResponse>, ApiError> {
    let node_id = managed_node(&state, &node_id)?;
    let lamp = state.registry.get(node_id).map_err(|_| invalid_node())?;
    let slots = state
        .registry
        .slots(node_id)
        .map(<[u32]>::to_vec)
        .unwrap_or_default();

    Ok(Json(LampStatusResponse {
        node_id: lamp.node_id,
        color: lamp.color,
        last_updated: lamp.last_updated.to_rfc3339(),
        health: lamp.health,
        slots,
    }))
}

/// Count lamps per health category
async fn fleet_health(State(state): State<Arc<ApiState>>) -> Json<FleetHealthResponse> {
    let summary = state.registry.summary();
    Json(FleetHealthResponse {
        total_lamps: summary.total,
        online: summary.online,
        offline: summary.offline,
        degraded: summary.degraded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_item_requires_numeric_id_and_string_color() {
        let ok = serde_json::json!({"node_id": 4, "color": "Red"});
        assert_eq!(parse_bulk_item(&ok), Some(BulkUpdate::new(4, "Red")));

        for bad in [
            serde_json::json!({"color": "red"}),
            serde_json::json!({"node_id": 4}),
            serde_json::json!({"node_id": "4", "color": "red"}),
            serde_json::json!({"node_id": -1, "color": "red"}),
            serde_json::json!({"node_id": 4, "color": 7}),
            serde_json::json!({"node_id": 5_000_000_000_u64, "color": "red"}),
            serde_json::json!("red"),
        ] {
            assert_eq!(parse_bulk_item(&bad), None, "{bad} should be dropped");
        }
    }
}

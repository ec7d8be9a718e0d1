//! Alert endpoints.
//!
//! - `GET /alerts?limit=&sensorId=`
//! - `PUT /alerts/{alert_id}/acknowledge`
//! - `DELETE /alerts/{alert_id}`
//!
//! The acknowledge and delete bodies are optional; an unreadable body is
//! treated as absent and the actor defaults to `system`.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::{delete, get, put},
    Router,
};
use serde::Deserialize;
use tracing::info;

use super::params::{parse_limit, validate_id};
use super::response::{ok, parse_optional_body, ApiError, ApiResponse};
use super::{preflight, AppState};
use crate::models::{AcknowledgeRequest, Alert};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlertsQuery {
    limit: Option<String>,
    sensor_id: Option<String>,
}

// ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/alerts", get(list_alerts).options(preflight))
        .route(
            "/alerts/{alert_id}",
            delete(delete_alert).options(preflight),
        )
        .route(
            "/alerts/{alert_id}/acknowledge",
            put(acknowledge_alert).options(preflight),
        )
}

async fn list_alerts(
    State(state): State<AppState>,
    Query(params): Query<AlertsQuery>,
) -> Result<ApiResponse<Vec<Alert>>, ApiError> {
    // ---
    info!("GET /alerts");
    let limit = parse_limit(params.limit.as_deref())?;

    let alerts = match params.sensor_id.as_deref() {
        Some(sensor_id) => {
            validate_id("sensorId", sensor_id)?;
            state.repo.list_alerts_by_sensor(sensor_id, limit).await
        }
        None => state.repo.list_alerts(limit).await,
    }
    .map_err(|e| state.fail(e, "Failed to retrieve alerts"))?;

    let message = format!("Retrieved {} alerts", alerts.len());
    Ok(ok(alerts, message))
}

async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
    body: Bytes,
) -> Result<ApiResponse<Alert>, ApiError> {
    // ---
    info!("PUT /alerts/{}/acknowledge", alert_id);
    validate_id("alertId", &alert_id)?;
    let req: AcknowledgeRequest = parse_optional_body(&body);

    let alert = state
        .repo
        .acknowledge_alert(&alert_id, req.acknowledged_by.as_deref())
        .await
        .map_err(|e| state.fail(e, "Failed to acknowledge alert"))?;
    Ok(ok(alert, "Alert acknowledged successfully"))
}

async fn delete_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
    body: Bytes,
) -> Result<ApiResponse<()>, ApiError> {
    // ---
    info!("DELETE /alerts/{}", alert_id);
    validate_id("alertId", &alert_id)?;
    let req: AcknowledgeRequest = parse_optional_body(&body);

    state
        .repo
        .delete_alert(&alert_id, req.acknowledged_by.as_deref())
        .await
        .map_err(|e| state.fail(e, "Failed to delete alert"))?;
    Ok(ok((), "Alert deleted successfully"))
}

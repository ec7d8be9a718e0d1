//! Reading endpoints.
//!
//! - `GET /sensors/{sensor_id}/data?timeRange=` readings inside a window
//! - `POST /sensors/{sensor_id}/data` submit a reading (raises alerts)
//! - `GET /sensors/data/latest` newest reading of every sensor

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::get,
    Router,
};
use futures::future::try_join_all;
use serde::Deserialize;
use tracing::{info, warn};

use super::params::{validate_battery, validate_id, validate_value};
use super::response::{ok, parse_body, ApiError, ApiResponse};
use super::{preflight, AppState};
use crate::ingest::{submit_reading, ReadingDraft};
use crate::models::{
    SensorReading, SensorSeries, SensorStatus, SubmitSensorDataRequest, TimeRange,
};

/// Battery level assumed when a submission omits it.
pub const DEFAULT_BATTERY_LEVEL: f64 = 100.0;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RangeQuery {
    pub time_range: Option<String>,
}

// ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/sensors/{sensor_id}/data",
            get(query_readings).post(submit).options(preflight),
        )
        .route(
            "/sensors/data/latest",
            get(latest_readings).options(preflight),
        )
}

async fn query_readings(
    State(state): State<AppState>,
    Path(sensor_id): Path<String>,
    Query(params): Query<RangeQuery>,
) -> Result<ApiResponse<SensorSeries>, ApiError> {
    // ---
    info!("GET /sensors/{}/data", sensor_id);
    validate_id("sensorId", &sensor_id)?;
    let range = TimeRange::parse_or_default(params.time_range.as_deref());

    let data = state
        .repo
        .query_sensor_readings(&sensor_id, range)
        .await
        .map_err(|e| state.fail(e, "Failed to retrieve sensor data"))?;
    let message = format!("Retrieved {} data points", data.len());
    Ok(ok(
        SensorSeries {
            sensor_id,
            sensor_name: None,
            sensor_type: None,
            location: None,
            data,
            time_range: range,
        },
        message,
    ))
}

async fn submit(
    State(state): State<AppState>,
    Path(sensor_id): Path<String>,
    body: Bytes,
) -> Result<ApiResponse<SensorReading>, ApiError> {
    // ---
    info!("POST /sensors/{}/data", sensor_id);
    validate_id("sensorId", &sensor_id)?;
    let req: SubmitSensorDataRequest = parse_body(&body)?;

    if let Some(body_id) = req.sensor_id.as_deref() {
        if body_id != sensor_id {
            return Err(ApiError::invalid_parameter(
                "sensorId",
                "body sensorId does not match the path",
            ));
        }
    }

    let unit = req.unit.filter(|u| !u.trim().is_empty());
    let (value, unit) = match (req.value, unit) {
        (Some(value), Some(unit)) => (value, unit),
        (value, unit) => {
            let mut absent = Vec::new();
            if value.is_none() {
                absent.push("value");
            }
            if unit.is_none() {
                absent.push("unit");
            }
            return Err(ApiError::missing_fields(&absent));
        }
    };

    let draft = ReadingDraft {
        value: validate_value(value)?,
        unit,
        battery_level: validate_battery(req.battery_level.unwrap_or(DEFAULT_BATTERY_LEVEL))?,
        status: match req.status.as_deref() {
            Some(raw) => raw
                .parse::<SensorStatus>()
                .map_err(|e| ApiError::invalid_parameter("status", e))?,
            None => SensorStatus::default(),
        },
    };

    let config = state
        .repo
        .get_sensor_config(&sensor_id)
        .await
        .map_err(|e| state.fail(e, "Failed to submit sensor data"))?
        .ok_or_else(|| ApiError::sensor_not_found(&sensor_id))?;

    let outcome = submit_reading(&state.repo, &config, draft)
        .await
        .map_err(|e| state.fail(e, "Failed to submit sensor data"))?;
    if outcome.failed_alerts > 0 {
        warn!(
            sensor_id = %sensor_id,
            failed = outcome.failed_alerts,
            "some alerts could not be stored"
        );
    }
    info!(
        sensor_id = %sensor_id,
        alerts = outcome.alerts.len(),
        "reading submitted"
    );
    Ok(ok(outcome.reading, "Sensor data submitted successfully"))
}

async fn latest_readings(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<SensorReading>>, ApiError> {
    // ---
    info!("GET /sensors/data/latest");
    let sensors = state
        .repo
        .list_sensor_configs()
        .await
        .map_err(|e| state.fail(e, "Failed to retrieve latest data"))?;

    let lookups = sensors
        .iter()
        .map(|s| state.repo.get_latest_sensor_reading(&s.sensor_id));
    let latest: Vec<SensorReading> = try_join_all(lookups)
        .await
        .map_err(|e| state.fail(e, "Failed to retrieve latest data"))?
        .into_iter()
        .flatten()
        .collect();

    let message = format!("Retrieved latest data for {} sensors", latest.len());
    Ok(ok(latest, message))
}

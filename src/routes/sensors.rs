//! Sensor configuration endpoints.
//!
//! - `GET /sensors`, `POST /sensors`
//! - `GET|PUT|DELETE /sensors/{sensor_id}`

use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::get,
    Router,
};
use tracing::info;
use uuid::Uuid;

use super::params::{missing, validate_id};
use super::response::{ok, parse_body, ApiError, ApiResponse};
use super::{preflight, AppState};
use crate::models::{
    now_millis, CreateSensorRequest, SensorConfig, SensorConfigPatch, SensorType,
    UpdateSensorRequest,
};

// ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/sensors",
            get(list_sensors).post(create_sensor).options(preflight),
        )
        .route(
            "/sensors/{sensor_id}",
            get(get_sensor)
                .put(update_sensor)
                .delete(delete_sensor)
                .options(preflight),
        )
}

async fn list_sensors(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<SensorConfig>>, ApiError> {
    // ---
    info!("GET /sensors");
    let mut sensors = state
        .repo
        .list_sensor_configs()
        .await
        .map_err(|e| state.fail(e, "Failed to retrieve sensors"))?;
    sensors.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.sensor_id.cmp(&b.sensor_id))
    });
    let message = format!("Retrieved {} sensors", sensors.len());
    Ok(ok(sensors, message))
}

async fn create_sensor(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<ApiResponse<SensorConfig>, ApiError> {
    // ---
    info!("POST /sensors");
    let req: CreateSensorRequest = parse_body(&body)?;

    let absent = missing(&[
        ("name", req.name.as_ref()),
        ("sensorType", req.sensor_type.as_ref()),
        ("location", req.location.as_ref()),
    ]);
    if !absent.is_empty() {
        return Err(ApiError::missing_fields(&absent));
    }
    let (Some(name), Some(sensor_type), Some(location)) = (req.name, req.sensor_type, req.location)
    else {
        return Err(ApiError::missing_fields(&["name", "sensorType", "location"]));
    };

    let sensor_type: SensorType = sensor_type
        .parse()
        .map_err(|e| ApiError::invalid_parameter("sensorType", e))?;

    let sensor_id = match req.sensor_id {
        Some(id) => {
            validate_id("sensorId", &id)?;
            id
        }
        None => Uuid::new_v4().to_string(),
    };

    let mut config = SensorConfig::new(sensor_id, name, sensor_type, location, now_millis());
    config.min_value = req.min_value;
    config.max_value = req.max_value;
    config.alert_threshold = req.alert_threshold;

    let created = state
        .repo
        .create_sensor_config(&config)
        .await
        .map_err(|e| state.fail(e, "Failed to create sensor"))?;
    info!(sensor_id = %created.sensor_id, "sensor created");
    Ok(ok(created, "Sensor created successfully"))
}

async fn get_sensor(
    State(state): State<AppState>,
    Path(sensor_id): Path<String>,
) -> Result<ApiResponse<SensorConfig>, ApiError> {
    // ---
    info!("GET /sensors/{}", sensor_id);
    validate_id("sensorId", &sensor_id)?;
    let config = state
        .repo
        .get_sensor_config(&sensor_id)
        .await
        .map_err(|e| state.fail(e, "Failed to retrieve sensor"))?
        .ok_or_else(|| ApiError::sensor_not_found(&sensor_id))?;
    Ok(ok(config, "Sensor retrieved successfully"))
}

async fn update_sensor(
    State(state): State<AppState>,
    Path(sensor_id): Path<String>,
    body: Bytes,
) -> Result<ApiResponse<SensorConfig>, ApiError> {
    // ---
    info!("PUT /sensors/{}", sensor_id);
    validate_id("sensorId", &sensor_id)?;
    let req: UpdateSensorRequest = parse_body(&body)?;
    let patch = SensorConfigPatch::from(req);

    let updated = state
        .repo
        .update_sensor_config(&sensor_id, &patch)
        .await
        .map_err(|e| state.fail(e, "Failed to update sensor"))?;
    Ok(ok(updated, "Sensor updated successfully"))
}

async fn delete_sensor(
    State(state): State<AppState>,
    Path(sensor_id): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    // ---
    info!("DELETE /sensors/{}", sensor_id);
    validate_id("sensorId", &sensor_id)?;
    state
        .repo
        .delete_sensor_config(&sensor_id)
        .await
        .map_err(|e| state.fail(e, "Failed to delete sensor"))?;
    Ok(ok((), "Sensor deleted successfully"))
}

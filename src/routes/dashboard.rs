//! Dashboard aggregates.
//!
//! - `GET /dashboard/stats` summary over the latest reading of each active sensor
//! - `GET /dashboard/historical?timeRange=` per-sensor series for active sensors

use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use tracing::info;

use super::readings::RangeQuery;
use super::response::{ok, ApiError, ApiResponse};
use super::{preflight, AppState};
use crate::models::{
    now_millis, DashboardStats, SensorConfig, SensorReading, SensorSeries, SensorType, TimeRange,
};

// ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard/stats", get(stats).options(preflight))
        .route("/dashboard/historical", get(historical).options(preflight))
}

async fn stats(State(state): State<AppState>) -> Result<ApiResponse<DashboardStats>, ApiError> {
    // ---
    info!("GET /dashboard/stats");
    let sensors = state
        .repo
        .list_sensor_configs()
        .await
        .map_err(|e| state.fail(e, "Failed to retrieve dashboard stats"))?;
    let active: Vec<&SensorConfig> = sensors.iter().filter(|s| s.is_active).collect();

    let lookups = active
        .iter()
        .map(|s| state.repo.get_latest_sensor_reading(&s.sensor_id));
    let latest: Vec<SensorReading> = try_join_all(lookups)
        .await
        .map_err(|e| state.fail(e, "Failed to retrieve dashboard stats"))?
        .into_iter()
        .flatten()
        .collect();

    let summary = summarize(sensors.len(), active.len(), &latest, now_millis());
    Ok(ok(summary, "Dashboard stats retrieved successfully"))
}

async fn historical(
    State(state): State<AppState>,
    Query(params): Query<RangeQuery>,
) -> Result<ApiResponse<Vec<SensorSeries>>, ApiError> {
    // ---
    info!("GET /dashboard/historical");
    let range = TimeRange::parse_or_default(params.time_range.as_deref());
    let sensors = state
        .repo
        .list_sensor_configs()
        .await
        .map_err(|e| state.fail(e, "Failed to retrieve historical data"))?;
    let active: Vec<SensorConfig> = sensors.into_iter().filter(|s| s.is_active).collect();

    let queries = active
        .iter()
        .map(|s| state.repo.query_sensor_readings(&s.sensor_id, range));
    let series = try_join_all(queries)
        .await
        .map_err(|e| state.fail(e, "Failed to retrieve historical data"))?;

    let data: Vec<SensorSeries> = active
        .into_iter()
        .zip(series)
        .map(|(sensor, data)| SensorSeries {
            sensor_id: sensor.sensor_id,
            sensor_name: Some(sensor.name),
            sensor_type: Some(sensor.sensor_type),
            location: Some(sensor.location),
            data,
            time_range: range,
        })
        .collect();
    let message = format!("Retrieved historical data for {} sensors", data.len());
    Ok(ok(data, message))
}

/// Aggregate the latest readings of the active sensors.
///
/// Averages are rounded to one decimal and are 0 when no sensor of that type
/// has reported. Motion and energy are plain sums.
pub(crate) fn summarize(
    total: usize,
    active: usize,
    latest: &[SensorReading],
    now: DateTime<Utc>,
) -> DashboardStats {
    // ---
    let values = |t: SensorType| latest.iter().filter(move |r| r.sensor_type == t).map(|r| r.value);

    DashboardStats {
        total_sensors: total,
        active_sensors: active,
        average_temperature: round1(mean(values(SensorType::Temperature))),
        average_humidity: round1(mean(values(SensorType::Humidity))),
        motion_detections: values(SensorType::Motion).sum(),
        energy_consumption: values(SensorType::Power).sum(),
        last_updated: now,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

//! Smoke tests against a running server (`BASE_URL`, default
//! `http://localhost:8080`). Ignored by default; run with
//! `cargo test -- --ignored` once the service is up.

use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<ErrorBody>,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
}

fn base_url() -> String {
    std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8080".into())
}

#[tokio::test]
#[ignore = "requires a running server at BASE_URL"]
async fn health_endpoint_is_up() -> Result<()> {
    // ---
    let url = format!("{}/health", base_url());
    let body: Envelope = Client::new().get(&url).send().await?.json().await?;

    assert!(body.success, "health check failed at {}", url);
    assert_eq!(body.data["status"], "healthy");
    assert!(!body.timestamp.is_empty());
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running server at BASE_URL"]
async fn sensor_lifecycle_round_trip() -> Result<()> {
    // ---
    let base = base_url();
    let client = Client::new();
    let sensor_id = format!("smoke-{}", uuid::Uuid::new_v4().simple());

    let created: Envelope = client
        .post(format!("{}/sensors", base))
        .json(&json!({
            "sensorId": sensor_id,
            "name": "Smoke test sensor",
            "sensorType": "temperature",
            "location": "CI",
            "alertThreshold": 25
        }))
        .send()
        .await?
        .json()
        .await?;
    assert!(created.success, "create failed: {:?}", created.error);

    let submitted = client
        .post(format!("{}/sensors/{}/data", base, sensor_id))
        .json(&json!({"value": 30, "unit": "°C", "batteryLevel": 8}))
        .send()
        .await?;
    assert_eq!(submitted.status(), StatusCode::OK);

    let alerts: Envelope = client
        .get(format!("{}/alerts?sensorId={}", base, sensor_id))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(alerts.data.as_array().map(Vec::len), Some(2));

    let deleted = client
        .delete(format!("{}/sensors/{}", base, sensor_id))
        .send()
        .await?;
    assert_eq!(deleted.status(), StatusCode::OK);

    let missing: Envelope = client
        .get(format!("{}/sensors/{}", base, sensor_id))
        .send()
        .await?
        .json()
        .await?;
    assert!(!missing.success);
    assert_eq!(missing.error.map(|e| e.code).as_deref(), Some("SENSOR_NOT_FOUND"));
    Ok(())
}

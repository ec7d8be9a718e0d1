//! Uniform JSON envelope for every endpoint.
//!
//! ```text
//! { success: true,  data, message?, timestamp }
//! { success: false, error: { code, message, details? }, timestamp }
//! ```

use axum::{
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};

use crate::error::{redact, DataError, Entity};
use crate::models::{format_timestamp, now_millis};

// ---

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: String,
}

/// Successful response carrying `data`.
pub fn ok<T: Serialize>(data: T, message: impl Into<String>) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        data,
        message: Some(message.into()),
        timestamp: format_timestamp(&now_millis()),
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: ErrorBody,
    timestamp: String,
}

/// Error response with a stable `code` for client-side branching.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn missing_body() -> Self {
        Self::bad_request("MISSING_BODY", "Request body is required")
    }

    /// 400 naming every absent required field.
    pub fn missing_fields(fields: &[&str]) -> Self {
        Self::bad_request(
            "MISSING_FIELDS",
            format!("Missing required fields: {}", fields.join(", ")),
        )
        .with_details(json!({ "missing": fields }))
    }

    pub fn invalid_parameter(field: &str, reason: impl std::fmt::Display) -> Self {
        Self::bad_request("INVALID_PARAMETER", format!("Invalid {field}: {reason}"))
            .with_details(json!({ "field": field }))
    }

    pub fn sensor_not_found(sensor_id: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "SENSOR_NOT_FOUND",
            format!("Sensor {sensor_id} not found"),
        )
    }

    pub fn route_not_found(path: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "ROUTE_NOT_FOUND",
            format!("No route for {path}"),
        )
    }

    pub fn rate_limited() -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "RATE_LIMITED",
            "Too many requests, try again later",
        )
    }

    /// Translate a data layer failure. `context` is the caller-facing
    /// message for failures the caller cannot fix; `expose` controls whether
    /// the redacted cause is attached.
    pub fn from_data(err: DataError, context: &str, expose: bool) -> Self {
        // ---
        match err {
            DataError::NotFound {
                entity: Entity::Sensor,
                id,
            } => Self::sensor_not_found(&id),
            DataError::NotFound {
                entity: Entity::Alert,
                id,
            } => Self::new(
                StatusCode::NOT_FOUND,
                "ALERT_NOT_FOUND",
                format!("Alert {id} not found"),
            ),
            DataError::AlreadyExists {
                entity: Entity::Sensor,
                id,
            } => Self::new(StatusCode::CONFLICT, "SENSOR_EXISTS", "Sensor already exists")
                .with_details(json!({ "sensorId": id })),
            DataError::AlreadyExists {
                entity: Entity::Alert,
                id,
            } => Self::new(StatusCode::CONFLICT, "ALERT_EXISTS", "Alert already exists")
                .with_details(json!({ "alertId": id })),
            other => {
                let code = match other {
                    DataError::Storage(_) => "STORAGE_ERROR",
                    _ => "INTERNAL_ERROR",
                };
                let cause = redact(&other.to_string());
                tracing::error!(code, cause = %cause, "{}", context);
                let error = Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, context);
                if expose {
                    error.with_details(Value::String(cause))
                } else {
                    error
                }
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let envelope = ErrorEnvelope {
            success: false,
            error: ErrorBody {
                code: self.code,
                message: self.message,
                details: self.details,
            },
            timestamp: format_timestamp(&now_millis()),
        };
        (self.status, Json(envelope)).into_response()
    }
}

/// Parse a required JSON body.
pub fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    // ---
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::missing_body());
    }
    serde_json::from_slice(body).map_err(|e| {
        let reason = e.to_string();
        if reason.starts_with("unknown field") {
            ApiError::bad_request("UNKNOWN_FIELD", format!("Unsupported field: {reason}"))
        } else if e.is_data() {
            ApiError::bad_request("INVALID_PARAMETER", format!("Invalid request body: {reason}"))
        } else {
            ApiError::bad_request("INVALID_JSON", format!("Malformed JSON body: {reason}"))
        }
    })
}

/// Parse an optional JSON body, falling back to the default on absence or
/// malformed input.
pub fn parse_optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> T {
    serde_json::from_slice(body).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::UpdateSensorRequest;
    use crate::store::StoreError;

    #[test]
    fn test_data_errors_map_to_status_codes() {
        // ---
        let not_found = ApiError::from_data(
            DataError::NotFound {
                entity: Entity::Sensor,
                id: "x".into(),
            },
            "ctx",
            true,
        );
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.code(), "SENSOR_NOT_FOUND");

        let conflict = ApiError::from_data(
            DataError::AlreadyExists {
                entity: Entity::Sensor,
                id: "x".into(),
            },
            "ctx",
            true,
        );
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        assert_eq!(conflict.code(), "SENSOR_EXISTS");

        let storage = ApiError::from_data(
            DataError::Storage(StoreError::Unavailable("down".into())),
            "Failed to retrieve sensors",
            true,
        );
        assert_eq!(storage.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(storage.code(), "STORAGE_ERROR");
        assert!(storage.details.is_some());
    }

    #[test]
    fn test_details_hidden_when_not_exposed() {
        // ---
        let err = ApiError::from_data(
            DataError::Storage(StoreError::Unavailable("postgres://u:pw@db".into())),
            "Failed",
            false,
        );
        assert!(err.details.is_none());
    }

    #[test]
    fn test_details_are_redacted() {
        // ---
        let err = ApiError::from_data(
            DataError::Storage(StoreError::Unavailable("postgres://u:pw@db".into())),
            "Failed",
            true,
        );
        let details = err.details.unwrap().to_string();
        assert!(!details.contains("pw@"));
    }

    #[test]
    fn test_body_parsing_codes() {
        // ---
        let empty = parse_body::<UpdateSensorRequest>(&Bytes::from_static(b"  ")).unwrap_err();
        assert_eq!(empty.code(), "MISSING_BODY");

        let garbage = parse_body::<UpdateSensorRequest>(&Bytes::from_static(b"{nope")).unwrap_err();
        assert_eq!(garbage.code(), "INVALID_JSON");

        let unknown =
            parse_body::<UpdateSensorRequest>(&Bytes::from_static(br#"{"sensorType":"door"}"#))
                .unwrap_err();
        assert_eq!(unknown.code(), "UNKNOWN_FIELD");

        let wrong_type =
            parse_body::<UpdateSensorRequest>(&Bytes::from_static(br#"{"isActive":"yes"}"#))
                .unwrap_err();
        assert_eq!(wrong_type.code(), "INVALID_PARAMETER");
    }
}

//! Domain models for the IoT dashboard.
//!
//! Field names serialize in camelCase so the JSON seen by the dashboard
//! client and the attributes persisted in the document store are the same
//! shape. Timestamps are always rendered as fixed-width ISO-8601 with
//! millisecond precision, which keeps them lexicographically sortable inside
//! sort keys.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---

/// Current time truncated to the precision the store persists.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Render a timestamp as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serde adapter for [`format_timestamp`].
pub mod iso_millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            ts: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match ts {
                Some(ts) => super::serialize(ts, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(d)?
                .map(|raw| {
                    DateTime::parse_from_rfc3339(&raw)
                        .map(|ts| ts.with_timezone(&Utc))
                        .map_err(serde::de::Error::custom)
                })
                .transpose()
        }
    }
}

/// Error returned when parsing one of the enumerated string types fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Implements `as_str`, `Display` and `FromStr` for a snake_case string enum.
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Temperature,
    Humidity,
    Motion,
    Door,
    Window,
    Power,
    Light,
    AirQuality,
}

string_enum!(SensorType, "sensor type", {
    Temperature => "temperature",
    Humidity => "humidity",
    Motion => "motion",
    Door => "door",
    Window => "window",
    Power => "power",
    Light => "light",
    AirQuality => "air_quality",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStatus {
    #[default]
    Online,
    Offline,
    Warning,
    Error,
}

string_enum!(SensorStatus, "sensor status", {
    Online => "online",
    Offline => "offline",
    Warning => "warning",
    Error => "error",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    ThresholdExceeded,
    SensorOffline,
    BatteryLow,
    MotionDetected,
    DoorOpened,
}

string_enum!(AlertType, "alert type", {
    ThresholdExceeded => "threshold_exceeded",
    SensorOffline => "sensor_offline",
    BatteryLow => "battery_low",
    MotionDetected => "motion_detected",
    DoorOpened => "door_opened",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

string_enum!(AlertSeverity, "alert severity", {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

/// Query window for historical readings.
///
/// Unrecognized values fall back to [`TimeRange::Day`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "6h")]
    SixHours,
    #[default]
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl TimeRange {
    /// Lenient parse: anything unknown (or absent) means 24h.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw {
            Some("1h") => TimeRange::Hour,
            Some("6h") => TimeRange::SixHours,
            Some("7d") => TimeRange::Week,
            Some("30d") => TimeRange::Month,
            _ => TimeRange::Day,
        }
    }

    pub fn window(&self) -> Duration {
        match self {
            TimeRange::Hour => Duration::hours(1),
            TimeRange::SixHours => Duration::hours(6),
            TimeRange::Day => Duration::days(1),
            TimeRange::Week => Duration::days(7),
            TimeRange::Month => Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Hour => "1h",
            TimeRange::SixHours => "6h",
            TimeRange::Day => "24h",
            TimeRange::Week => "7d",
            TimeRange::Month => "30d",
        }
    }
}

/// Configuration of a single sensor. Root entity of the data model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorConfig {
    // ---
    pub sensor_id: String,
    pub name: String,
    pub sensor_type: SensorType,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_threshold: Option<f64>,
    pub is_active: bool,
    #[serde(with = "iso_millis")]
    pub last_seen: DateTime<Utc>,
    #[serde(with = "iso_millis")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso_millis")]
    pub updated_at: DateTime<Utc>,
}

impl SensorConfig {
    /// A freshly created, active sensor; all lifecycle timestamps equal `now`.
    pub fn new(
        sensor_id: impl Into<String>,
        name: impl Into<String>,
        sensor_type: SensorType,
        location: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        SensorConfig {
            sensor_id: sensor_id.into(),
            name: name.into(),
            sensor_type,
            location: location.into(),
            min_value: None,
            max_value: None,
            alert_threshold: None,
            is_active: true,
            last_seen: now,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One immutable time-series sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    // ---
    pub sensor_id: String,
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    pub sensor_type: SensorType,
    pub value: f64,
    pub unit: String,
    pub location: String,
    pub battery_level: f64,
    pub status: SensorStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    // ---
    pub id: String,
    pub sensor_id: String,
    pub sensor_name: String,
    pub alert_type: AlertType,
    pub message: String,
    pub severity: AlertSeverity,
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
    #[serde(
        default,
        with = "iso_millis::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<String>,
    /// Soft-delete marker. Deleted alerts stay in the store but are hidden
    /// from every listing.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

/// The explicit set of fields a sensor update may touch.
///
/// `None` means "leave unchanged". `updatedAt` is not part of the patch; the
/// data access layer always bumps it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorConfigPatch {
    pub name: Option<String>,
    pub location: Option<String>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub alert_threshold: Option<f64>,
    pub is_active: Option<bool>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl SensorConfigPatch {
    pub fn last_seen(ts: DateTime<Utc>) -> Self {
        SensorConfigPatch {
            last_seen: Some(ts),
            ..Default::default()
        }
    }

    /// Storage attributes to merge, in camelCase. Only supplied fields appear.
    pub fn to_fields(&self) -> serde_json::Map<String, serde_json::Value> {
        // ---
        use serde_json::Value;

        let mut fields = serde_json::Map::new();
        if let Some(name) = &self.name {
            fields.insert("name".into(), Value::from(name.clone()));
        }
        if let Some(location) = &self.location {
            fields.insert("location".into(), Value::from(location.clone()));
        }
        if let Some(v) = self.min_value {
            fields.insert("minValue".into(), Value::from(v));
        }
        if let Some(v) = self.max_value {
            fields.insert("maxValue".into(), Value::from(v));
        }
        if let Some(v) = self.alert_threshold {
            fields.insert("alertThreshold".into(), Value::from(v));
        }
        if let Some(active) = self.is_active {
            fields.insert("isActive".into(), Value::from(active));
        }
        if let Some(ts) = &self.last_seen {
            fields.insert("lastSeen".into(), Value::from(format_timestamp(ts)));
        }
        fields
    }
}

/// Body of `POST /sensors`. Presence of required fields is checked by the
/// handler so that a missing field maps to `MISSING_FIELDS`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSensorRequest {
    pub sensor_id: Option<String>,
    pub name: Option<String>,
    pub sensor_type: Option<String>,
    pub location: Option<String>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub alert_threshold: Option<f64>,
}

/// Body of `PUT /sensors/{sensorId}`. Unknown fields are rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateSensorRequest {
    pub name: Option<String>,
    pub location: Option<String>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub alert_threshold: Option<f64>,
    pub is_active: Option<bool>,
}

impl From<UpdateSensorRequest> for SensorConfigPatch {
    fn from(req: UpdateSensorRequest) -> Self {
        SensorConfigPatch {
            name: req.name,
            location: req.location,
            min_value: req.min_value,
            max_value: req.max_value,
            alert_threshold: req.alert_threshold,
            is_active: req.is_active,
            last_seen: None,
        }
    }
}

/// Body of `POST /sensors/{sensorId}/data`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitSensorDataRequest {
    pub sensor_id: Option<String>,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub battery_level: Option<f64>,
    pub status: Option<String>,
}

/// Body of the acknowledge and delete alert endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeRequest {
    pub acknowledged_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_sensors: usize,
    pub active_sensors: usize,
    pub average_temperature: f64,
    pub average_humidity: f64,
    pub motion_detections: f64,
    pub energy_consumption: f64,
    #[serde(with = "iso_millis")]
    pub last_updated: DateTime<Utc>,
}

/// Readings of one sensor over a time range, as served by the historical
/// endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorSeries {
    pub sensor_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_type: Option<SensorType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub data: Vec<SensorReading>,
    pub time_range: TimeRange,
}

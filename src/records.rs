//! Record mapper: domain entities to and from stored items.
//!
//! Key schema:
//!
//! | Entity          | `pk`                 | `sk`                 | secondary index                          |
//! |-----------------|----------------------|----------------------|------------------------------------------|
//! | `SensorConfig`  | `SENSOR#{sensorId}`  | `CONFIG`             | -                                        |
//! | `SensorReading` | `SENSOR#{sensorId}`  | `DATA#{timestamp}`   | -                                        |
//! | `Alert`         | `ALERT#{alertId}`    | `ALERT#{timestamp}`  | `SENSOR#{sensorId}` / `ALERT#{timestamp}`|
//!
//! Readings also carry `ttl`, the write time plus the retention window in
//! seconds since the epoch. Mapping back strips exactly the key attributes of
//! the entity and nothing else.

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::models::{format_timestamp, Alert, SensorConfig, SensorReading};
use crate::store::{Item, GSI1_PK, GSI1_SK, PK, SK, TTL};

/// How long readings are retained before the store expires them.
pub const READING_RETENTION_DAYS: i64 = 30;

pub const CONFIG_SK: &str = "CONFIG";
pub const SENSOR_PREFIX: &str = "SENSOR#";
pub const DATA_PREFIX: &str = "DATA#";
pub const ALERT_PREFIX: &str = "ALERT#";

pub fn sensor_pk(sensor_id: &str) -> String {
    format!("{SENSOR_PREFIX}{sensor_id}")
}

pub fn reading_sk(timestamp: &DateTime<Utc>) -> String {
    format!("{DATA_PREFIX}{}", format_timestamp(timestamp))
}

pub fn alert_pk(alert_id: &str) -> String {
    format!("{ALERT_PREFIX}{alert_id}")
}

pub fn alert_sk(timestamp: &DateTime<Utc>) -> String {
    format!("{ALERT_PREFIX}{}", format_timestamp(timestamp))
}

/// Expiry for a reading written at `written_at`.
pub fn reading_ttl(written_at: &DateTime<Utc>) -> i64 {
    (*written_at + Duration::days(READING_RETENTION_DAYS)).timestamp()
}

/// A domain entity with a storage key schema.
pub trait Record: Serialize + DeserializeOwned {
    /// Every attribute added by [`Record::storage_keys`].
    const KEY_FIELDS: &'static [&'static str];

    /// Storage-only attributes for this entity written at `written_at`.
    fn storage_keys(&self, written_at: &DateTime<Utc>) -> Vec<(&'static str, Value)>;
}

impl Record for SensorConfig {
    const KEY_FIELDS: &'static [&'static str] = &[PK, SK];

    fn storage_keys(&self, _written_at: &DateTime<Utc>) -> Vec<(&'static str, Value)> {
        vec![
            (PK, Value::from(sensor_pk(&self.sensor_id))),
            (SK, Value::from(CONFIG_SK)),
        ]
    }
}

impl Record for SensorReading {
    const KEY_FIELDS: &'static [&'static str] = &[PK, SK, TTL];

    fn storage_keys(&self, written_at: &DateTime<Utc>) -> Vec<(&'static str, Value)> {
        vec![
            (PK, Value::from(sensor_pk(&self.sensor_id))),
            (SK, Value::from(reading_sk(&self.timestamp))),
            (TTL, Value::from(reading_ttl(written_at))),
        ]
    }
}

impl Record for Alert {
    const KEY_FIELDS: &'static [&'static str] = &[PK, SK, GSI1_PK, GSI1_SK];

    fn storage_keys(&self, _written_at: &DateTime<Utc>) -> Vec<(&'static str, Value)> {
        let sk = alert_sk(&self.timestamp);
        vec![
            (PK, Value::from(alert_pk(&self.id))),
            (SK, Value::from(sk.clone())),
            (GSI1_PK, Value::from(sensor_pk(&self.sensor_id))),
            (GSI1_SK, Value::from(sk)),
        ]
    }
}

/// Serialize `record` and add its key attributes.
pub fn to_storage<R: Record>(
    record: &R,
    written_at: &DateTime<Utc>,
) -> Result<Item, serde_json::Error> {
    // ---
    let mut item = match serde_json::to_value(record)? {
        Value::Object(map) => map,
        other => {
            return Err(serde::ser::Error::custom(format!(
                "record serialized to a non-object: {other}"
            )))
        }
    };
    for (name, value) in record.storage_keys(written_at) {
        item.insert(name.to_string(), value);
    }
    Ok(item)
}

/// Strip the key attributes of `R` and deserialize the remainder.
pub fn from_storage<R: Record>(mut item: Item) -> Result<R, serde_json::Error> {
    for name in R::KEY_FIELDS {
        item.remove(*name);
    }
    serde_json::from_value(Value::Object(item))
}

//! Data access layer over the [`DocumentStore`].
//!
//! Owns the translation from dashboard operations (sensor CRUD, time-window
//! reading queries, alert listing and acknowledgement) to store primitives,
//! using the key schema from [`crate::records`]. Every store call is bounded by
//! the configured timeout. Nothing here retries.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{DataError, Entity, Result};
use crate::models::{
    format_timestamp, now_millis, Alert, SensorConfig, SensorConfigPatch, SensorReading,
    TimeRange,
};
use crate::records::{
    self, alert_pk, reading_sk, sensor_pk, Record, ALERT_PREFIX, CONFIG_SK, DATA_PREFIX,
};
use crate::store::{DocumentStore, Item, KeyQuery, ScanFilter, SortKeyCondition, StoreError};

pub const DEFAULT_ALERT_LIMIT: usize = 50;
pub const DEFAULT_SENSOR_ALERT_LIMIT: usize = 20;
pub const DEFAULT_ACTOR: &str = "system";

/// Shared, stateless handle to the store. Cheap to clone.
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl Repository {
    pub fn new(store: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                tracing::error!(operation = op, error = %err, "store operation failed");
                Err(err.into())
            }
            Err(_) => {
                tracing::error!(operation = op, timeout = ?self.timeout, "store operation timed out");
                Err(StoreError::Timeout(self.timeout).into())
            }
        }
    }

    // --- sensor configurations

    /// Conditional create; fails with [`DataError::AlreadyExists`] if the
    /// sensor id is taken.
    pub async fn create_sensor_config(&self, config: &SensorConfig) -> Result<SensorConfig> {
        // ---
        let item = records::to_storage(config, &Utc::now())?;
        match self
            .bounded("create_sensor_config", self.store.put_if_absent(item))
            .await
        {
            Ok(()) => Ok(config.clone()),
            Err(DataError::Storage(StoreError::ConditionFailed { .. })) => {
                Err(DataError::AlreadyExists {
                    entity: Entity::Sensor,
                    id: config.sensor_id.clone(),
                })
            }
            Err(err) => Err(err),
        }
    }

    pub async fn get_sensor_config(&self, sensor_id: &str) -> Result<Option<SensorConfig>> {
        let pk = sensor_pk(sensor_id);
        self.bounded("get_sensor_config", self.store.get(&pk, CONFIG_SK))
            .await?
            .map(records::from_storage)
            .transpose()
            .map_err(DataError::from)
    }

    /// Merge the supplied fields and bump `updatedAt`.
    pub async fn update_sensor_config(
        &self,
        sensor_id: &str,
        patch: &SensorConfigPatch,
    ) -> Result<SensorConfig> {
        // ---
        let mut fields = patch.to_fields();
        fields.insert(
            "updatedAt".into(),
            Value::from(format_timestamp(&now_millis())),
        );

        let pk = sensor_pk(sensor_id);
        let updated = self
            .bounded(
                "update_sensor_config",
                self.store.update(&pk, CONFIG_SK, fields),
            )
            .await?;

        match updated {
            Some(item) => Ok(records::from_storage(item)?),
            None => Err(DataError::NotFound {
                entity: Entity::Sensor,
                id: sensor_id.to_string(),
            }),
        }
    }

    /// Idempotent; readings and alerts of the sensor are left in place.
    pub async fn delete_sensor_config(&self, sensor_id: &str) -> Result<()> {
        let pk = sensor_pk(sensor_id);
        self.bounded("delete_sensor_config", self.store.delete(&pk, CONFIG_SK))
            .await
    }

    /// All sensors, in no particular order.
    pub async fn list_sensor_configs(&self) -> Result<Vec<SensorConfig>> {
        let items = self
            .bounded(
                "list_sensor_configs",
                self.store.scan(ScanFilter::SortKeyEquals(CONFIG_SK.into())),
            )
            .await?;
        decode_all(items)
    }

    // --- readings

    /// Persist a reading with its retention expiry.
    pub async fn save_sensor_reading(&self, reading: &SensorReading) -> Result<SensorReading> {
        let item = records::to_storage(reading, &Utc::now())?;
        self.bounded("save_sensor_reading", self.store.put(item))
            .await?;
        Ok(reading.clone())
    }

    /// Readings in `[now - range, now]`, oldest first.
    pub async fn query_sensor_readings(
        &self,
        sensor_id: &str,
        range: TimeRange,
    ) -> Result<Vec<SensorReading>> {
        self.query_sensor_readings_until(sensor_id, range, Utc::now())
            .await
    }

    /// Readings in `[until - range, until]`, oldest first.
    pub async fn query_sensor_readings_until(
        &self,
        sensor_id: &str,
        range: TimeRange,
        until: DateTime<Utc>,
    ) -> Result<Vec<SensorReading>> {
        // ---
        let start = until - range.window();
        let query = KeyQuery {
            pk: sensor_pk(sensor_id),
            sk: SortKeyCondition::Between(reading_sk(&start), reading_sk(&until)),
            descending: false,
            limit: None,
        };
        let items = self
            .bounded("query_sensor_readings", self.store.query(query))
            .await?;
        decode_all(items)
    }

    pub async fn get_latest_sensor_reading(
        &self,
        sensor_id: &str,
    ) -> Result<Option<SensorReading>> {
        // ---
        let query = KeyQuery {
            pk: sensor_pk(sensor_id),
            sk: SortKeyCondition::BeginsWith(DATA_PREFIX.into()),
            descending: true,
            limit: Some(1),
        };
        let items = self
            .bounded("get_latest_sensor_reading", self.store.query(query))
            .await?;
        items
            .into_iter()
            .next()
            .map(records::from_storage)
            .transpose()
            .map_err(DataError::from)
    }

    // --- alerts

    pub async fn create_alert(&self, alert: &Alert) -> Result<Alert> {
        let item = records::to_storage(alert, &Utc::now())?;
        self.bounded("create_alert", self.store.put(item)).await?;
        Ok(alert.clone())
    }

    /// Most recent alerts first, soft-deleted ones excluded.
    pub async fn list_alerts(&self, limit: Option<usize>) -> Result<Vec<Alert>> {
        // ---
        let items = self
            .bounded(
                "list_alerts",
                self.store
                    .scan(ScanFilter::PartitionKeyPrefix(ALERT_PREFIX.into())),
            )
            .await?;
        let mut alerts: Vec<Alert> = decode_all(items)?;
        alerts.retain(|a| !a.deleted);
        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        alerts.truncate(limit.unwrap_or(DEFAULT_ALERT_LIMIT));
        Ok(alerts)
    }

    /// Alerts of one sensor via the secondary index, most recent first.
    pub async fn list_alerts_by_sensor(
        &self,
        sensor_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Alert>> {
        // ---
        let gsi1pk = sensor_pk(sensor_id);
        let items = self
            .bounded(
                "list_alerts_by_sensor",
                self.store.query_index(&gsi1pk, None),
            )
            .await?;
        let mut alerts: Vec<Alert> = decode_all(items)?;
        alerts.retain(|a| !a.deleted);
        alerts.truncate(limit.unwrap_or(DEFAULT_SENSOR_ALERT_LIMIT));
        Ok(alerts)
    }

    /// Resolve the stored keys of an alert from its id.
    ///
    /// Alerts are written under `ALERT#{id}` / `ALERT#{timestamp}`, so the sort
    /// key is found by querying the alert's own partition rather than
    /// assumed.
    async fn find_alert(&self, alert_id: &str) -> Result<(String, Alert)> {
        // ---
        let query = KeyQuery {
            pk: alert_pk(alert_id),
            sk: SortKeyCondition::BeginsWith(ALERT_PREFIX.into()),
            descending: true,
            limit: Some(1),
        };
        let item = self
            .bounded("find_alert", self.store.query(query))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DataError::NotFound {
                entity: Entity::Alert,
                id: alert_id.to_string(),
            })?;
        let sk = crate::store::key_attr(&item, crate::store::SK)?.to_string();
        Ok((sk, records::from_storage(item)?))
    }

    async fn update_alert(&self, alert_id: &str, sk: &str, fields: Item) -> Result<Alert> {
        let pk = alert_pk(alert_id);
        match self
            .bounded("update_alert", self.store.update(&pk, sk, fields))
            .await?
        {
            Some(item) => Ok(records::from_storage(item)?),
            None => Err(DataError::NotFound {
                entity: Entity::Alert,
                id: alert_id.to_string(),
            }),
        }
    }

    /// Mark an alert acknowledged by `actor` (default `"system"`).
    ///
    /// Acknowledging an already acknowledged alert returns it unchanged, so
    /// the first acknowledgement's time and actor are kept.
    pub async fn acknowledge_alert(&self, alert_id: &str, actor: Option<&str>) -> Result<Alert> {
        // ---
        let (sk, alert) = self.find_alert(alert_id).await?;
        if alert.acknowledged {
            return Ok(alert);
        }
        self.update_alert(alert_id, &sk, acknowledgement(actor))
            .await
    }

    /// Soft delete: flag the alert as deleted, acknowledging it first if
    /// nobody has yet.
    pub async fn delete_alert(&self, alert_id: &str, actor: Option<&str>) -> Result<Alert> {
        // ---
        let (sk, alert) = self.find_alert(alert_id).await?;
        let mut fields = if alert.acknowledged {
            Item::new()
        } else {
            acknowledgement(actor)
        };
        fields.insert("deleted".into(), Value::Bool(true));
        self.update_alert(alert_id, &sk, fields).await
    }
}

fn acknowledgement(actor: Option<&str>) -> Item {
    let mut fields = Item::new();
    fields.insert("acknowledged".into(), Value::Bool(true));
    fields.insert(
        "acknowledgedAt".into(),
        Value::from(format_timestamp(&now_millis())),
    );
    fields.insert(
        "acknowledgedBy".into(),
        Value::from(actor.unwrap_or(DEFAULT_ACTOR)),
    );
    fields
}

fn decode_all<R: Record>(items: Vec<Item>) -> Result<Vec<R>> {
    items
        .into_iter()
        .map(|item| records::from_storage(item).map_err(DataError::from))
        .collect()
}

//! Reading submission.
//!
//! Sequence for one submission: persist the reading, stamp the sensor's
//! `lastSeen`, derive alerts and persist each of them. The steps are not
//! transactional. A failure to store one alert is logged and the remaining
//! alerts are still attempted; it never undoes the reading or `lastSeen`.

use crate::alerts::derive_alerts;
use crate::error::Result;
use crate::models::{
    now_millis, Alert, SensorConfig, SensorConfigPatch, SensorReading, SensorStatus,
};
use crate::repository::Repository;

/// Validated submission for an existing sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingDraft {
    pub value: f64,
    pub unit: String,
    pub battery_level: f64,
    pub status: SensorStatus,
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub reading: SensorReading,
    /// Alerts that were derived and successfully stored.
    pub alerts: Vec<Alert>,
    /// Derived alerts that could not be stored.
    pub failed_alerts: usize,
}

/// Record a reading for `config` and raise whatever alerts it triggers.
pub async fn submit_reading(
    repo: &Repository,
    config: &SensorConfig,
    draft: ReadingDraft,
) -> Result<Submission> {
    // ---
    let now = now_millis();
    let reading = SensorReading {
        sensor_id: config.sensor_id.clone(),
        timestamp: now,
        sensor_type: config.sensor_type,
        value: draft.value,
        unit: draft.unit,
        location: config.location.clone(),
        battery_level: draft.battery_level,
        status: draft.status,
    };

    let reading = repo.save_sensor_reading(&reading).await?;
    tracing::debug!(sensor_id = %reading.sensor_id, "reading stored");

    repo.update_sensor_config(&config.sensor_id, &SensorConfigPatch::last_seen(now))
        .await?;

    let mut stored = Vec::new();
    let mut failed_alerts = 0;
    for alert in derive_alerts(&reading, config, now_millis()) {
        match repo.create_alert(&alert).await {
            Ok(alert) => {
                tracing::info!(
                    alert_id = %alert.id,
                    alert_type = %alert.alert_type,
                    severity = %alert.severity,
                    "created alert"
                );
                stored.push(alert);
            }
            Err(e) => {
                failed_alerts += 1;
                tracing::error!(
                    alert_id = %alert.id,
                    sensor_id = %alert.sensor_id,
                    error = %e,
                    "failed to store alert, continuing"
                );
            }
        }
    }

    Ok(Submission {
        reading,
        alerts: stored,
        failed_alerts,
    })
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{AlertSeverity, AlertType, SensorType};
    use crate::store::{
        DocumentStore, Item, KeyQuery, MemoryStore, ScanFilter, StoreError, PK,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn lab_sensor() -> SensorConfig {
        let mut cfg = SensorConfig::new(
            "temp-001",
            "Lab thermometer",
            SensorType::Temperature,
            "Lab A",
            now_millis() - chrono::Duration::hours(1),
        );
        cfg.alert_threshold = Some(25.0);
        cfg
    }

    fn hot_low_battery() -> ReadingDraft {
        ReadingDraft {
            value: 30.0,
            unit: "°C".into(),
            battery_level: 8.0,
            status: SensorStatus::Online,
        }
    }

    #[tokio::test]
    async fn test_end_to_end_submission() {
        // ---
        let repo = Repository::new(Arc::new(MemoryStore::new()), Duration::from_secs(2));
        let cfg = lab_sensor();
        repo.create_sensor_config(&cfg).await.unwrap();

        let outcome = submit_reading(&repo, &cfg, hot_low_battery()).await.unwrap();

        let latest = repo.get_latest_sensor_reading("temp-001").await.unwrap();
        assert_eq!(latest, Some(outcome.reading.clone()));
        assert_eq!(outcome.reading.location, "Lab A");
        assert_eq!(outcome.reading.sensor_type, SensorType::Temperature);

        let refreshed = repo.get_sensor_config("temp-001").await.unwrap().unwrap();
        assert_eq!(refreshed.last_seen, outcome.reading.timestamp);

        let alerts = repo.list_alerts(None).await.unwrap();
        assert_eq!(alerts.len(), 2);
        assert!(alerts
            .iter()
            .any(|a| a.alert_type == AlertType::BatteryLow && a.severity == AlertSeverity::Critical));
        assert!(alerts.iter().any(|a| {
            a.alert_type == AlertType::ThresholdExceeded && a.severity == AlertSeverity::Medium
        }));
        assert_eq!(outcome.alerts.len(), 2);
        assert_eq!(outcome.failed_alerts, 0);
    }

    /// Memory store that refuses the first alert write.
    struct FirstAlertFails {
        inner: MemoryStore,
        alert_puts: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for FirstAlertFails {
        async fn put(&self, item: Item) -> std::result::Result<(), StoreError> {
            let is_alert = item
                .get(PK)
                .and_then(|v| v.as_str())
                .is_some_and(|pk| pk.starts_with("ALERT#"));
            if is_alert && self.alert_puts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(StoreError::Unavailable("throttled".into()));
            }
            self.inner.put(item).await
        }
        async fn put_if_absent(&self, item: Item) -> std::result::Result<(), StoreError> {
            self.inner.put_if_absent(item).await
        }
        async fn get(&self, pk: &str, sk: &str) -> std::result::Result<Option<Item>, StoreError> {
            self.inner.get(pk, sk).await
        }
        async fn update(
            &self,
            pk: &str,
            sk: &str,
            fields: Item,
        ) -> std::result::Result<Option<Item>, StoreError> {
            self.inner.update(pk, sk, fields).await
        }
        async fn delete(&self, pk: &str, sk: &str) -> std::result::Result<(), StoreError> {
            self.inner.delete(pk, sk).await
        }
        async fn query(&self, query: KeyQuery) -> std::result::Result<Vec<Item>, StoreError> {
            self.inner.query(query).await
        }
        async fn query_index(
            &self,
            gsi1pk: &str,
            limit: Option<usize>,
        ) -> std::result::Result<Vec<Item>, StoreError> {
            self.inner.query_index(gsi1pk, limit).await
        }
        async fn scan(&self, filter: ScanFilter) -> std::result::Result<Vec<Item>, StoreError> {
            self.inner.scan(filter).await
        }
    }

    #[tokio::test]
    async fn test_alert_failure_does_not_stop_the_rest() {
        // ---
        let store = Arc::new(FirstAlertFails {
            inner: MemoryStore::new(),
            alert_puts: AtomicUsize::new(0),
        });
        let repo = Repository::new(store, Duration::from_secs(2));
        let cfg = lab_sensor();
        repo.create_sensor_config(&cfg).await.unwrap();

        let outcome = submit_reading(&repo, &cfg, hot_low_battery()).await.unwrap();

        assert_eq!(outcome.failed_alerts, 1);
        assert_eq!(outcome.alerts.len(), 1);
        assert_eq!(repo.list_alerts(None).await.unwrap().len(), 1);
        assert!(repo.get_latest_sensor_reading("temp-001").await.unwrap().is_some());
        let refreshed = repo.get_sensor_config("temp-001").await.unwrap().unwrap();
        assert_eq!(refreshed.last_seen, outcome.reading.timestamp);
    }

    #[tokio::test]
    async fn test_deleted_sensor_fails_last_seen_but_keeps_reading() {
        // ---
        let repo = Repository::new(Arc::new(MemoryStore::new()), Duration::from_secs(2));
        let cfg = lab_sensor();

        let err = submit_reading(&repo, &cfg, hot_low_battery()).await.unwrap_err();
        assert!(matches!(err, crate::error::DataError::NotFound { .. }));
        assert!(repo.get_latest_sensor_reading("temp-001").await.unwrap().is_some());
    }
}

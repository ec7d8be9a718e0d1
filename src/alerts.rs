//! Alert derivation.
//!
//! Inspects a freshly submitted reading against its sensor's configuration and
//! produces unsaved alerts. Rules are independent, so one reading may raise
//! several alerts:
//!
//! - battery below 20%: `battery_low`, `critical` below 10% else `high`
//! - temperature above the configured `alertThreshold`: `threshold_exceeded`, `medium`
//! - motion sensor with a positive value: `motion_detected`, `low`
//!
//! Derivation never fails; persisting the drafts is the caller's concern.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Alert, AlertSeverity, AlertType, SensorConfig, SensorReading, SensorType};

pub const BATTERY_LOW_PERCENT: f64 = 20.0;
pub const BATTERY_CRITICAL_PERCENT: f64 = 10.0;

/// Alerts raised by `reading`, stamped with `now`.
pub fn derive_alerts(
    reading: &SensorReading,
    config: &SensorConfig,
    now: DateTime<Utc>,
) -> Vec<Alert> {
    // ---
    let mut alerts = Vec::new();

    if reading.battery_level < BATTERY_LOW_PERCENT {
        let severity = if reading.battery_level < BATTERY_CRITICAL_PERCENT {
            AlertSeverity::Critical
        } else {
            AlertSeverity::High
        };
        alerts.push(draft(
            reading,
            config,
            now,
            AlertType::BatteryLow,
            severity,
            format!(
                "Battery level is {}% (below {}%)",
                reading.battery_level, BATTERY_LOW_PERCENT
            ),
        ));
    }

    if let Some(threshold) = config.alert_threshold {
        if reading.sensor_type == SensorType::Temperature && reading.value > threshold {
            alerts.push(draft(
                reading,
                config,
                now,
                AlertType::ThresholdExceeded,
                AlertSeverity::Medium,
                format!(
                    "Temperature {}{} exceeds threshold {}{}",
                    reading.value, reading.unit, threshold, reading.unit
                ),
            ));
        }
    }

    if reading.sensor_type == SensorType::Motion && reading.value > 0.0 {
        alerts.push(draft(
            reading,
            config,
            now,
            AlertType::MotionDetected,
            AlertSeverity::Low,
            format!("Motion detected in {}", reading.location),
        ));
    }

    alerts
}

fn draft(
    reading: &SensorReading,
    config: &SensorConfig,
    now: DateTime<Utc>,
    alert_type: AlertType,
    severity: AlertSeverity,
    message: String,
) -> Alert {
    Alert {
        id: format!("alert-{}", Uuid::new_v4()),
        sensor_id: reading.sensor_id.clone(),
        sensor_name: config.name.clone(),
        alert_type,
        message,
        severity,
        timestamp: now,
        acknowledged: false,
        acknowledged_at: None,
        acknowledged_by: None,
        deleted: false,
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::SensorStatus;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 26, 18, 45, 0).unwrap()
    }

    fn sensor(sensor_type: SensorType, threshold: Option<f64>) -> SensorConfig {
        let mut cfg = SensorConfig::new("s-1", "Hall sensor", sensor_type, "Hallway", now());
        cfg.alert_threshold = threshold;
        cfg
    }

    fn reading(sensor_type: SensorType, value: f64, battery: f64) -> SensorReading {
        SensorReading {
            sensor_id: "s-1".into(),
            timestamp: now(),
            sensor_type,
            value,
            unit: "°C".into(),
            location: "Hallway".into(),
            battery_level: battery,
            status: SensorStatus::Online,
        }
    }

    fn of_type(alerts: &[Alert], alert_type: AlertType) -> Vec<&Alert> {
        alerts.iter().filter(|a| a.alert_type == alert_type).collect()
    }

    #[test]
    fn test_battery_severity_bands() {
        // ---
        let cfg = sensor(SensorType::Humidity, None);

        let critical = derive_alerts(&reading(SensorType::Humidity, 40.0, 5.0), &cfg, now());
        let battery = of_type(&critical, AlertType::BatteryLow);
        assert_eq!(battery.len(), 1);
        assert_eq!(battery[0].severity, AlertSeverity::Critical);
        assert_eq!(battery[0].message, "Battery level is 5% (below 20%)");

        let high = derive_alerts(&reading(SensorType::Humidity, 40.0, 15.0), &cfg, now());
        assert_eq!(of_type(&high, AlertType::BatteryLow)[0].severity, AlertSeverity::High);

        let fine = derive_alerts(&reading(SensorType::Humidity, 40.0, 50.0), &cfg, now());
        assert!(of_type(&fine, AlertType::BatteryLow).is_empty());
    }

    #[test]
    fn test_battery_boundaries() {
        // ---
        let cfg = sensor(SensorType::Door, None);
        let at_ten = derive_alerts(&reading(SensorType::Door, 0.0, 10.0), &cfg, now());
        assert_eq!(at_ten[0].severity, AlertSeverity::High);

        let at_twenty = derive_alerts(&reading(SensorType::Door, 0.0, 20.0), &cfg, now());
        assert!(at_twenty.is_empty());
    }

    #[test]
    fn test_threshold_exceeded() {
        // ---
        let hot = reading(SensorType::Temperature, 30.0, 80.0);

        let alerts = derive_alerts(&hot, &sensor(SensorType::Temperature, Some(25.0)), now());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::ThresholdExceeded);
        assert_eq!(alerts[0].severity, AlertSeverity::Medium);
        assert_eq!(alerts[0].message, "Temperature 30°C exceeds threshold 25°C");

        let no_threshold = derive_alerts(&hot, &sensor(SensorType::Temperature, None), now());
        assert!(no_threshold.is_empty());

        let at_threshold = derive_alerts(
            &reading(SensorType::Temperature, 25.0, 80.0),
            &sensor(SensorType::Temperature, Some(25.0)),
            now(),
        );
        assert!(at_threshold.is_empty());
    }

    #[test]
    fn test_threshold_only_applies_to_temperature() {
        // ---
        let alerts = derive_alerts(
            &reading(SensorType::Humidity, 95.0, 80.0),
            &sensor(SensorType::Humidity, Some(60.0)),
            now(),
        );
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_motion_detected() {
        // ---
        let cfg = sensor(SensorType::Motion, None);

        let moved = derive_alerts(&reading(SensorType::Motion, 1.0, 80.0), &cfg, now());
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].alert_type, AlertType::MotionDetected);
        assert_eq!(moved[0].severity, AlertSeverity::Low);
        assert_eq!(moved[0].message, "Motion detected in Hallway");

        let still = derive_alerts(&reading(SensorType::Motion, 0.0, 80.0), &cfg, now());
        assert!(still.is_empty());
    }

    #[test]
    fn test_rules_combine_with_fresh_ids() {
        // ---
        let alerts = derive_alerts(
            &reading(SensorType::Temperature, 30.0, 8.0),
            &sensor(SensorType::Temperature, Some(25.0)),
            now(),
        );
        assert_eq!(alerts.len(), 2);
        assert_eq!(of_type(&alerts, AlertType::BatteryLow)[0].severity, AlertSeverity::Critical);
        assert_eq!(of_type(&alerts, AlertType::ThresholdExceeded).len(), 1);
        assert_ne!(alerts[0].id, alerts[1].id);
        for alert in &alerts {
            assert_eq!(alert.sensor_name, "Hall sensor");
            assert_eq!(alert.timestamp, now());
            assert!(!alert.acknowledged);
        }
    }
}

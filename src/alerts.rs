//! Rule-based sensor threshold alerting.
//!
//! A deliberately simple screen that runs ahead of any model: low moisture
//! and high temperature trip fixed thresholds. The diagnostic pipeline never
//! depends on this module.

use serde::{Deserialize, Serialize};

use crate::models::SensorReading;

/// Severity of a threshold sweep, worst rule wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Medium,
    High,
}

/// Outcome of evaluating one sensor snapshot against the threshold rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertResponse {
    pub alert: bool,
    pub severity: Severity,
    pub details: String,
}

/// Evaluate the fixed rules: moisture below 30 is a high-severity alert,
/// temperature above 35 a medium one. Readings of other kinds pass through.
pub fn check_sensors(snapshot: &[SensorReading]) -> AlertResponse {
    let mut alerts = Vec::new();
    let mut severity = Severity::None;

    for reading in snapshot {
        if reading.kind == "moisture" && reading.value < 30.0 {
            alerts.push(format!(
                "Low moisture detected: {}{}",
                reading.value, reading.unit
            ));
            severity = Severity::High;
        } else if reading.kind == "temp" && reading.value > 35.0 {
            alerts.push(format!(
                "High temp detected: {}{}",
                reading.value, reading.unit
            ));
            if severity == Severity::None {
                severity = Severity::Medium;
            }
        }
    }

    AlertResponse {
        alert: !alerts.is_empty(),
        severity,
        details: if alerts.is_empty() {
            "Nominal".to_string()
        } else {
            alerts.join("; ")
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn reading(kind: &str, value: f64, unit: &str) -> SensorReading {
        SensorReading {
            id: format!("{kind}-1"),
            kind: kind.to_string(),
            value,
            unit: unit.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn nominal_snapshot_raises_nothing() {
        let response = check_sensors(&[reading("moisture", 45.0, "%"), reading("temp", 24.0, "C")]);
        assert!(!response.alert);
        assert_eq!(response.severity, Severity::None);
        assert_eq!(response.details, "Nominal");
    }

    #[test]
    fn low_moisture_is_high_severity() {
        let response = check_sensors(&[reading("moisture", 22.0, "%")]);
        assert!(response.alert);
        assert_eq!(response.severity, Severity::High);
        assert!(response.details.contains("Low moisture detected: 22%"));
    }

    #[test]
    fn high_temp_is_medium_severity() {
        let response = check_sensors(&[reading("temp", 38.5, "C")]);
        assert_eq!(response.severity, Severity::Medium);
        assert!(response.details.contains("High temp detected: 38.5C"));
    }

    #[test]
    fn moisture_rule_outranks_temp_rule() {
        let response = check_sensors(&[reading("temp", 38.0, "C"), reading("moisture", 10.0, "%")]);
        assert_eq!(response.severity, Severity::High);
        assert!(response.details.contains("; "));
    }
}

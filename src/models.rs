//! # Domain models
//!
//! Data structures shared across the crate:
//!
//! - [`SensorReading`]: one telemetry sample from a field sensor. Consumed by
//!   diagnosis and alerting, never stored.
//! - [`CaseRecord`]: the metadata half of an indexed case. Immutable once
//!   created; paired positionally with its embedding vector by the case bank.
//! - [`IngestRequest`] / [`IngestAck`]: the ingestion surface for edge devices
//!   pushing precomputed embeddings.
//! - [`DiagnosisRequest`]: one end-to-end query against the doctor.
//! - [`DoctorReport`] and friends: the structured report artifact, including
//!   the deterministic degraded variant returned when generation fails.
//!
//! JSON field names follow the wire format of the edge devices and the web
//! dashboard (`likelyCauses`, `weatherContext`, `type`), so every struct here
//! carries explicit serde renames rather than assuming Rust casing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Provenance tag attached to cases replayed from a labeled dataset.
pub const PROVENANCE_TRAINING_SET: &str = "Training Set";

/// Provenance tag attached to live-ingested edge embeddings that carry none.
pub const PROVENANCE_EDGE_DEVICE: &str = "Edge Device";

/// Sentinel provenance entry marking a degraded report.
pub const PROVENANCE_SYSTEM_ERROR: &str = "System Error";

/// A single sensor telemetry sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Sensor identifier, e.g. `"soil-probe-3"`.
    pub id: String,
    /// Sensor kind, e.g. `"moisture"` or `"temp"`. Wire name is `type`.
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
}

/// Metadata for one indexed case.
///
/// A record is created exactly once, by live ingestion or by bulk indexing,
/// and never updated or deleted afterwards. The promoted fields (`id`,
/// `label`, `provenance`) are what the context assembler surfaces to the
/// generation service; everything else the producer sent rides along in
/// `metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub provenance: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl CaseRecord {
    /// Build a record from the free-form metadata map an edge device sends.
    ///
    /// `id`, `label`, and `provenance` are promoted out of the map when
    /// present; an absent `id` becomes `"unknown"` and an absent `provenance`
    /// becomes [`PROVENANCE_EDGE_DEVICE`]. The full map is retained.
    pub fn from_metadata(metadata: Map<String, Value>) -> Self {
        let id = metadata
            .get("id")
            .map(value_to_display)
            .unwrap_or_else(|| "unknown".to_string());
        let label = metadata
            .get("label")
            .and_then(Value::as_str)
            .map(str::to_string);
        let provenance = metadata
            .get("provenance")
            .and_then(Value::as_str)
            .unwrap_or(PROVENANCE_EDGE_DEVICE)
            .to_string();

        Self {
            id,
            label,
            provenance,
            metadata,
        }
    }
}

/// Renders scalar metadata values without JSON quoting; everything else
/// falls back to compact JSON.
fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Ingestion payload: one precomputed embedding plus its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub field_id: String,
    pub timestamp: DateTime<Utc>,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Acknowledgement returned for a successful ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestAck {
    pub status: String,
    /// External id echoed back from the metadata (`"unknown"` if absent).
    pub id: String,
    /// Ordinal assigned by the case bank; the correlation key for this entry.
    pub ordinal: usize,
}

/// One end-to-end diagnosis query.
///
/// Exactly one of `embedding` / `observation` is usually set: edge
/// deployments send the vector they computed locally, interactive callers
/// send raw observation text for the embedding capability to encode. When
/// both are absent the free-text query itself is embedded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisRequest {
    pub field_id: String,
    pub timestamp: DateTime<Utc>,
    pub sensor_snapshot: Vec<SensorReading>,
    pub query_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Urgency of one recommended action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// One time-sensitive action recommended by the doctor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recommendation {
    pub action: String,
    /// Execution window, e.g. `"within 24h"`.
    pub window: String,
    pub priority: Priority,
}

/// The structured report returned for every diagnosis query.
///
/// A genuine report comes back verbatim from the generation service after
/// schema validation. A degraded report (see [`DoctorReport::degraded`]) is
/// produced locally when any stage of the pipeline fails; callers tell the
/// two apart by `confidence` and the [`PROVENANCE_SYSTEM_ERROR`] provenance
/// entry, never by a raised error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DoctorReport {
    pub summary: String,
    pub likely_causes: Vec<String>,
    pub reasoning: Vec<String>,
    pub recommendations: Vec<Recommendation>,
    pub weather_context: String,
    pub confidence: f64,
    pub provenance: Vec<String>,
}

/// Raised when a syntactically valid report fails a range invariant.
#[derive(Debug, thiserror::Error)]
pub enum ReportValidationError {
    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),
}

impl DoctorReport {
    /// Check the invariants serde cannot express: `confidence` must be a
    /// finite value in `[0, 1]`.
    pub fn validate(&self) -> Result<(), ReportValidationError> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(ReportValidationError::ConfidenceOutOfRange(self.confidence));
        }
        Ok(())
    }

    /// The deterministic zero-confidence report returned on any pipeline
    /// failure. `reason` lands in `reasoning` so operators can see what
    /// degraded the query without the caller ever receiving an error.
    pub fn degraded(reason: &str) -> Self {
        Self {
            summary: "Analysis interrupted due to model error.".to_string(),
            likely_causes: vec!["Unknown Error".to_string()],
            reasoning: vec![reason.to_string()],
            recommendations: Vec::new(),
            weather_context: "N/A".to_string(),
            confidence: 0.0,
            provenance: vec![PROVENANCE_SYSTEM_ERROR.to_string()],
        }
    }

    /// True when this is the degraded fallback rather than a genuine
    /// diagnosis.
    pub fn is_degraded(&self) -> bool {
        self.confidence == 0.0
            && self
                .provenance
                .iter()
                .any(|p| p == PROVENANCE_SYSTEM_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_report_json() -> Value {
        json!({
            "summary": "Early blight pressure building on lower canopy.",
            "likelyCauses": ["Alternaria solani", "Prolonged leaf wetness"],
            "reasoning": ["Retrieved cases share the blight label", "Moisture trend supports fungal growth"],
            "recommendations": [
                { "action": "Apply copper-based fungicide", "window": "within 24h", "priority": "high" }
            ],
            "weatherContext": "Two humid nights forecast.",
            "confidence": 0.82,
            "provenance": ["case-17", "soil-probe-3"]
        })
    }

    #[test]
    fn report_round_trips_with_camel_case_fields() {
        let report: DoctorReport = serde_json::from_value(sample_report_json()).unwrap();
        assert_eq!(report.likely_causes.len(), 2);
        assert_eq!(report.recommendations[0].priority, Priority::High);

        let serialized = serde_json::to_value(&report).unwrap();
        assert!(serialized.get("likelyCauses").is_some());
        assert!(serialized.get("weatherContext").is_some());
        assert!(serialized.get("likely_causes").is_none());
    }

    #[test]
    fn unknown_priority_is_rejected() {
        let mut value = sample_report_json();
        value["recommendations"][0]["priority"] = json!("urgent");
        let report: Result<DoctorReport, _> = serde_json::from_value(value);
        assert!(report.is_err());
    }

    #[test]
    fn unknown_report_fields_are_rejected() {
        let mut value = sample_report_json();
        value["extra"] = json!("nope");
        let report: Result<DoctorReport, _> = serde_json::from_value(value);
        assert!(report.is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_confidence() {
        let mut report: DoctorReport = serde_json::from_value(sample_report_json()).unwrap();
        assert!(report.validate().is_ok());

        report.confidence = 1.5;
        assert!(report.validate().is_err());

        report.confidence = f64::NAN;
        assert!(report.validate().is_err());
    }

    #[test]
    fn degraded_report_has_the_sentinel_shape() {
        let report = DoctorReport::degraded("generation service error: timeout");
        assert_eq!(report.confidence, 0.0);
        assert_eq!(report.provenance, vec![PROVENANCE_SYSTEM_ERROR.to_string()]);
        assert!(report.recommendations.is_empty());
        assert_eq!(report.weather_context, "N/A");
        assert!(report.is_degraded());
        report.validate().unwrap();
    }

    #[test]
    fn case_record_promotes_metadata_fields() {
        let mut metadata = Map::new();
        metadata.insert("id".into(), json!("case-42"));
        metadata.insert("label".into(), json!("leaf_mold"));
        metadata.insert("capture_device".into(), json!("edge-cam-1"));

        let record = CaseRecord::from_metadata(metadata);
        assert_eq!(record.id, "case-42");
        assert_eq!(record.label.as_deref(), Some("leaf_mold"));
        assert_eq!(record.provenance, PROVENANCE_EDGE_DEVICE);
        assert_eq!(record.metadata["capture_device"], json!("edge-cam-1"));
    }

    #[test]
    fn case_record_defaults_missing_id() {
        let record = CaseRecord::from_metadata(Map::new());
        assert_eq!(record.id, "unknown");
        assert!(record.label.is_none());
    }

    #[test]
    fn sensor_reading_uses_the_wire_name_for_kind() {
        let reading: SensorReading = serde_json::from_value(json!({
            "id": "soil-probe-3",
            "type": "moisture",
            "value": 27.5,
            "unit": "%",
            "timestamp": "2024-06-01T06:30:00Z"
        }))
        .unwrap();
        assert_eq!(reading.kind, "moisture");

        let serialized = serde_json::to_value(&reading).unwrap();
        assert!(serialized.get("type").is_some());
        assert!(serialized.get("kind").is_none());
    }
}

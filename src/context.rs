//! # Context assembly
//!
//! Renders the grounding document handed to the generation service: the
//! current sensor snapshot, the retrieved historical cases in rank order,
//! and the caller's free-text intent.
//!
//! Everything here is a pure function over borrowed inputs, with no shared
//! state and nothing mutated, so assembly is safe to run on any number of
//! concurrent queries.

use serde_json::{Map, Value, json};

use crate::models::SensorReading;
use crate::vector_store::ScoredCase;

/// Build the bounded context document.
///
/// - Sensor readings are enumerated as `type=value unit` in input order.
/// - Cases keep the retrieval ranking and are serialized with their score,
///   label, and provenance.
/// - At most `k` cases are included, even if the caller passes more.
pub fn assemble(
    readings: &[SensorReading],
    cases: &[ScoredCase],
    k: usize,
    intent: &str,
) -> String {
    let sensor_context = readings
        .iter()
        .map(|s| format!("{}={}{}", s.kind, s.value, s.unit))
        .collect::<Vec<_>>()
        .join(", ");

    let case_objects: Vec<Value> = cases.iter().take(k).map(case_to_value).collect();
    let case_context = serde_json::to_string_pretty(&case_objects)
        .unwrap_or_else(|_| "[]".to_string());

    format!(
        "Current Sensors: {sensor_context}\n\n\
         Similar Historical Cases:\n{case_context}\n\n\
         User Query: {intent}\n"
    )
}

/// One case as the generation service sees it: the producer's metadata with
/// the promoted fields and the similarity score folded in on top.
fn case_to_value(case: &ScoredCase) -> Value {
    let mut object: Map<String, Value> = case.record.metadata.clone();
    object.insert("id".to_string(), json!(case.record.id));
    if let Some(label) = &case.record.label {
        object.insert("label".to_string(), json!(label));
    }
    object.insert("provenance".to_string(), json!(case.record.provenance));
    object.insert("score".to_string(), json!(case.score));
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CaseRecord;
    use chrono::Utc;
    use serde_json::Map;

    fn reading(kind: &str, value: f64, unit: &str) -> SensorReading {
        SensorReading {
            id: format!("{kind}-sensor"),
            kind: kind.to_string(),
            value,
            unit: unit.to_string(),
            timestamp: Utc::now(),
        }
    }

    fn scored(id: &str, label: &str, score: f32) -> ScoredCase {
        ScoredCase {
            record: CaseRecord {
                id: id.to_string(),
                label: Some(label.to_string()),
                provenance: "Training Set".to_string(),
                metadata: Map::new(),
            },
            score,
        }
    }

    #[test]
    fn sensors_render_as_type_value_unit() {
        let readings = vec![reading("moisture", 27.5, "%"), reading("temp", 31.0, "C")];
        let context = assemble(&readings, &[], 3, "status?");
        assert!(context.contains("Current Sensors: moisture=27.5%, temp=31C"));
    }

    #[test]
    fn cases_keep_retrieval_order_and_carry_scores() {
        let cases = vec![scored("a", "blight", 0.97), scored("b", "healthy", 0.41)];
        let context = assemble(&[], &cases, 3, "diagnose");

        let a = context.find("\"id\": \"a\"").unwrap();
        let b = context.find("\"id\": \"b\"").unwrap();
        assert!(a < b);
        assert!(context.contains("\"score\""));
        assert!(context.contains("\"label\": \"blight\""));
        assert!(context.contains("\"provenance\": \"Training Set\""));
    }

    #[test]
    fn case_list_is_bounded_to_k() {
        let cases = vec![
            scored("a", "x", 0.9),
            scored("b", "x", 0.8),
            scored("c", "x", 0.7),
        ];
        let context = assemble(&[], &cases, 2, "diagnose");
        assert!(context.contains("\"id\": \"a\""));
        assert!(context.contains("\"id\": \"b\""));
        assert!(!context.contains("\"id\": \"c\""));
    }

    #[test]
    fn intent_and_empty_retrieval_render() {
        let context = assemble(&[], &[], 3, "why are lower leaves spotting?");
        assert!(context.contains("Similar Historical Cases:\n[]"));
        assert!(context.ends_with("User Query: why are lower leaves spotting?\n"));
    }

    #[test]
    fn inputs_are_not_mutated() {
        let readings = vec![reading("moisture", 30.0, "%")];
        let cases = vec![scored("a", "x", 0.5)];
        let before = (readings.clone(), cases[0].record.clone());
        let _ = assemble(&readings, &cases, 1, "q");
        assert_eq!(before.0, readings);
        assert_eq!(before.1, cases[0].record);
    }
}

//! # Report prompt template
//!
//! The instruction preamble and structured-output schema for the generation
//! service live in a [`ReportTemplate`]. A built-in default ships with the
//! crate ([`ReportTemplate::doctor`]); deployments that want different
//! prompt wording drop a YAML override under the config directory:
//!
//! ```text
//! <config_dir>/templates/<name>.yaml
//! ```
//!
//! ## Minimal YAML example
//!
//! ```yaml
//! system_prompt: "You are HarvestMind, an expert agricultural AI doctor."
//! # response_format:   # ResponseFormatJsonSchema (see async_openai types)
//! #   name: "doctor_report"
//! #   schema: { ... }
//! ```
//!
//! The schema is sent to the service via `response_format` and mirrors the
//! [`crate::models::DoctorReport`] shape exactly. The orchestrator still
//! re-validates every response, so a template with a looser schema cannot
//! smuggle malformed reports through.

use std::fs;

use async_openai::types::chat::ResponseFormatJsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("config directory unavailable: {0}")]
    ConfigDir(String),
    #[error("failed to read template: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse template: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Prompt preamble plus the target report schema.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReportTemplate {
    /// Instruction used as the session's system message.
    pub system_prompt: String,

    /// Schema describing the desired JSON report payload.
    pub response_format: Option<ResponseFormatJsonSchema>,
}

impl ReportTemplate {
    /// The built-in doctor's-report template.
    pub fn doctor() -> Self {
        let system_prompt = "\
You are HarvestMind, an expert agricultural AI doctor.
Analyze the provided field context and generate a JSON doctor's report.

Task:
1. Analyze the sensor data and retrieved similar cases.
2. Determine the likely pathology or stressor.
3. Recommend time-sensitive actions.
4. Return VALID JSON only."
            .to_string();

        Self {
            system_prompt,
            response_format: Some(ResponseFormatJsonSchema {
                description: Some("Structured agronomic doctor's report".to_string()),
                name: "doctor_report".to_string(),
                schema: Some(report_schema()),
                strict: Some(true),
            }),
        }
    }
}

impl Default for ReportTemplate {
    fn default() -> Self {
        Self::doctor()
    }
}

/// JSON schema matching [`crate::models::DoctorReport`].
pub fn report_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": [
            "summary",
            "likelyCauses",
            "reasoning",
            "recommendations",
            "weatherContext",
            "confidence",
            "provenance"
        ],
        "properties": {
            "summary": { "type": "string" },
            "likelyCauses": { "type": "array", "items": { "type": "string" } },
            "reasoning": { "type": "array", "items": { "type": "string" } },
            "recommendations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["action", "window", "priority"],
                    "properties": {
                        "action": { "type": "string" },
                        "window": { "type": "string" },
                        "priority": { "type": "string", "enum": ["high", "medium", "low"] }
                    }
                }
            },
            "weatherContext": { "type": "string" },
            "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
            "provenance": {
                "type": "array",
                "items": { "type": "string" },
                "description": "cite case ids or sensor ids"
            }
        }
    })
}

/// Load a report template by name from the user's config directory.
///
/// Resolves `<config_dir>/templates/<name>.yaml`.
///
/// # Errors
/// [`TemplateError`] if the config directory cannot be determined or the
/// file is missing or malformed.
pub async fn load_template(name: &str) -> Result<ReportTemplate, TemplateError> {
    let config_path = crate::config_dir()
        .map_err(|e| TemplateError::ConfigDir(e.to_string()))?
        .join(format!("templates/{name}.yaml"));

    tracing::info!("Loading template: {}", config_path.display());

    let content = fs::read_to_string(config_path)?;
    let template: ReportTemplate = serde_yaml::from_str(&content)?;
    Ok(template)
}

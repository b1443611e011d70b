//! Capability summaries
//!
//! Condensed manifest views handed to the planner so provider prompts stay
//! small: id, io types, and a flattened parameter list derived from the
//! params schema.

use crate::manifest::{AdapterManifest, RiskLevel};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Serialize)]
pub struct AdapterParamSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    pub required: bool,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AdapterSummary {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub risk_default: RiskLevel,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub params_summary: Vec<AdapterParamSummary>,
}

pub fn summarize(manifest: &AdapterManifest) -> AdapterSummary {
    AdapterSummary {
        id: manifest.id.clone(),
        name: manifest.name.clone(),
        category: manifest.category.clone(),
        description: manifest.description.clone(),
        risk_default: manifest.risk_default,
        inputs: manifest.inputs.clone(),
        outputs: manifest.outputs.clone(),
        params_summary: summarize_params(&manifest.params_schema),
    }
}

pub fn summarize_all(manifests: &[AdapterManifest]) -> Vec<AdapterSummary> {
    manifests.iter().map(summarize).collect()
}

fn summarize_params(schema: &Value) -> Vec<AdapterParamSummary> {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };
    properties
        .iter()
        .map(|(name, definition)| AdapterParamSummary {
            name: name.clone(),
            param_type: param_type(definition),
            required: required.contains(&name.as_str()),
            allowed: definition
                .get("enum")
                .and_then(Value::as_array)
                .map(|v| v.to_vec()),
            description: definition
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
        .collect()
}

fn param_type(definition: &Value) -> String {
    match definition.get("type") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(list)) => list
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("|"),
        _ => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn flattens_properties_with_required_flags() {
        let manifest = AdapterManifest {
            id: "web.probe".into(),
            name: "Probe".into(),
            description: "test".into(),
            category: "web".into(),
            risk_default: RiskLevel::Passive,
            version: "1.0.0".into(),
            inputs: vec![],
            outputs: vec!["web_surface.json".into()],
            params_schema: json!({
                "type": "object",
                "properties": {
                    "target_url": { "type": "string", "description": "seed url" },
                    "mode": { "type": "string", "enum": ["fast", "deep"] },
                    "max_pages": { "type": ["integer", "null"] }
                },
                "required": ["target_url"],
                "additionalProperties": false
            }),
            artifact_schemas: HashMap::new(),
            tags: vec![],
        };

        let summary = summarize(&manifest);
        assert_eq!(summary.params_summary.len(), 3);
        let target = summary
            .params_summary
            .iter()
            .find(|p| p.name == "target_url")
            .expect("target_url");
        assert!(target.required);
        assert_eq!(target.description.as_deref(), Some("seed url"));
        let mode = summary.params_summary.iter().find(|p| p.name == "mode").expect("mode");
        assert_eq!(mode.allowed.as_ref().map(Vec::len), Some(2));
        let pages = summary
            .params_summary
            .iter()
            .find(|p| p.name == "max_pages")
            .expect("max_pages");
        assert_eq!(pages.param_type, "integer|null");
        assert!(!pages.required);
    }
}

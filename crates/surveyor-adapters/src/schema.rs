//! Artifact content schemas
//!
//! Known artifact types carry a content schema; the executor validates
//! produced content against them and flags violations as untrusted rather
//! than discarding the artifact. Schemas declared on a manifest take
//! precedence over the built-in set for the same type.

use crate::manifest::AdapterManifest;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::OnceLock;
use surveyor_core::{Error, Result};

fn known_schemas() -> &'static HashMap<&'static str, Value> {
    static SCHEMAS: OnceLock<HashMap<&'static str, Value>> = OnceLock::new();
    SCHEMAS.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert(
            "web_surface.json",
            json!({
                "$schema": "https://json-schema.org/draft/2020-12/schema",
                "type": "object",
                "properties": {
                    "target": { "type": "string" },
                    "timestamp": { "type": "string" },
                    "urls": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "url": { "type": "string" },
                                "method": { "type": "string" },
                                "status": { "type": "integer" },
                                "content_type": { "type": "string" },
                                "source": { "type": "string" }
                            },
                            "required": ["url"]
                        }
                    },
                    "links": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "url": { "type": "string" },
                                "source": { "type": "string" }
                            },
                            "required": ["url"]
                        }
                    },
                    "forms": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "action": { "type": "string" },
                                "method": { "type": "string" }
                            },
                            "required": ["action"]
                        }
                    },
                    "notes": { "type": "array", "items": { "type": "string" } },
                    "evidence": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "kind": { "type": "string" },
                                "path": { "type": "string" },
                                "description": { "type": "string" }
                            },
                            "required": ["kind", "path"]
                        }
                    }
                },
                "required": ["target", "timestamp", "urls"]
            }),
        );
        map.insert(
            "findings_candidates.json",
            json!({
                "$schema": "https://json-schema.org/draft/2020-12/schema",
                "type": "object",
                "properties": {
                    "target": { "type": "string" },
                    "timestamp": { "type": "string" },
                    "source_artifacts": { "type": "array", "items": { "type": "string" } },
                    "candidates": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": { "type": "string" },
                                "type": { "type": "string" },
                                "title": { "type": "string" },
                                "description": { "type": "string" },
                                "confidence": { "enum": ["low", "medium", "high"] },
                                "severity_hint": { "enum": ["info", "low", "medium", "high"] },
                                "evidence": { "type": "array" },
                                "tags": { "type": "array", "items": { "type": "string" } },
                                "refs": { "type": "array" }
                            },
                            "required": ["id", "type", "title", "confidence", "severity_hint"]
                        }
                    }
                },
                "required": ["target", "timestamp", "candidates"]
            }),
        );
        map.insert(
            "findings_triaged.json",
            json!({
                "$schema": "https://json-schema.org/draft/2020-12/schema",
                "type": "object",
                "properties": {
                    "target": { "type": "string" },
                    "timestamp": { "type": "string" },
                    "source_artifacts": { "type": "array", "items": { "type": "string" } },
                    "triaged": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "candidate_id": { "type": "string" },
                                "decision": { "enum": ["keep", "drop", "needs_review"] },
                                "severity": { "enum": ["info", "low", "medium", "high"] },
                                "rationale": { "type": "string" },
                                "tags": { "type": "array", "items": { "type": "string" } },
                                "refs": { "type": "array" }
                            },
                            "required": ["candidate_id", "decision", "severity"]
                        }
                    },
                    "summary": {
                        "type": "object",
                        "properties": {
                            "kept": { "type": "integer" },
                            "dropped": { "type": "integer" },
                            "needs_review": { "type": "integer" }
                        },
                        "required": ["kept", "dropped", "needs_review"]
                    }
                },
                "required": ["target", "timestamp", "triaged", "summary"]
            }),
        );
        map.insert(
            "report.json",
            json!({
                "$schema": "https://json-schema.org/draft/2020-12/schema",
                "type": "object",
                "properties": {
                    "target": { "type": "string" },
                    "timestamp": { "type": "string" },
                    "artifacts": { "type": "array", "items": { "type": "string" } },
                    "report_path": { "type": "string" }
                },
                "required": ["target", "timestamp", "report_path"]
            }),
        );
        map
    })
}

/// Artifact types with a built-in content schema, used to infer types from
/// filenames when seeding forked runs.
pub fn known_artifact_types() -> Vec<&'static str> {
    let mut types: Vec<&'static str> = known_schemas().keys().copied().collect();
    types.sort_unstable();
    types
}

/// Validate artifact content for `artifact_type`. The manifest's own schema
/// for the type wins over the built-in one; types with no schema anywhere
/// pass unchecked.
pub fn validate_artifact_content(
    manifest: &AdapterManifest,
    artifact_type: &str,
    content: &Value,
) -> Result<()> {
    let schema = manifest
        .artifact_schemas
        .get(artifact_type)
        .or_else(|| known_schemas().get(artifact_type));
    validate_against(schema, artifact_type, content)
}

/// Validate against the built-in schema set only, for call sites that have
/// no adapter manifest at hand (e.g. re-checking a human-edited artifact).
pub fn validate_known_content(artifact_type: &str, content: &Value) -> Result<()> {
    validate_against(known_schemas().get(artifact_type), artifact_type, content)
}

fn validate_against(schema: Option<&Value>, artifact_type: &str, content: &Value) -> Result<()> {
    let Some(schema) = schema else {
        return Ok(());
    };
    let validator = jsonschema::options()
        .with_draft(jsonschema::Draft::Draft202012)
        .build(schema)
        .map_err(|e| Error::Internal(format!("artifact schema for {artifact_type}: {e}")))?;
    let errors: Vec<String> = validator
        .iter_errors(content)
        .map(|error| format!("{} {}", error.instance_path, error).trim().to_string())
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::validation_all(&errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::RiskLevel;

    fn bare_manifest() -> AdapterManifest {
        AdapterManifest {
            id: "test.adapter".into(),
            name: "Test".into(),
            description: String::new(),
            category: "test".into(),
            risk_default: RiskLevel::Passive,
            version: "1.0.0".into(),
            inputs: vec![],
            outputs: vec!["web_surface.json".into()],
            params_schema: json!({ "type": "object", "required": [], "additionalProperties": false }),
            artifact_schemas: HashMap::new(),
            tags: vec![],
        }
    }

    #[test]
    fn valid_web_surface_passes() {
        let content = json!({
            "target": "https://example.com",
            "timestamp": "2026-01-01T00:00:00Z",
            "urls": [{ "url": "https://example.com/", "status": 200 }]
        });
        validate_artifact_content(&bare_manifest(), "web_surface.json", &content)
            .expect("should validate");
    }

    #[test]
    fn missing_required_field_fails() {
        let content = json!({ "target": "https://example.com" });
        let err = validate_artifact_content(&bare_manifest(), "web_surface.json", &content)
            .expect_err("should fail");
        assert!(err.to_string().contains("timestamp") || err.to_string().contains("required"));
    }

    #[test]
    fn unknown_type_passes_unchecked() {
        validate_artifact_content(&bare_manifest(), "custom.bin", &json!({ "anything": true }))
            .expect("unchecked");
    }

    #[test]
    fn manifest_schema_overrides_builtin() {
        let mut manifest = bare_manifest();
        manifest.artifact_schemas.insert(
            "web_surface.json".into(),
            json!({ "type": "object", "required": ["custom_field"] }),
        );
        let content = json!({
            "target": "https://example.com",
            "timestamp": "2026-01-01T00:00:00Z",
            "urls": []
        });
        assert!(validate_artifact_content(&manifest, "web_surface.json", &content).is_err());
    }
}

//! Adapter manifests
//!
//! A manifest is the static contract an adapter publishes: a namespaced id,
//! a semver version, the artifact types it consumes and produces, and a
//! strict parameter schema. Registration rejects manifests that fail these
//! checks so a bad plugin never reaches the executor.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Passive,
    Active,
    Destructive,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Passive => "passive",
            Self::Active => "active",
            Self::Destructive => "destructive",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdapterManifest {
    /// Namespaced id, e.g. "web.surface.discover.http".
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub risk_default: RiskLevel,
    /// Semver x.y.z, optionally with a pre-release suffix.
    pub version: String,
    /// Artifact types that must be available before this adapter runs.
    pub inputs: Vec<String>,
    /// Artifact types this adapter is allowed to emit.
    pub outputs: Vec<String>,
    pub params_schema: Value,
    /// Optional content schemas keyed by output artifact type.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub artifact_schemas: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Structural checks on a manifest. Returns every violation, not just the
/// first.
pub fn validate_manifest(manifest: &AdapterManifest) -> Vec<String> {
    let mut errors = Vec::new();
    if !manifest.id.contains('.') {
        errors.push("id must be namespaced (use dots)".to_string());
    }
    if !is_semver(&manifest.version) {
        errors.push("version must be semver (x.y.z)".to_string());
    }
    if manifest.inputs.iter().any(|entry| entry.trim().is_empty()) {
        errors.push("inputs must not be empty".to_string());
    }
    if manifest.outputs.iter().any(|entry| entry.trim().is_empty()) {
        errors.push("outputs must not be empty".to_string());
    }
    errors
}

/// A parameter schema must forbid unknown properties and declare its
/// required list explicitly, even when empty.
pub fn is_strict_params_schema(schema: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    if schema.get("additionalProperties") != Some(&Value::Bool(false)) {
        errors.push("params_schema.additionalProperties must be false".to_string());
    }
    if !schema.get("required").map_or(false, Value::is_array) {
        errors.push("params_schema.required must be an array".to_string());
    }
    errors
}

fn is_semver(value: &str) -> bool {
    let core = match value.split_once('-') {
        Some((core, pre)) => {
            if pre.is_empty()
                || !pre
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
            {
                return false;
            }
            core
        }
        None => value,
    };
    let parts: Vec<&str> = core.split('.').collect();
    parts.len() == 3 && parts.iter().all(|part| part.parse::<u64>().is_ok())
}

//! Builtin adapters
//!
//! The four-step assessment pipeline: surface discovery, candidate
//! extraction, rule-based triage, and report generation.

pub mod candidates;
pub mod discover;
pub mod report;
pub mod triage;

use crate::registry::{AdapterArtifact, AdapterContext};
use serde::de::DeserializeOwned;
use std::path::Path;
use surveyor_core::{Error, Result};

/// Load a required input artifact's content, inline form first, then the
/// referenced file.
pub(crate) fn load_input<T: DeserializeOwned>(
    inputs: &[AdapterArtifact],
    artifact_type: &str,
    ctx: &AdapterContext,
) -> Result<T> {
    match try_load_input(inputs, artifact_type, ctx)? {
        Some(value) => Ok(value),
        None => Err(Error::validation(format!(
            "missing input artifact: {artifact_type}"
        ))),
    }
}

pub(crate) fn try_load_input<T: DeserializeOwned>(
    inputs: &[AdapterArtifact],
    artifact_type: &str,
    ctx: &AdapterContext,
) -> Result<Option<T>> {
    let Some(artifact) = inputs.iter().find(|a| a.artifact_type == artifact_type) else {
        return Ok(None);
    };
    if let Some(content) = &artifact.content {
        return Ok(Some(serde_json::from_value(content.clone())?));
    }
    let Some(path) = &artifact.path else {
        return Err(Error::validation(format!(
            "input artifact missing content and path: {artifact_type}"
        )));
    };
    let resolved = resolve_path(&ctx.project_root, path);
    let raw = std::fs::read_to_string(resolved)?;
    Ok(Some(serde_json::from_str(&raw)?))
}

pub(crate) fn resolve_path(project_root: &Path, path: &Path) -> std::path::PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}

/// Relative form for evidence references so artifacts stay portable across
/// machines. Paths outside the project root stay absolute.
pub(crate) fn relative_to_root(project_root: &Path, path: &Path) -> String {
    match path.strip_prefix(project_root) {
        Ok(relative) => relative.to_string_lossy().replace('\\', "/"),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

pub(crate) fn param_str(params: &serde_json::Map<String, serde_json::Value>, key: &str) -> String {
    params
        .get(key)
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

pub(crate) fn param_usize(
    params: &serde_json::Map<String, serde_json::Value>,
    key: &str,
    fallback: usize,
    min: usize,
) -> usize {
    params
        .get(key)
        .and_then(serde_json::Value::as_u64)
        .map(|v| (v as usize).max(min))
        .unwrap_or(fallback)
}

pub(crate) fn param_bool(
    params: &serde_json::Map<String, serde_json::Value>,
    key: &str,
    fallback: bool,
) -> bool {
    params
        .get(key)
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(fallback)
}

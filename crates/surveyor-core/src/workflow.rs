//! Workflow definitions and structural validation
//!
//! A workflow is immutable once validated: the run manager stores it
//! verbatim on the run and never mutates it. Validation happens against an
//! embedded JSON Schema in all-errors mode, so a rejected document reports
//! every violated constraint, not just the first.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Allow-list of target strings steps may reference.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkflowScope {
    pub targets: Vec<String>,
}

/// One adapter invocation within a workflow. Steps execute strictly in
/// list order; there is no DAG and no fan-out within a run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkflowStep {
    pub id: String,
    pub adapter: String,
    pub category: String,
    pub risk: String,
    #[serde(default)]
    pub inputs: Map<String, Value>,
    #[serde(default)]
    pub outputs: Map<String, Value>,
    #[serde(default)]
    pub limits: Map<String, Value>,
    #[serde(default)]
    pub params: Map<String, Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkflowDefinition {
    pub workflow_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<WorkflowScope>,
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowDefinition {
    /// An empty (no-op) workflow carrying the given scope. The planner
    /// falls back to this on any provider or validation failure.
    pub fn empty(
        project_id: Option<String>,
        chat_id: Option<String>,
        scope_targets: Vec<String>,
    ) -> Self {
        Self {
            workflow_id: crate::types::new_id(),
            project_id,
            chat_id,
            scope: Some(WorkflowScope {
                targets: scope_targets,
            }),
            steps: Vec::new(),
        }
    }
}

fn workflow_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["workflow_id", "steps"],
        "properties": {
            "workflow_id": { "type": "string", "minLength": 1 },
            "project_id": { "type": "string" },
            "chat_id": { "type": "string" },
            "scope": {
                "type": "object",
                "required": ["targets"],
                "properties": {
                    "targets": {
                        "type": "array",
                        "items": { "type": "string", "minLength": 1 }
                    }
                }
            },
            "steps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id", "adapter", "category", "risk"],
                    "properties": {
                        "id": { "type": "string", "minLength": 1 },
                        "adapter": { "type": "string", "minLength": 1 },
                        "category": { "type": "string" },
                        "risk": { "type": "string" },
                        "inputs": { "type": "object" },
                        "outputs": { "type": "object" },
                        "limits": { "type": "object" },
                        "params": { "type": "object" }
                    }
                }
            }
        }
    })
}

fn compiled_schema() -> &'static jsonschema::Validator {
    static VALIDATOR: OnceLock<jsonschema::Validator> = OnceLock::new();
    VALIDATOR.get_or_init(|| {
        jsonschema::options()
            .with_draft(jsonschema::Draft::Draft202012)
            .build(&workflow_schema())
            .expect("embedded workflow schema compiles")
    })
}

/// Structurally validate a workflow document before the run manager
/// accepts it. Every violated constraint is enumerated in the error.
pub fn validate_workflow(definition: &WorkflowDefinition) -> Result<()> {
    let document = serde_json::to_value(definition)?;
    let mut errors: Vec<String> = compiled_schema()
        .iter_errors(&document)
        .map(|error| format!("{} {}", error.instance_path, error).trim().to_string())
        .collect();

    let mut seen = HashSet::new();
    for step in &definition.steps {
        if !seen.insert(step.id.as_str()) {
            errors.push(format!("duplicate step id: {}", step.id));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::validation_all(&errors))
    }
}

/// Parse a planner-produced document. The payload must be JSON-only: a
/// single object with no surrounding prose.
pub fn parse_workflow_json(value: &str) -> Result<WorkflowDefinition> {
    let trimmed = value.trim();
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return Err(Error::validation("planner output must be JSON-only"));
    }
    Ok(serde_json::from_str(trimmed)?)
}
